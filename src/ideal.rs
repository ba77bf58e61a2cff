//! Idealised inspiratory flow for charting
//!
//! Each inspiration is replaced by the parabola that shares its boundaries
//! and peak flow. Nothing here feeds the indices.

use crate::types::{Inspiration, Waveform};

/// Parabolic flow per inspiration, zero elsewhere, one value per sample
pub fn ideal_flow(waveform: &Waveform, inspirations: &[Inspiration]) -> Vec<f64> {
    let mut ideal = vec![0.0; waveform.len()];

    for insp in inspirations {
        let width = insp.duration() as f64;
        if width == 0.0 {
            continue;
        }
        let scale = 4.0 * insp.max_value / (width * width);
        let end = insp.end.min(ideal.len());
        for (i, slot) in ideal.iter_mut().enumerate().take(end).skip(insp.start + 1) {
            let x = (i - insp.start) as f64;
            *slot = scale * x * (width - x);
        }
    }

    ideal
}
