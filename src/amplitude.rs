//! Rolling inspiration amplitude and breathing rate

use crate::config::AnalysisConfig;
use crate::types::{round2, Inspiration, Waveform};
use log::debug;

/// Amplitude variability over a trailing window of breaths
pub struct AmplitudeAnalyzer;

impl AmplitudeAnalyzer {
    /// Fill `amp_mean`, `amp_var` and `inspir_per_min`
    ///
    /// Mean and variance need a full window of `amplitude_window` breaths
    /// ending at the current one. The rate spans `amplitude_window`
    /// breath-to-breath intervals, so it starts one breath later.
    pub fn analyze(
        waveform: &Waveform,
        mut inspirations: Vec<Inspiration>,
        config: &AnalysisConfig,
    ) -> Vec<Inspiration> {
        let window = config.amplitude_window;
        if window == 0 || inspirations.len() < window {
            return inspirations;
        }

        for i in (window - 1)..inspirations.len() {
            let peaks: Vec<f64> = inspirations[i + 1 - window..=i]
                .iter()
                .map(|insp| insp.max_value)
                .collect();
            let mean = peaks.iter().sum::<f64>() / window as f64;
            let variance =
                peaks.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / window as f64;

            let rate = if i >= window {
                breaths_per_minute(
                    window,
                    inspirations[i].start - inspirations[i - window].start,
                    waveform.interval_ms,
                )
            } else {
                None
            };

            let insp = &mut inspirations[i];
            insp.amp_mean = Some(mean);
            insp.amp_var = Some(round2(variance));
            insp.inspir_per_min = rate;
        }

        debug!(
            "Amplitude window of {} applied to {} inspirations",
            window,
            inspirations.len()
        );
        inspirations
    }
}

fn breaths_per_minute(breaths: usize, span_samples: usize, interval_ms: f64) -> Option<u32> {
    let span_ms = span_samples as f64 * interval_ms;
    if span_ms <= 0.0 {
        return None;
    }
    Some((60_000.0 * breaths as f64 / span_ms).round() as u32)
}
