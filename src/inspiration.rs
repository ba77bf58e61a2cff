//! Inspiration detection and shape features
//!
//! Each local maximum above the upper grey zone is a candidate breath. The
//! breath extends backwards and forwards from the peak to the first samples
//! at or below the grey zone; a candidate whose walk meets a higher sample
//! first is dropped because that higher peak owns the breath. Once a breath
//! is recorded, candidates inside it are skipped, so a re-peaking breath is
//! recorded once and flagged as multi-peak instead.

use crate::config::AnalysisConfig;
use crate::types::{round2, BreathIndices, Inspiration, Waveform};
use log::{debug, trace};

/// Detector producing the ordered inspiration list
pub struct InspirationDetector;

impl InspirationDetector {
    /// Detect inspirations in ascending `start` order
    pub fn detect(waveform: &Waveform, config: &AnalysisConfig) -> Vec<Inspiration> {
        let len = waveform.len();
        let mut inspirations = Vec::new();
        if len < 3 {
            return inspirations;
        }

        let mut ignore_until = 0;
        let mut dropped = 0usize;

        for i in 1..len - 1 {
            if i < ignore_until {
                continue;
            }

            let peak = waveform.value(i);
            if peak <= config.grey_zone_upper {
                continue;
            }
            if waveform.value(i - 1) > peak || peak < waveform.value(i + 1) {
                continue;
            }

            let boundaries = (
                find_start(waveform, i, config),
                find_end(waveform, i, config),
            );
            let (start, end) = match boundaries {
                (Some(start), Some(end)) => (start, end),
                _ => {
                    trace!("Peak at {} has no resolvable boundary, dropped", i);
                    dropped += 1;
                    continue;
                }
            };

            if end - start < config.min_breath_samples {
                trace!("Breath {}..{} too short, dropped", start, end);
                continue;
            }

            inspirations.push(characterize(waveform, start, end, peak, config));
            ignore_until = end;
        }

        debug!(
            "Detected {} inspirations ({} candidates without boundaries)",
            inspirations.len(),
            dropped
        );
        inspirations
    }
}

/// Walk back from the peak to the grey zone
fn find_start(waveform: &Waveform, peak_index: usize, config: &AnalysisConfig) -> Option<usize> {
    let peak = waveform.value(peak_index);
    for index in (1..=peak_index).rev() {
        let value = waveform.value(index);
        if value > peak {
            return None;
        }
        if value <= config.grey_zone_upper {
            return Some(index);
        }
    }
    None
}

/// Walk forward from the peak to the grey zone
fn find_end(waveform: &Waveform, peak_index: usize, config: &AnalysisConfig) -> Option<usize> {
    let peak = waveform.value(peak_index);
    for index in peak_index..waveform.len() - 1 {
        let value = waveform.value(index);
        if value > peak {
            return None;
        }
        if value <= config.grey_zone_upper {
            return Some(index);
        }
    }
    None
}

/// Shape features of one bounded breath
fn characterize(
    waveform: &Waveform,
    start: usize,
    end: usize,
    max_value: f64,
    config: &AnalysisConfig,
) -> Inspiration {
    let duration = end - start;
    // half the duration, rounding halves up
    let mid_point = start + (duration + 1) / 2;
    let threshold = max_value * config.top_threshold_ratio;

    let mut left_volume = 0.0;
    let mut right_volume = 0.0;
    let mut top_count = 0usize;
    let mut peaks = PeakTracker::new(config.min_peak_bump);

    for index in start..end {
        let value = waveform.value(index);
        if index < mid_point {
            left_volume += value;
        } else if index > mid_point {
            right_volume += value;
        }
        if value > threshold {
            top_count += 1;
        }
        peaks.push(value);
    }

    let (left_percent, top90_percent) = if duration > config.characterize_min_samples {
        let total = left_volume + right_volume;
        let left_percent = if total.abs() > f64::EPSILON {
            round2(100.0 * left_volume / total)
        } else {
            config.default_left_percent
        };
        (left_percent, round2(100.0 * top_count as f64 / duration as f64))
    } else {
        (config.default_left_percent, config.default_top90_percent)
    };

    Inspiration {
        start,
        end,
        start_time: waveform.samples[start].timestamp,
        max_value,
        mid_point,
        left_volume,
        right_volume,
        left_percent,
        top90_percent,
        multi_peak: peaks.multi_peak(),
        mid_var: mid_variance(waveform, start, end, mid_point),
        linked_min_at: None,
        no_exhale: false,
        intersection: None,
        pre_rest: None,
        amp_mean: None,
        amp_var: None,
        inspir_per_min: None,
        indices: BreathIndices::default(),
    }
}

/// Variance of flow over the central half of the breath, two decimals
fn mid_variance(waveform: &Waveform, start: usize, end: usize, mid_point: usize) -> f64 {
    let quarter = 0.25 * (end - start) as f64;
    let var_start = (mid_point as f64 - quarter).round() as usize;
    let var_end = ((mid_point as f64 + quarter).round() as usize).max(var_start + 1);

    let window = &waveform.samples[var_start..var_end];
    let count = window.len() as f64;
    let mean = window.iter().map(|s| s.value).sum::<f64>() / count;
    let variance = window
        .iter()
        .map(|s| (s.value - mean).powi(2))
        .sum::<f64>()
        / count;

    round2(variance)
}

#[derive(Debug, Clone, Copy)]
enum PeakPhase {
    /// Climbing towards the first peak
    Rising { last_max: f64 },
    /// Past the first peak, waiting for a drop larger than the bump
    Falling { first_peak: f64 },
    /// Tracking the trough after the first peak
    Trough { lowest: f64 },
    /// A second peak has been seen
    Found,
}

/// Three-phase second-peak detector fed one sample at a time
#[derive(Debug, Clone, Copy)]
struct PeakTracker {
    bump: f64,
    phase: PeakPhase,
}

impl PeakTracker {
    fn new(bump: f64) -> Self {
        // any first sample, negative included, starts the climb
        Self {
            bump,
            phase: PeakPhase::Rising {
                last_max: f64::NEG_INFINITY,
            },
        }
    }

    fn push(&mut self, value: f64) {
        self.phase = match self.phase {
            PeakPhase::Rising { last_max } if value > last_max => {
                PeakPhase::Rising { last_max: value }
            }
            PeakPhase::Rising { last_max } if value < last_max => PeakPhase::Falling {
                first_peak: last_max,
            },
            PeakPhase::Falling { first_peak } if first_peak - value > self.bump => {
                PeakPhase::Trough { lowest: value }
            }
            PeakPhase::Trough { lowest } if value < lowest => PeakPhase::Trough { lowest: value },
            PeakPhase::Trough { lowest } if value > lowest + self.bump => PeakPhase::Found,
            phase => phase,
        };
    }

    fn multi_peak(&self) -> bool {
        matches!(self.phase, PeakPhase::Found)
    }
}
