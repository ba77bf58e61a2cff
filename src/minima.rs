//! Expiration minima detection
//!
//! A sample is a peak-expiration minimum when nothing in the surrounding
//! window is strictly lower and it sits below the lower grey zone. Equal
//! neighbours do not disqualify a sample, so a flat trough can yield several
//! adjacent minima.

use crate::config::AnalysisConfig;
use crate::types::Waveform;
use log::debug;

/// Boolean minimum flag for every sample index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimaMask {
    flags: Vec<bool>,
}

impl MinimaMask {
    pub fn is_min(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Flagged sample indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, &flag)| flag.then_some(i))
            .collect()
    }
}

/// Minima detector over the whole waveform
pub struct MinimaDetector;

impl MinimaDetector {
    /// Flag expiration minima
    ///
    /// The first and last `minima_window` samples are never flagged.
    pub fn detect(waveform: &Waveform, config: &AnalysisConfig) -> MinimaMask {
        let len = waveform.len();
        let window = config.minima_window;
        let mut flags = vec![false; len];

        if window > 0 && len > 2 * window {
            for i in window..(len - window) {
                if waveform.value(i) < config.grey_zone_lower && is_window_min(waveform, i, window)
                {
                    flags[i] = true;
                }
            }
        }

        let mask = MinimaMask { flags };
        debug!("Flagged {} expiration minima", mask.indices().len());
        mask
    }
}

/// True when no sample in `[index - window, index + window)` is strictly lower
fn is_window_min(waveform: &Waveform, index: usize, window: usize) -> bool {
    let value = waveform.value(index);
    waveform.samples[index - window..index + window]
        .iter()
        .all(|s| s.value >= value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sine_waveform, waveform_of};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sine_minima_one_per_cycle() {
        let waveform = sine_waveform(2.5, 30.0, 60.0);
        let config = AnalysisConfig::default();
        let minima = MinimaDetector::detect(&waveform, &config).indices();

        // troughs at 46.875 + 62.5k samples, first and last second ignored
        assert_eq!(minima.len(), 23);
        assert_eq!(minima[0], 47);
        for pair in minima.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap == 62 || gap == 63, "unexpected gap {}", gap);
        }
    }

    #[test]
    fn test_minima_properties() {
        let waveform = sine_waveform(3.1, 22.0, 40.0);
        let config = AnalysisConfig::default();
        let mask = MinimaDetector::detect(&waveform, &config);
        let w = config.minima_window;

        for i in mask.indices() {
            assert!(i >= w && i + w <= waveform.len());
            let value = waveform.value(i);
            assert!(value < config.grey_zone_lower);
            for j in (i - w)..(i + w) {
                assert!(value <= waveform.value(j));
            }
        }
    }

    #[test]
    fn test_positive_plateau_is_not_a_minimum() {
        let mut values = vec![0.0; 30];
        values.extend(vec![12.0; 25]);
        values.extend(vec![0.0; 30]);
        let waveform = waveform_of(values);

        let mask = MinimaDetector::detect(&waveform, &AnalysisConfig::default());
        assert!(mask.indices().is_empty());
    }

    #[test]
    fn test_flat_trough_flags_every_equal_sample() {
        let mut values = vec![0.0; 40];
        values.extend(vec![-20.0; 3]);
        values.extend(vec![0.0; 40]);
        let waveform = waveform_of(values);

        let mask = MinimaDetector::detect(&waveform, &AnalysisConfig::default());
        assert_eq!(mask.indices(), vec![40, 41, 42]);
    }

    #[test]
    fn test_shallow_trough_ignored() {
        let mut values = vec![0.0; 40];
        values.push(-8.0);
        values.extend(vec![0.0; 40]);
        let waveform = waveform_of(values);

        assert!(MinimaDetector::detect(&waveform, &AnalysisConfig::default())
            .indices()
            .is_empty());
    }

    #[test]
    fn test_edges_never_flagged() {
        let mut values = vec![-30.0];
        values.extend(vec![0.0; 60]);
        values.push(-30.0);
        let waveform = waveform_of(values);

        let mask = MinimaDetector::detect(&waveform, &AnalysisConfig::default());
        assert_eq!(mask.len(), 62);
        assert!(!mask.is_min(0));
        assert!(!mask.is_min(61));
    }
}
