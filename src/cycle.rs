//! Expiration/inspiration cycle linking
//!
//! Minima and inspirations are both sorted by sample index, so they are
//! paired in one forward pass. Every minimum either links the next
//! unconsumed inspiration or is left unlinked; inspirations passed over
//! without a minimum in front of them are marked `no_exhale`.

use crate::config::AnalysisConfig;
use crate::types::{Inspiration, Waveform};
use log::{debug, trace, warn};

/// Two-pointer merge of expiration minima and inspirations
pub struct CycleLinker;

impl CycleLinker {
    /// Link each minimum to the inspiration that follows it and estimate
    /// the pause before that inspiration
    pub fn link(
        waveform: &Waveform,
        minima: &[usize],
        mut inspirations: Vec<Inspiration>,
        config: &AnalysisConfig,
    ) -> Vec<Inspiration> {
        let mut cursor = 0;
        let mut unlinked = 0usize;

        for (position, &minimum) in minima.iter().enumerate() {
            let next_minimum = minima.get(position + 1).copied();

            while cursor < inspirations.len() && inspirations[cursor].start < minimum {
                trace!(
                    "Inspiration at {} has no preceding expiration",
                    inspirations[cursor].start
                );
                inspirations[cursor].no_exhale = true;
                cursor += 1;
            }

            let Some(inspiration) = inspirations.get_mut(cursor) else {
                unlinked += 1;
                continue;
            };

            if next_minimum.is_some_and(|next| inspiration.start > next) {
                // belongs to a later expiration
                unlinked += 1;
                continue;
            }

            inspiration.linked_min_at = Some(minimum);
            extrapolate_pause(waveform, minimum, inspiration, config);
            cursor += 1;
        }

        if unlinked > 0 {
            debug!("{} expiration minima left unlinked", unlinked);
        }
        inspirations
    }
}

/// Project the expiration from the minimum to its zero crossing and record
/// the gap before the inspiration starts
fn extrapolate_pause(
    waveform: &Waveform,
    minimum: usize,
    inspiration: &mut Inspiration,
    config: &AnalysisConfig,
) {
    let horizon = config.extrapolation_samples;
    if minimum + horizon >= waveform.len() {
        warn!(
            "Minimum at {} is too close to the end of the recording to extrapolate",
            minimum
        );
        return;
    }

    let min_value = waveform.value(minimum);
    let later = waveform.value(minimum + horizon);

    if later >= 0.0 {
        // flow already back above zero: inspiration followed too fast
        inspiration.pre_rest = Some(config.pre_rest_resumed_early);
    } else if later > min_value {
        let offset = (horizon as f64 * min_value / (min_value - later)).round() as usize;
        let intersection = minimum + offset;
        inspiration.intersection = Some(intersection);
        inspiration.pre_rest = Some(inspiration.start as i64 - intersection as i64);
    } else {
        warn!(
            "Expiration at {} is not recovering, pause not estimated",
            minimum
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspiration::InspirationDetector;
    use crate::minima::MinimaDetector;
    use crate::test_support::{breath_cycle_values, inspiration_at, sine_waveform, waveform_of};
    use pretty_assertions::assert_eq;

    fn trough_waveform(len: usize, minima: &[usize]) -> Waveform {
        let mut values = vec![-20.0; len];
        for &m in minima {
            values[m] = -30.0;
        }
        waveform_of(values)
    }

    #[test]
    fn test_regular_cycles_measure_pause() {
        let waveform = waveform_of(breath_cycle_values(6, 30));
        let config = AnalysisConfig::default();
        let minima = MinimaDetector::detect(&waveform, &config).indices();
        let inspirations = InspirationDetector::detect(&waveform, &config);
        assert_eq!(minima, vec![53, 146, 239, 332, 425, 518]);

        let linked = CycleLinker::link(&waveform, &minima, inspirations, &config);

        // nothing precedes the first breath
        assert!(linked[0].no_exhale);
        assert_eq!(linked[0].linked_min_at, None);
        assert_eq!(linked[0].pre_rest, None);

        for (k, insp) in linked.iter().enumerate().skip(1) {
            assert!(!insp.no_exhale);
            assert_eq!(insp.linked_min_at, Some(minima[k - 1]));
            assert_eq!(insp.intersection, Some(93 * k));
            assert_eq!(insp.pre_rest, Some(30));
        }
    }

    #[test]
    fn test_consecutive_inspirations_flag_no_exhale() {
        let minima = [20, 100];
        let waveform = trough_waveform(200, &minima);
        let inspirations = vec![
            inspiration_at(30, 40, 20.0),
            inspiration_at(50, 60, 20.0),
            inspiration_at(120, 130, 20.0),
            inspiration_at(150, 160, 20.0),
        ];

        let linked =
            CycleLinker::link(&waveform, &minima, inspirations, &AnalysisConfig::default());

        assert_eq!(linked[0].linked_min_at, Some(20));
        assert!(!linked[0].no_exhale);
        assert!(linked[1].no_exhale);
        assert_eq!(linked[1].linked_min_at, None);
        assert_eq!(linked[2].linked_min_at, Some(100));
        // trailing breath is never visited
        assert!(!linked[3].no_exhale);
        assert_eq!(linked[3].linked_min_at, None);

        // -30 at the minimum, -20 one horizon later: zero reached 75 samples on
        assert_eq!(linked[0].intersection, Some(95));
        assert_eq!(linked[0].pre_rest, Some(-65));
    }

    #[test]
    fn test_inspiration_after_next_minimum_skips_minimum() {
        let minima = [20, 60, 100];
        let waveform = trough_waveform(200, &minima);
        let inspirations = vec![inspiration_at(70, 80, 20.0)];

        let linked =
            CycleLinker::link(&waveform, &minima, inspirations, &AnalysisConfig::default());

        assert_eq!(linked[0].linked_min_at, Some(60));
        assert!(!linked[0].no_exhale);
    }

    #[test]
    fn test_fast_resumption_uses_sentinel() {
        let mut values = vec![-20.0; 100];
        values[20] = -30.0;
        values[45] = 8.0;
        let waveform = waveform_of(values);

        let linked = CycleLinker::link(
            &waveform,
            &[20],
            vec![inspiration_at(50, 60, 20.0)],
            &AnalysisConfig::default(),
        );

        assert_eq!(linked[0].pre_rest, Some(-10));
        assert_eq!(linked[0].intersection, None);
    }

    #[test]
    fn test_horizon_past_end_leaves_pause_unknown() {
        let waveform = trough_waveform(40, &[20]);
        let linked = CycleLinker::link(
            &waveform,
            &[20],
            vec![inspiration_at(30, 38, 20.0)],
            &AnalysisConfig::default(),
        );

        assert_eq!(linked[0].linked_min_at, Some(20));
        assert_eq!(linked[0].pre_rest, None);
    }

    #[test]
    fn test_deepening_expiration_leaves_pause_unknown() {
        let mut values = vec![-20.0; 100];
        values[20] = -30.0;
        values[45] = -35.0;
        let waveform = waveform_of(values);

        let linked = CycleLinker::link(
            &waveform,
            &[20],
            vec![inspiration_at(50, 60, 20.0)],
            &AnalysisConfig::default(),
        );

        assert_eq!(linked[0].linked_min_at, Some(20));
        assert_eq!(linked[0].pre_rest, None);
    }

    #[test]
    fn test_sine_links_every_minimum_once() {
        let waveform = sine_waveform(2.5, 30.0, 60.0);
        let config = AnalysisConfig::default();
        let minima = MinimaDetector::detect(&waveform, &config).indices();
        let inspirations = InspirationDetector::detect(&waveform, &config);

        let linked = CycleLinker::link(&waveform, &minima, inspirations, &config);

        let mut used: Vec<usize> = linked.iter().filter_map(|i| i.linked_min_at).collect();
        assert_eq!(used.len(), minima.len());
        used.dedup();
        assert_eq!(used.len(), minima.len());
        for insp in linked.iter().filter(|i| i.linked_min_at.is_some()) {
            assert!(insp.start > insp.linked_min_at.unwrap_or(usize::MAX));
            // a sine is already positive one second after its trough
            assert_eq!(insp.pre_rest, Some(-10));
        }
        assert!(linked[0].no_exhale);
    }
}
