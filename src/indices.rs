//! Per-breath flags and population indices

use crate::config::IndexThresholds;
use crate::types::{round2, BreathIndices, CumulativeIndices, Inspiration};
use log::debug;

/// Scores breaths against the index thresholds
pub struct IndicesAggregator;

impl IndicesAggregator {
    /// Flag every breath and summarise the population
    pub fn aggregate(
        mut inspirations: Vec<Inspiration>,
        thresholds: &IndexThresholds,
    ) -> (Vec<Inspiration>, CumulativeIndices) {
        for insp in inspirations.iter_mut() {
            insp.indices = Self::score(insp, thresholds);
        }
        let cumulative = Self::cumulative(&inspirations);
        debug!(
            "Scored {} inspirations, overall index {:.2}",
            inspirations.len(),
            cumulative.overall
        );
        (inspirations, cumulative)
    }

    /// Flags for a single breath
    ///
    /// Features that were never computed (no linked minimum, not enough
    /// history) leave their flag unset.
    pub fn score(insp: &Inspiration, thresholds: &IndexThresholds) -> BreathIndices {
        let mut indices = BreathIndices {
            skew: insp.left_percent < thresholds.skew_low_percent
                || insp.left_percent > thresholds.skew_high_percent,
            top_heavy: insp.top90_percent > thresholds.top_heavy_percent,
            flat_top: insp.mid_var < thresholds.flat_top_variance,
            spike: insp.top90_percent < thresholds.spike_percent,
            multi_peak: insp.multi_peak,
            no_pause: insp
                .pre_rest
                .is_some_and(|rest| rest < thresholds.no_pause_samples),
            inspir_rate: insp
                .inspir_per_min
                .is_some_and(|rate| rate > thresholds.inspir_rate_per_min),
            multi_breath: insp.no_exhale,
            amp_var: insp
                .amp_var
                .is_some_and(|var| var > thresholds.amp_variance),
            overall: 0,
        };
        indices.overall = indices.flags().iter().filter(|&&flag| flag).count() as u32;
        indices
    }

    /// Fraction of breaths carrying each flag, two decimals
    pub fn cumulative(inspirations: &[Inspiration]) -> CumulativeIndices {
        if inspirations.is_empty() {
            return CumulativeIndices::default();
        }

        let mut counts = [0usize; BreathIndices::FLAG_COUNT];
        for insp in inspirations {
            for (count, flag) in counts.iter_mut().zip(insp.indices.flags()) {
                if flag {
                    *count += 1;
                }
            }
        }

        let total = inspirations.len() as f64;
        let [skew, top_heavy, flat_top, spike, multi_peak, no_pause, inspir_rate, multi_breath, amp_var] =
            counts.map(|count| round2(count as f64 / total));

        CumulativeIndices {
            skew,
            top_heavy,
            flat_top,
            spike,
            multi_peak,
            no_pause,
            inspir_rate,
            multi_breath,
            amp_var,
            // top heavy is reported on its own and stays out of the sum
            overall: round2(
                skew + flat_top
                    + spike
                    + multi_peak
                    + no_pause
                    + inspir_rate
                    + multi_breath
                    + amp_var,
            ),
        }
    }
}

impl BreathIndices {
    pub const FLAG_COUNT: usize = 9;

    /// Flags in a fixed order: skew, top heavy, flat top, spike, multi
    /// peak, no pause, rate, multi breath, amplitude variance
    pub fn flags(&self) -> [bool; Self::FLAG_COUNT] {
        [
            self.skew,
            self.top_heavy,
            self.flat_top,
            self.spike,
            self.multi_peak,
            self.no_pause,
            self.inspir_rate,
            self.multi_breath,
            self.amp_var,
        ]
    }
}
