//! Inspiratory/expiratory volume balance
//!
//! Over a full breath the air breathed in should be breathed out again. A
//! zone runs from one inspiration start to the sample before the next one.
//! A zone is reported only when its imbalance survives being combined with
//! either neighbour, which filters out boundary jitter between breaths.

use crate::config::AnalysisConfig;
use crate::types::{round2, FlowZone, Inspiration, Waveform};
use log::{debug, warn};

/// Flow balance analysis over breath-to-breath zones
pub struct FlowBalanceAnalyzer;

impl FlowBalanceAnalyzer {
    /// Zones that remain unbalanced when combined with each neighbour
    pub fn analyze(
        waveform: &Waveform,
        inspirations: &[Inspiration],
        config: &AnalysisConfig,
    ) -> Vec<FlowZone> {
        let zones = Self::zones(waveform, inspirations, config);
        let imbalanced = Self::imbalanced(&zones, config.flow_balance_error_percent);
        debug!(
            "{} of {} flow zones unbalanced",
            imbalanced.len(),
            zones.len()
        );
        imbalanced
    }

    /// Build one zone per consecutive inspiration pair, skipping short zones
    pub fn zones(
        waveform: &Waveform,
        inspirations: &[Inspiration],
        config: &AnalysisConfig,
    ) -> Vec<FlowZone> {
        inspirations
            .windows(2)
            .enumerate()
            .filter_map(|(index, pair)| {
                let start = pair[0].start;
                let end = pair[1].start - 1;
                if end - start < config.min_zone_samples {
                    return None;
                }
                Some(measure_zone(waveform, start, end, index))
            })
            .collect()
    }

    /// Keep zones whose own imbalance, and its sum with each neighbour's,
    /// exceed `threshold` percent
    ///
    /// The first and last zone have only one neighbour and are never reported.
    pub fn imbalanced(zones: &[FlowZone], threshold: f64) -> Vec<FlowZone> {
        zones
            .windows(3)
            .filter(|trio| {
                let own = trio[1].net_percent;
                own > threshold
                    && own + trio[0].net_percent > threshold
                    && own + trio[2].net_percent > threshold
            })
            .map(|trio| trio[1].clone())
            .collect()
    }
}

fn measure_zone(waveform: &Waveform, start: usize, end: usize, inspiration_index: usize) -> FlowZone {
    let mut upper_volume = 0.0;
    let mut lower_volume = 0.0;
    for sample in &waveform.samples[start..end] {
        if sample.value > 0.0 {
            upper_volume += sample.value;
        } else {
            lower_volume -= sample.value;
        }
    }

    let net = upper_volume - lower_volume;
    let total = upper_volume + lower_volume;
    let net_percent = if total > 0.0 {
        round2(100.0 * net / total)
    } else {
        warn!("Flow zone {}..{} carries no volume", start, end);
        0.0
    };

    FlowZone {
        start,
        end,
        upper_volume,
        lower_volume,
        net,
        net_percent,
        inspiration_index,
    }
}
