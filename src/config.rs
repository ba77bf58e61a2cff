//! Analysis configuration
//!
//! Every threshold used by the segmentation and scoring stages lives here.
//! Sample-count fields assume the 40 ms sampling interval of CPAP flow
//! channels; the defaults reproduce the reference heuristics exactly.
//!
//! Partial JSON documents are accepted: fields that are not named keep
//! their defaults.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Thresholds that turn raw breath features into boolean flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexThresholds {
    /// Breaths with a left-volume share below this percentage are skewed
    pub skew_low_percent: f64,
    /// Breaths with a left-volume share above this percentage are skewed
    pub skew_high_percent: f64,
    /// Time above 90% of peak (percent) beyond which a breath is top heavy
    pub top_heavy_percent: f64,
    /// Mid-breath variance below which a breath has a flat top
    pub flat_top_variance: f64,
    /// Time above 90% of peak (percent) below which a breath is a spike
    pub spike_percent: f64,
    /// Pre-inspiration pause (samples) below which there is no pause
    pub no_pause_samples: i64,
    /// Inspirations per minute above which the rate is flagged
    pub inspir_rate_per_min: u32,
    /// Rolling amplitude variance above which amplitude is flagged
    pub amp_variance: f64,
}

impl Default for IndexThresholds {
    fn default() -> Self {
        Self {
            skew_low_percent: 45.0,
            skew_high_percent: 55.0,
            top_heavy_percent: 40.0,
            flat_top_variance: 0.75,
            spike_percent: 20.0,
            no_pause_samples: 10,
            inspir_rate_per_min: 20,
            amp_variance: 4.0,
        }
    }
}

/// Tunable constants for a single analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Flow below which an expiration minimum may be flagged (L/min)
    pub grey_zone_lower: f64,
    /// Flow at or below which a sample is outside an inspiration (L/min)
    pub grey_zone_upper: f64,
    /// Half-width of the minima window and size of the ignored margins (samples)
    pub minima_window: usize,
    /// Inspirations shorter than this are discarded (samples)
    pub min_breath_samples: usize,
    /// Inspirations must be strictly longer than this for skew/top-heavy (samples)
    pub characterize_min_samples: usize,
    /// Left-volume share assigned to breaths too short to characterize
    pub default_left_percent: f64,
    /// Time-above-90% share assigned to breaths too short to characterize
    pub default_top90_percent: f64,
    /// Fraction of peak flow that counts as "near the top"
    pub top_threshold_ratio: f64,
    /// Minimum dip/rise that separates two peaks within a breath (L/min)
    pub min_peak_bump: f64,
    /// Horizon for the expiration zero-crossing extrapolation (samples)
    pub extrapolation_samples: usize,
    /// Pre-rest recorded when flow is no longer negative at the horizon
    pub pre_rest_resumed_early: i64,
    /// Number of breaths in the rolling amplitude window
    pub amplitude_window: usize,
    /// Flow zones shorter than this are ignored by the balance check (samples)
    pub min_zone_samples: usize,
    /// Net volume imbalance (percent) that marks a zone as unbalanced
    pub flow_balance_error_percent: f64,
    /// Per-breath flag thresholds
    pub thresholds: IndexThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            grey_zone_lower: -10.0,
            grey_zone_upper: 5.0,
            minima_window: 25,
            min_breath_samples: 8,
            characterize_min_samples: 12,
            default_left_percent: 50.0,
            default_top90_percent: 32.0,
            top_threshold_ratio: 0.9,
            min_peak_bump: 1.0,
            extrapolation_samples: 25,
            pre_rest_resumed_early: -10,
            amplitude_window: 5,
            min_zone_samples: 100,
            flow_balance_error_percent: 20.0,
            thresholds: IndexThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Smallest waveform the pipeline accepts: one full minima window
    pub fn min_waveform_len(&self) -> usize {
        2 * self.minima_window + 1
    }

    /// Check internal consistency of the configuration
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.minima_window == 0 {
            return Err(AnalysisError::InvalidConfig(
                "minima_window must be positive".to_string(),
            ));
        }
        if self.amplitude_window == 0 {
            return Err(AnalysisError::InvalidConfig(
                "amplitude_window must be positive".to_string(),
            ));
        }
        if self.extrapolation_samples == 0 {
            return Err(AnalysisError::InvalidConfig(
                "extrapolation_samples must be positive".to_string(),
            ));
        }
        if self.grey_zone_lower >= self.grey_zone_upper {
            return Err(AnalysisError::InvalidConfig(format!(
                "grey zone is inverted ({} >= {})",
                self.grey_zone_lower, self.grey_zone_upper
            )));
        }
        if !(0.0..=1.0).contains(&self.top_threshold_ratio) {
            return Err(AnalysisError::InvalidConfig(format!(
                "top_threshold_ratio must be within 0..=1, got {}",
                self.top_threshold_ratio
            )));
        }
        if self.thresholds.skew_low_percent > self.thresholds.skew_high_percent {
            return Err(AnalysisError::InvalidConfig(format!(
                "skew band is inverted ({} > {})",
                self.thresholds.skew_low_percent, self.thresholds.skew_high_percent
            )));
        }
        Ok(())
    }

    /// Load a configuration from JSON, filling unnamed fields with defaults
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
