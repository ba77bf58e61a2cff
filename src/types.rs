//! Core types for the flowlimits pipeline
//!
//! This module defines the records that flow through each stage: the sampled
//! waveform, the per-breath inspiration record, flow balance zones and the
//! population-level indices.

use crate::error::AnalysisError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single flow reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Flow (L/min); positive is inspiration
    pub value: f64,
}

/// An ordered flow recording with a fixed sampling interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Time of the first sample
    pub start_time: DateTime<Utc>,
    /// Nominal spacing between consecutive samples (milliseconds)
    pub interval_ms: f64,
    pub samples: Vec<Sample>,
}

impl Waveform {
    /// Build a waveform from raw flow values, deriving each timestamp from the interval
    ///
    /// # Errors
    /// `MalformedInput` when a sample's timestamp falls outside the
    /// representable date range.
    pub fn from_values<I>(
        start_time: DateTime<Utc>,
        interval_ms: f64,
        values: I,
    ) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = f64>,
    {
        let samples = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let offset_us = (i as f64 * interval_ms * 1000.0).round() as i64;
                start_time
                    .checked_add_signed(Duration::microseconds(offset_us))
                    .map(|timestamp| Sample { timestamp, value })
                    .ok_or_else(|| {
                        AnalysisError::MalformedInput(format!(
                            "timestamp of sample {} overflows ({} ms interval)",
                            i, interval_ms
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            start_time,
            interval_ms,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Flow value at a sample index
    pub fn value(&self, index: usize) -> f64 {
        self.samples[index].value
    }

    /// Check that the waveform can hold at least `min_len` samples of analysis
    pub fn validate(&self, min_len: usize) -> Result<(), AnalysisError> {
        if self.samples.is_empty() {
            return Err(AnalysisError::MalformedInput(
                "waveform contains no samples".to_string(),
            ));
        }
        if self.samples.len() < min_len {
            return Err(AnalysisError::MalformedInput(format!(
                "waveform has {} samples, at least {} required",
                self.samples.len(),
                min_len
            )));
        }
        if !self.interval_ms.is_finite() || self.interval_ms <= 0.0 {
            return Err(AnalysisError::MalformedInput(format!(
                "invalid sampling interval: {} ms",
                self.interval_ms
            )));
        }
        Ok(())
    }
}

/// Per-breath boolean flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathIndices {
    pub skew: bool,
    pub top_heavy: bool,
    pub flat_top: bool,
    pub spike: bool,
    pub multi_peak: bool,
    pub no_pause: bool,
    pub inspir_rate: bool,
    pub multi_breath: bool,
    pub amp_var: bool,
    /// Number of flags set for this breath
    pub overall: u32,
}

/// One detected inspiration and its shape features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspiration {
    /// Sample index of the mid-line crossing before the peak
    pub start: usize,
    /// Sample index of the mid-line crossing after the peak
    pub end: usize,
    pub start_time: DateTime<Utc>,
    /// Peak flow within [start, end]
    pub max_value: f64,
    /// Sample index at the temporal centre of the breath
    pub mid_point: usize,
    /// Flow summed over samples before the mid point
    pub left_volume: f64,
    /// Flow summed over samples after the mid point
    pub right_volume: f64,
    /// Left volume as a percentage of the total
    pub left_percent: f64,
    /// Percentage of the breath spent above 90% of peak flow
    pub top90_percent: f64,
    /// A second peak follows the first
    pub multi_peak: bool,
    /// Flow variance over the central half of the breath
    pub mid_var: f64,
    /// Index of the expiration minimum this breath follows
    pub linked_min_at: Option<usize>,
    /// No expiration minimum separates this breath from the previous one
    pub no_exhale: bool,
    /// Extrapolated zero crossing of the preceding expiration
    pub intersection: Option<usize>,
    /// Samples between the extrapolated zero crossing and `start`
    pub pre_rest: Option<i64>,
    /// Mean peak flow over the trailing amplitude window
    pub amp_mean: Option<f64>,
    /// Peak flow variance over the trailing amplitude window
    pub amp_var: Option<f64>,
    /// Breathing rate implied by the trailing amplitude window
    pub inspir_per_min: Option<u32>,
    pub indices: BreathIndices,
}

impl Inspiration {
    /// Breath length in samples
    pub fn duration(&self) -> usize {
        self.end - self.start
    }
}

/// Volumetric balance between one inspiration start and the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowZone {
    pub start: usize,
    pub end: usize,
    /// Sum of positive flow
    pub upper_volume: f64,
    /// Sum of negated negative flow
    pub lower_volume: f64,
    pub net: f64,
    pub net_percent: f64,
    /// Position of the opening inspiration in the inspiration list
    pub inspiration_index: usize,
}

/// Fraction of breaths flagged per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeIndices {
    pub skew: f64,
    pub top_heavy: f64,
    pub flat_top: f64,
    pub spike: f64,
    pub multi_peak: f64,
    pub no_pause: f64,
    pub inspir_rate: f64,
    pub multi_breath: f64,
    pub amp_var: f64,
    /// Sum of the category fractions, leaving out `top_heavy`
    pub overall: f64,
}

/// Everything produced by one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Sample indices flagged as expiration minima
    pub minima: Vec<usize>,
    pub inspirations: Vec<Inspiration>,
    pub cumulative: CumulativeIndices,
    pub flow_imbalance: Vec<FlowZone>,
}

// ============================================================================
// Report types
// ============================================================================

/// Producer metadata embedded in every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Recording the analysis ran on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub start_time_utc: String,
    pub interval_ms: f64,
    pub sample_count: usize,
    pub duration_sec: f64,
}

/// Headline numbers for a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub breath_count: usize,
    pub minima_count: usize,
    pub imbalanced_zone_count: usize,
    pub cumulative: CumulativeIndices,
}

/// Serialisable analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub recording: RecordingInfo,
    pub summary: ReportSummary,
    pub inspirations: Vec<Inspiration>,
    pub flow_imbalance: Vec<FlowZone>,
    /// Parabolic flow per breath, for charting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal_flow: Option<Vec<f64>>,
}

/// Round to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
