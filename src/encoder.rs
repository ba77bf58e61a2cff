//! Report encoding
//!
//! This module assembles analysis results into a self-describing report and
//! serialises it to JSON.

use crate::error::AnalysisError;
use crate::ideal::ideal_flow;
use crate::types::{
    Analysis, AnalysisReport, RecordingInfo, ReportProducer, ReportSummary, Waveform,
};
use crate::{FLOWLIMITS_VERSION, PRODUCER_NAME};
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for analysis reports
pub struct ReportEncoder {
    instance_id: String,
    include_ideal_flow: bool,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            include_ideal_flow: false,
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            include_ideal_flow: false,
        }
    }

    /// Attach the idealised parabolic flow to each report
    pub fn with_ideal_flow(mut self, include: bool) -> Self {
        self.include_ideal_flow = include;
        self
    }

    /// Build the report for one analysed waveform
    pub fn encode(&self, waveform: &Waveform, analysis: &Analysis) -> AnalysisReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: FLOWLIMITS_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let recording = RecordingInfo {
            start_time_utc: waveform
                .start_time
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            interval_ms: waveform.interval_ms,
            sample_count: waveform.len(),
            duration_sec: waveform.len() as f64 * waveform.interval_ms / 1000.0,
        };

        let summary = ReportSummary {
            breath_count: analysis.inspirations.len(),
            minima_count: analysis.minima.len(),
            imbalanced_zone_count: analysis.flow_imbalance.len(),
            cumulative: analysis.cumulative,
        };

        let ideal = self
            .include_ideal_flow
            .then(|| ideal_flow(waveform, &analysis.inspirations));

        AnalysisReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            computed_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            recording,
            summary,
            inspirations: analysis.inspirations.clone(),
            flow_imbalance: analysis.flow_imbalance.clone(),
            ideal_flow: ideal,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        waveform: &Waveform,
        analysis: &Analysis,
    ) -> Result<String, AnalysisError> {
        let report = self.encode(waveform, analysis);
        serde_json::to_string_pretty(&report).map_err(AnalysisError::JsonError)
    }
}
