//! Pipeline orchestration
//!
//! This module provides the public API for flowlimits. It runs the stages in
//! order, passing each stage's output to the next:
//! minima → inspirations → cycle linking → amplitude → flow balance → indices.

use crate::adapters::{EdfAdapter, NdjsonAdapter, WaveformAdapter};
use crate::amplitude::AmplitudeAnalyzer;
use crate::balance::FlowBalanceAnalyzer;
use crate::config::AnalysisConfig;
use crate::cycle::CycleLinker;
use crate::encoder::ReportEncoder;
use crate::error::AnalysisError;
use crate::indices::IndicesAggregator;
use crate::inspiration::InspirationDetector;
use crate::minima::MinimaDetector;
use crate::types::{Analysis, AnalysisReport, Waveform};
use log::info;

/// Analyse a waveform with the default configuration.
///
/// # Errors
/// `MalformedInput` when the waveform is shorter than one minima window,
/// `NoBreathsDetected` when no inspiration can be segmented.
pub fn analyze(waveform: &Waveform) -> Result<Analysis, AnalysisError> {
    FlowAnalyzer::with_defaults().analyze(waveform)
}

/// Decode an EDF recording and analyse its flow channel.
///
/// # Example
/// ```ignore
/// let bytes = std::fs::read("20250301_230000_BRP.edf")?;
/// let analysis = analyze_edf(&bytes)?;
/// println!("overall index {}", analysis.cumulative.overall);
/// ```
pub fn analyze_edf(raw: &[u8]) -> Result<Analysis, AnalysisError> {
    let waveform = EdfAdapter.parse(raw)?;
    analyze(&waveform)
}

/// Analyser bound to one configuration and one report encoder.
pub struct FlowAnalyzer {
    config: AnalysisConfig,
    encoder: ReportEncoder,
}

impl Default for FlowAnalyzer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FlowAnalyzer {
    /// Create an analyser after validating `config`
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: ReportEncoder::new(),
        })
    }

    /// Create an analyser with the default configuration
    pub fn with_defaults() -> Self {
        Self {
            config: AnalysisConfig::default(),
            encoder: ReportEncoder::new(),
        }
    }

    /// Replace the report encoder
    pub fn with_encoder(mut self, encoder: ReportEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every stage over a waveform
    pub fn analyze(&self, waveform: &Waveform) -> Result<Analysis, AnalysisError> {
        let config = &self.config;
        waveform.validate(config.min_waveform_len())?;

        let minima = MinimaDetector::detect(waveform, config).indices();
        let inspirations = InspirationDetector::detect(waveform, config);
        if inspirations.is_empty() {
            return Err(AnalysisError::NoBreathsDetected);
        }

        let inspirations = CycleLinker::link(waveform, &minima, inspirations, config);
        let inspirations = AmplitudeAnalyzer::analyze(waveform, inspirations, config);
        let flow_imbalance = FlowBalanceAnalyzer::analyze(waveform, &inspirations, config);
        let (inspirations, cumulative) =
            IndicesAggregator::aggregate(inspirations, &config.thresholds);

        info!(
            "Analysed {} samples: {} breaths, overall index {:.2}",
            waveform.len(),
            inspirations.len(),
            cumulative.overall
        );

        Ok(Analysis {
            minima,
            inspirations,
            cumulative,
            flow_imbalance,
        })
    }

    /// Decode, analyse and encode an EDF recording
    pub fn process_edf(&self, raw: &[u8]) -> Result<AnalysisReport, AnalysisError> {
        self.process_with_adapter(&EdfAdapter, raw)
    }

    /// Decode, analyse and encode NDJSON samples
    pub fn process_ndjson(&self, raw: &[u8]) -> Result<AnalysisReport, AnalysisError> {
        self.process_with_adapter(&NdjsonAdapter, raw)
    }

    pub fn process_with_adapter(
        &self,
        adapter: &dyn WaveformAdapter,
        raw: &[u8],
    ) -> Result<AnalysisReport, AnalysisError> {
        let waveform = adapter.parse(raw)?;
        let analysis = self.analyze(&waveform)?;
        Ok(self.encoder.encode(&waveform, &analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{breath_cycle_values, sine_values, sine_waveform, waveform_of};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sine_pipeline() {
        let analysis = analyze(&sine_waveform(2.5, 30.0, 60.0)).unwrap();

        assert_eq!(analysis.minima.len(), 23);
        assert_eq!(analysis.inspirations.len(), 24);
        // pause-free breathing at 24/min
        assert_eq!(analysis.cumulative.no_pause, 0.96);
        assert_eq!(analysis.cumulative.inspir_rate, 0.79);
        assert_eq!(analysis.cumulative.multi_breath, 0.04);
        assert_eq!(analysis.cumulative.skew, 0.0);
        assert_eq!(analysis.cumulative.amp_var, 0.0);
        assert_eq!(analysis.inspirations[5].inspir_per_min, Some(24));
    }

    #[test]
    fn test_regular_breathing_pipeline() {
        let waveform = waveform_of(breath_cycle_values(10, 30));
        let analysis = analyze(&waveform).unwrap();

        assert_eq!(analysis.inspirations.len(), 10);
        for insp in &analysis.inspirations[1..] {
            assert_eq!(insp.pre_rest, Some(30));
            assert!(!insp.indices.no_pause);
            assert!(!insp.indices.multi_breath);
        }
        assert!(analysis.inspirations[0].indices.multi_breath);
    }

    #[test]
    fn test_idempotent() {
        let waveform = waveform_of(sine_values(3.2, 26.0, 90.0));
        let analyzer = FlowAnalyzer::with_defaults();

        let first = analyzer.analyze(&waveform).unwrap();
        let second = analyzer.analyze(&waveform).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cumulative_matches_flag_counts() {
        let analysis = analyze(&sine_waveform(3.7, 18.0, 120.0)).unwrap();
        let n = analysis.inspirations.len() as f64;
        let fraction = |count: usize| (100.0 * count as f64 / n).round() / 100.0;

        let flat_tops = analysis
            .inspirations
            .iter()
            .filter(|i| i.indices.flat_top)
            .count();
        let multi_breaths = analysis
            .inspirations
            .iter()
            .filter(|i| i.indices.multi_breath)
            .count();
        let no_pauses = analysis
            .inspirations
            .iter()
            .filter(|i| i.indices.no_pause)
            .count();

        assert_eq!(analysis.cumulative.flat_top, fraction(flat_tops));
        assert_eq!(analysis.cumulative.multi_breath, fraction(multi_breaths));
        assert_eq!(analysis.cumulative.no_pause, fraction(no_pauses));
    }

    #[test]
    fn test_too_short_waveform() {
        let waveform = waveform_of(vec![0.0; 50]);
        assert!(matches!(
            analyze(&waveform),
            Err(AnalysisError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_flat_waveform_has_no_breaths() {
        let waveform = waveform_of(vec![0.0; 500]);
        assert!(matches!(
            analyze(&waveform),
            Err(AnalysisError::NoBreathsDetected)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            amplitude_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            FlowAnalyzer::new(config),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_custom_thresholds_apply() {
        let config = AnalysisConfig::from_json(r#"{"thresholds": {"inspir_rate_per_min": 30}}"#)
            .unwrap();
        let analyzer = FlowAnalyzer::new(config).unwrap();
        let analysis = analyzer.analyze(&sine_waveform(2.5, 30.0, 60.0)).unwrap();

        assert_eq!(analysis.cumulative.inspir_rate, 0.0);
    }

    #[test]
    fn test_process_ndjson() {
        let ndjson: String = breath_cycle_values(6, 30)
            .iter()
            .enumerate()
            .map(|(i, v)| {
                format!(
                    "{{\"timestamp\":\"2025-03-01T23:00:{:02}.{:03}Z\",\"value\":{}}}\n",
                    i * 40 / 1000,
                    i * 40 % 1000,
                    v
                )
            })
            .collect();

        let report = FlowAnalyzer::with_defaults()
            .with_encoder(ReportEncoder::with_instance_id("ndjson".to_string()))
            .process_ndjson(ndjson.as_bytes())
            .unwrap();

        assert_eq!(report.producer.instance_id, "ndjson");
        assert_eq!(report.summary.breath_count, 6);
        assert_eq!(report.recording.interval_ms, 40.0);
    }
}
