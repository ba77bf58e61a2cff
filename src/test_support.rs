//! Synthetic waveforms shared by the unit tests

use crate::types::{BreathIndices, Inspiration, Waveform};
use chrono::{TimeZone, Utc};
use std::f64::consts::PI;

pub const INTERVAL_MS: f64 = 40.0;

/// Waveform from raw values at the standard 40 ms interval
pub fn waveform_of(values: Vec<f64>) -> Waveform {
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap();
    Waveform::from_values(start, INTERVAL_MS, values).unwrap()
}

/// Sine flow starting at zero and rising, sampled every 40 ms
pub fn sine_values(period_s: f64, amplitude: f64, duration_s: f64) -> Vec<f64> {
    let count = (duration_s * 1000.0 / INTERVAL_MS).round() as usize;
    (0..count)
        .map(|i| {
            let t = i as f64 * INTERVAL_MS / 1000.0;
            amplitude * (2.0 * PI * t / period_s).sin()
        })
        .collect()
}

pub fn sine_waveform(period_s: f64, amplitude: f64, duration_s: f64) -> Waveform {
    waveform_of(sine_values(period_s, amplitude, duration_s))
}

/// Idealised breathing: a short triangular inspiration, a sharp expiration
/// to -40 that recovers linearly, then `pause` samples of zero flow.
///
/// Each cycle is 63 + `pause` samples and follows 30 samples of silence.
pub fn breath_cycle_values(cycles: usize, pause: usize) -> Vec<f64> {
    let mut values = vec![0.0; 30];
    for _ in 0..cycles {
        values.push(0.0);
        values.extend([6.0, 12.0, 18.0, 24.0, 30.0, 24.0, 18.0, 12.0, 6.0]);
        values.extend(std::iter::repeat(0.0).take(10));
        values.extend([-10.0, -20.0, -30.0, -40.0]);
        values.extend((1..40).map(|k| -40.0 + k as f64));
        values.extend(std::iter::repeat(0.0).take(pause));
    }
    values
}

/// Inspiration with only its boundaries and peak set
pub fn inspiration_at(start: usize, end: usize, max_value: f64) -> Inspiration {
    Inspiration {
        start,
        end,
        start_time: Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap(),
        max_value,
        mid_point: start + (end - start + 1) / 2,
        left_volume: 0.0,
        right_volume: 0.0,
        left_percent: 50.0,
        top90_percent: 32.0,
        multi_peak: false,
        mid_var: 5.0,
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

/// One channel of a synthetic EDF file
pub struct EdfChannel {
    pub label: &'static str,
    pub dimension: &'static str,
    pub physical: (f64, f64),
    pub digital: (i32, i32),
    pub samples_per_record: usize,
    /// Every record's samples back to back
    pub data: Vec<i16>,
}

fn ascii(out: &mut Vec<u8>, value: &str, width: usize) {
    let mut field = format!("{:<width$}", value, width = width).into_bytes();
    field.truncate(width);
    out.extend(field);
}

/// Serialise an EDF file; the record count field is written verbatim
pub fn edf_bytes(
    date: &str,
    time: &str,
    record_duration: &str,
    channels: &[EdfChannel],
    record_count: &str,
) -> Vec<u8> {
    let mut out = Vec::new();
    ascii(&mut out, "0", 8);
    ascii(&mut out, "X X X X", 80);
    ascii(&mut out, "Startdate X X X X", 80);
    ascii(&mut out, date, 8);
    ascii(&mut out, time, 8);
    ascii(&mut out, &(256 * (channels.len() + 1)).to_string(), 8);
    ascii(&mut out, "", 44);
    ascii(&mut out, record_count, 8);
    ascii(&mut out, record_duration, 8);
    ascii(&mut out, &channels.len().to_string(), 4);

    let columns: [(usize, fn(&EdfChannel) -> String); 10] = [
        (16, |c| c.label.to_string()),
        (80, |_| "".to_string()),
        (8, |c| c.dimension.to_string()),
        (8, |c| c.physical.0.to_string()),
        (8, |c| c.physical.1.to_string()),
        (8, |c| c.digital.0.to_string()),
        (8, |c| c.digital.1.to_string()),
        (80, |_| "".to_string()),
        (8, |c| c.samples_per_record.to_string()),
        (32, |_| "".to_string()),
    ];
    for (width, value) in columns {
        for channel in channels {
            ascii(&mut out, &value(channel), width);
        }
    }

    let records = channels
        .first()
        .map(|c| c.data.len() / c.samples_per_record)
        .unwrap_or(0);
    for record in 0..records {
        for channel in channels {
            let from = record * channel.samples_per_record;
            for sample in &channel.data[from..from + channel.samples_per_record] {
                out.extend(sample.to_le_bytes());
            }
        }
    }
    out
}
