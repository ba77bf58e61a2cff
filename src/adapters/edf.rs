//! EDF recording adapter
//!
//! Decodes European Data Format files as written by CPAP devices. Both
//! headers are described as ordered lists of fixed-width ASCII fields. The
//! signal header applies its list column-major: a field is stored for every
//! channel before the next field starts. Data records follow, each holding
//! `samples_per_record` little-endian `i16` values per channel in channel
//! order.

use super::WaveformAdapter;
use crate::error::AnalysisError;
use crate::types::Waveform;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::str::FromStr;

/// Size of the fixed header and of each channel's signal header
const HEADER_BLOCK_BYTES: usize = 256;

/// Label fragment identifying the airflow channel. Only the first matching
/// channel is decoded; BRP files carry a single flow channel.
const FLOW_LABEL: &str = "Flow";

/// Longest data record accepted (seconds)
const MAX_RECORD_DURATION_S: f64 = 86_400.0;

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    width: usize,
}

const fn field(name: &'static str, width: usize) -> Field {
    Field { name, width }
}

const FILE_FIELDS: [Field; 10] = [
    field("version", 8),
    field("patient", 80),
    field("recording", 80),
    field("start_date", 8),
    field("start_time", 8),
    field("header_bytes", 8),
    field("reserved", 44),
    field("record_count", 8),
    field("record_duration", 8),
    field("signal_count", 4),
];

const SIGNAL_FIELDS: [Field; 10] = [
    field("label", 16),
    field("transducer", 80),
    field("dimension", 8),
    field("physical_min", 8),
    field("physical_max", 8),
    field("digital_min", 8),
    field("digital_max", 8),
    field("prefilter", 80),
    field("samples_per_record", 8),
    field("reserved", 32),
];

type FieldValues = HashMap<&'static str, String>;

/// Decoded EDF file header
#[derive(Debug, Clone, PartialEq)]
pub struct EdfHeader {
    pub version: String,
    pub patient: String,
    pub recording: String,
    pub start_time: DateTime<Utc>,
    /// Offset of the first data record
    pub header_bytes: usize,
    /// Number of data records, `None` when the writer recorded -1
    pub record_count: Option<usize>,
    /// Length of one data record (seconds)
    pub record_duration_s: f64,
    pub signals: Vec<EdfSignal>,
}

/// One channel's signal header
#[derive(Debug, Clone, PartialEq)]
pub struct EdfSignal {
    pub label: String,
    pub transducer: String,
    pub dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
}

impl EdfSignal {
    /// Whether this is the airflow channel
    pub fn is_flow(&self) -> bool {
        self.label.contains(FLOW_LABEL)
    }

    /// Convert a stored value to the channel's physical unit
    pub fn to_physical(&self, digital: i16) -> f64 {
        let digital_span = f64::from(self.digital_max - self.digital_min);
        let physical_span = self.physical_max - self.physical_min;
        let offset = f64::from(i32::from(digital) - self.digital_min);
        self.physical_min + offset * physical_span / digital_span
    }

    /// Convert a stored flow value to L/min
    pub fn to_litres_per_minute(&self, digital: i16) -> f64 {
        let value = self.to_physical(digital);
        if self.dimension.eq_ignore_ascii_case("L/s") {
            value * 60.0
        } else {
            value
        }
    }

    /// Spacing between samples (milliseconds)
    pub fn interval_ms(&self, record_duration_s: f64) -> f64 {
        1000.0 * record_duration_s / self.samples_per_record as f64
    }
}

/// EDF flow recording adapter
pub struct EdfAdapter;

impl EdfAdapter {
    /// Decode the file and signal headers
    pub fn read_header(raw: &[u8]) -> Result<EdfHeader, AnalysisError> {
        let mut reader = FieldReader::new(raw);
        let file = reader.record(&FILE_FIELDS)?;

        let signal_count: usize = number(&file, "signal_count")?;
        let columns = reader.columns(&SIGNAL_FIELDS, signal_count)?;
        let signals = columns
            .iter()
            .map(signal_from_fields)
            .collect::<Result<Vec<_>, _>>()?;

        let header_bytes: usize = number(&file, "header_bytes")?;
        let expected = HEADER_BLOCK_BYTES * (signal_count + 1);
        if header_bytes < expected {
            return Err(AnalysisError::EdfParse(format!(
                "header claims {} bytes but {} signals need {}",
                header_bytes, signal_count, expected
            )));
        }

        let record_count: i64 = number(&file, "record_count")?;
        let record_count = match usize::try_from(record_count) {
            Ok(count) => Some(count),
            Err(_) if record_count == -1 => None,
            Err(_) => {
                return Err(AnalysisError::EdfParse(format!(
                    "invalid record count {}",
                    record_count
                )))
            }
        };

        Ok(EdfHeader {
            version: text(&file, "version"),
            patient: text(&file, "patient"),
            recording: text(&file, "recording"),
            start_time: parse_start(&text(&file, "start_date"), &text(&file, "start_time"))?,
            header_bytes,
            record_count,
            record_duration_s: number(&file, "record_duration")?,
            signals,
        })
    }
}

impl WaveformAdapter for EdfAdapter {
    fn parse(&self, raw: &[u8]) -> Result<Waveform, AnalysisError> {
        let header = Self::read_header(raw)?;

        let (channel, signal) = header
            .signals
            .iter()
            .enumerate()
            .find(|(_, signal)| signal.is_flow())
            .ok_or_else(|| {
                AnalysisError::MissingSignal(format!("no channel labelled '{}'", FLOW_LABEL))
            })?;

        if signal.samples_per_record == 0 {
            return Err(AnalysisError::EdfParse(format!(
                "channel '{}' has no samples per record",
                signal.label
            )));
        }
        if signal.digital_max == signal.digital_min {
            return Err(AnalysisError::EdfParse(format!(
                "channel '{}' has an empty digital range",
                signal.label
            )));
        }
        if !header.record_duration_s.is_finite()
            || header.record_duration_s <= 0.0
            || header.record_duration_s > MAX_RECORD_DURATION_S
        {
            return Err(AnalysisError::EdfParse(format!(
                "invalid record duration {}",
                header.record_duration_s
            )));
        }

        let record_bytes: usize = 2 * header
            .signals
            .iter()
            .map(|s| s.samples_per_record)
            .sum::<usize>();
        let data = raw.get(header.header_bytes..).unwrap_or_default();
        let available = data.len() / record_bytes;

        let records = match header.record_count {
            Some(count) if count > available => {
                return Err(AnalysisError::EdfParse(format!(
                    "file truncated: {} data records declared, {} present",
                    count, available
                )));
            }
            Some(count) => count,
            None => {
                if data.len() % record_bytes != 0 {
                    warn!(
                        "Ignoring {} trailing bytes after the last data record",
                        data.len() % record_bytes
                    );
                }
                available
            }
        };

        let offset = 2 * header.signals[..channel]
            .iter()
            .map(|s| s.samples_per_record)
            .sum::<usize>();
        let width = 2 * signal.samples_per_record;

        let mut values = Vec::with_capacity(records * signal.samples_per_record);
        for record in data.chunks_exact(record_bytes).take(records) {
            values.extend(
                record[offset..offset + width]
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .map(|digital| signal.to_litres_per_minute(digital)),
            );
        }

        debug!(
            "Decoded {} flow samples from channel '{}' ({} records)",
            values.len(),
            signal.label,
            records
        );

        Waveform::from_values(
            header.start_time,
            signal.interval_ms(header.record_duration_s),
            values,
        )
    }
}

/// Sequential reader over fixed-width ASCII fields
struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn next(&mut self, field: &Field) -> Result<String, AnalysisError> {
        let end = self.offset + field.width;
        let raw = self.bytes.get(self.offset..end).ok_or_else(|| {
            AnalysisError::EdfParse(format!("header truncated at field '{}'", field.name))
        })?;
        self.offset = end;
        Ok(String::from_utf8_lossy(raw).trim().to_string())
    }

    /// Read each field of `schema` once
    fn record(&mut self, schema: &[Field]) -> Result<FieldValues, AnalysisError> {
        let mut values = FieldValues::new();
        for field in schema {
            values.insert(field.name, self.next(field)?);
        }
        Ok(values)
    }

    /// Read each field of `schema` once per channel before moving on
    fn columns(
        &mut self,
        schema: &[Field],
        channels: usize,
    ) -> Result<Vec<FieldValues>, AnalysisError> {
        let mut columns = vec![FieldValues::new(); channels];
        for field in schema {
            for column in columns.iter_mut() {
                column.insert(field.name, self.next(field)?);
            }
        }
        Ok(columns)
    }
}

fn text(values: &FieldValues, name: &str) -> String {
    values.get(name).cloned().unwrap_or_default()
}

fn number<T: FromStr>(values: &FieldValues, name: &str) -> Result<T, AnalysisError> {
    let raw = values.get(name).map(String::as_str).unwrap_or_default();
    raw.parse()
        .map_err(|_| AnalysisError::EdfParse(format!("field '{}' is not a number: '{}'", name, raw)))
}

fn signal_from_fields(values: &FieldValues) -> Result<EdfSignal, AnalysisError> {
    Ok(EdfSignal {
        label: text(values, "label"),
        transducer: text(values, "transducer"),
        dimension: text(values, "dimension"),
        physical_min: number(values, "physical_min")?,
        physical_max: number(values, "physical_max")?,
        digital_min: number(values, "digital_min")?,
        digital_max: number(values, "digital_max")?,
        prefilter: text(values, "prefilter"),
        samples_per_record: number(values, "samples_per_record")?,
    })
}

/// Parse `dd.mm.yy` and `hh.mm.ss`; two-digit years from 85 on are 19xx
fn parse_start(date: &str, time: &str) -> Result<DateTime<Utc>, AnalysisError> {
    let invalid = || AnalysisError::EdfParse(format!("invalid start '{} {}'", date, time));

    let [day, month, year] = dotted_triplet(date).ok_or_else(invalid)?;
    let [hour, minute, second] = dotted_triplet(time).ok_or_else(invalid)?;
    let year = if year >= 85 { 1900 + year } else { 2000 + year };

    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(invalid)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

fn dotted_triplet(raw: &str) -> Option<[u32; 3]> {
    let mut parts = raw.split('.').map(|part| part.trim().parse::<u32>().ok());
    let triplet = [parts.next()??, parts.next()??, parts.next()??];
    match parts.next() {
        Some(_) => None,
        None => Some(triplet),
    }
}
