//! Activity file decoders for GPX, TCX, and FIT formats.
//!
//! Every decoder produces a flat series of [`Fix`]es. Points that lack a
//! position or timestamp are kept; the enrichment stages skip what they
//! cannot use.

use bytes::Buf as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use time::OffsetDateTime;

use crate::models::{Fix, parse_instant};

/// Only the head of an upload is inspected when sniffing its type.
const SNIFF_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Gpx,
    Tcx,
    Fit,
    Other,
}

impl FileType {
    pub fn from_filename(name: &str) -> Self {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("gpx") => FileType::Gpx,
            Some("tcx") => FileType::Tcx,
            Some("fit") => FileType::Fit,
            _ => FileType::Other,
        }
    }

    pub fn detect_from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[8..12] == b".FIT" {
            return FileType::Fit;
        }
        let head = &bytes[..bytes.len().min(SNIFF_LEN)];
        let text = String::from_utf8_lossy(head).to_ascii_lowercase();
        let text = text.trim_start();
        if !text.starts_with('<') {
            return FileType::Other;
        }
        // Unrecognised XML is tried as GPX.
        if text.contains("trainingcenterdatabase") {
            FileType::Tcx
        } else {
            FileType::Gpx
        }
    }

    /// Extension first, then content.
    pub fn detect(filename: Option<&str>, bytes: &[u8]) -> Self {
        match filename.map(FileType::from_filename) {
            Some(FileType::Other) | None => FileType::detect_from_bytes(bytes),
            Some(known) => known,
        }
    }
}

/// Error type for parsing failures
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse GPX file: {0}")]
    GpxError(String),
    #[error("Failed to parse TCX file: {0}")]
    TcxError(String),
    #[error("Failed to parse FIT file: {0}")]
    FitError(String),
    #[error("Could not detect file type (gpx/tcx/fit)")]
    UnsupportedFileType,
}

/// Decodes an activity file. `FileType::Other` is resolved by sniffing.
pub fn parse_activity_file(file_type: FileType, bytes: Bytes) -> Result<Vec<Fix>, ParseError> {
    let actual_type = if file_type == FileType::Other {
        FileType::detect_from_bytes(&bytes)
    } else {
        file_type
    };

    let fixes = match actual_type {
        FileType::Gpx => parse_gpx(bytes),
        FileType::Tcx => parse_tcx(bytes),
        FileType::Fit => parse_fit(bytes),
        FileType::Other => Err(ParseError::UnsupportedFileType),
    }?;
    tracing::info!("Decoded {} points from {:?} file", fixes.len(), actual_type);
    Ok(fixes)
}

pub fn parse_gpx(bytes: Bytes) -> Result<Vec<Fix>, ParseError> {
    let gpx = gpx::read(bytes.reader()).map_err(|e| ParseError::GpxError(e.to_string()))?;

    let mut fixes = Vec::new();
    for track in &gpx.tracks {
        for seg in &track.segments {
            for pt in &seg.points {
                let timestamp = pt
                    .time
                    .as_ref()
                    .and_then(|t| t.format().ok())
                    .and_then(|s| parse_instant(&s));

                fixes.push(Fix {
                    timestamp,
                    lat: Some(pt.point().y()),
                    lon: Some(pt.point().x()),
                    altitude_m: pt.elevation,
                    speed_m_s: pt.speed,
                    ..Default::default()
                });
            }
        }
    }
    Ok(fixes)
}

/// Parse a TCX (Training Center XML) file.
pub fn parse_tcx(bytes: Bytes) -> Result<Vec<Fix>, ParseError> {
    let mut buf_reader = BufReader::new(bytes.reader());
    let tcx_data =
        tcx::read(&mut buf_reader).map_err(|e| ParseError::TcxError(format!("{e:?}")))?;

    let mut fixes = Vec::new();
    let Some(ref activities) = tcx_data.activities else {
        return Ok(fixes);
    };
    for activity in &activities.activities {
        for lap in &activity.laps {
            for track in &lap.tracks {
                for trackpoint in &track.trackpoints {
                    let (lat, lon) = match trackpoint.position {
                        Some(ref position) => (Some(position.latitude), Some(position.longitude)),
                        None => (None, None),
                    };
                    fixes.push(Fix {
                        timestamp: chrono_to_offset_datetime(&trackpoint.time),
                        lat,
                        lon,
                        altitude_m: trackpoint.altitude_meters,
                        heart_rate_bpm: trackpoint.heart_rate.as_ref().map(|h| h.value as i32),
                        cadence_rpm: trackpoint.cadence.map(|c| c as i32),
                        speed_m_s: trackpoint
                            .extensions
                            .as_ref()
                            .and_then(|ext| ext.tpx.as_ref())
                            .and_then(|tpx| tpx.speed),
                        ..Default::default()
                    });
                }
            }
        }
    }
    Ok(fixes)
}

fn chrono_to_offset_datetime<Tz: chrono::TimeZone>(
    dt: &chrono::DateTime<Tz>,
) -> Option<OffsetDateTime> {
    let nanos = i128::from(dt.timestamp()) * 1_000_000_000 + i128::from(dt.timestamp_subsec_nanos());
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

/// Parse a FIT (Flexible and Interoperable Data Transfer) file.
pub fn parse_fit(bytes: Bytes) -> Result<Vec<Fix>, ParseError> {
    let fit_data =
        fitparser::from_bytes(&bytes).map_err(|e| ParseError::FitError(e.to_string()))?;

    let mut fixes = Vec::new();
    for record in fit_data {
        if record.kind() != fitparser::profile::field_types::MesgNum::Record {
            continue;
        }

        let mut fix = Fix::default();
        let mut enhanced_speed = None;
        for field in record.fields() {
            match field.name() {
                "position_lat" => {
                    if let fitparser::Value::SInt32(v) = field.value() {
                        fix.lat = Some(semicircles_to_degrees(*v));
                    }
                }
                "position_long" => {
                    if let fitparser::Value::SInt32(v) = field.value() {
                        fix.lon = Some(semicircles_to_degrees(*v));
                    }
                }
                "altitude" | "enhanced_altitude" => {
                    fix.altitude_m = extract_fit_f64(field.value()).or(fix.altitude_m);
                }
                "speed" => fix.speed_m_s = extract_fit_f64(field.value()),
                "enhanced_speed" => enhanced_speed = extract_fit_f64(field.value()),
                "timestamp" => {
                    if let fitparser::Value::Timestamp(t) = field.value() {
                        fix.timestamp = chrono_to_offset_datetime(t);
                    }
                }
                "heart_rate" => fix.heart_rate_bpm = extract_fit_i32(field.value()),
                "cadence" => fix.cadence_rpm = extract_fit_i32(field.value()),
                _ => {}
            }
        }
        fix.speed_m_s = enhanced_speed.or(fix.speed_m_s);
        fixes.push(fix);
    }
    Ok(fixes)
}

/// FIT uses semicircles where 2^31 semicircles = 180 degrees.
fn semicircles_to_degrees(semicircles: i32) -> f64 {
    (semicircles as f64) * (180.0 / 2_147_483_648.0)
}

fn extract_fit_i32(value: &fitparser::Value) -> Option<i32> {
    match value {
        fitparser::Value::SInt8(v) => Some(*v as i32),
        fitparser::Value::UInt8(v) => Some(*v as i32),
        fitparser::Value::SInt16(v) => Some(*v as i32),
        fitparser::Value::UInt16(v) => Some(*v as i32),
        fitparser::Value::SInt32(v) => Some(*v),
        fitparser::Value::UInt32(v) => i32::try_from(*v).ok(),
        _ => None,
    }
}

fn extract_fit_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        _ => None,
    }
}
