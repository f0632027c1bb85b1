use axum::{
    Extension,
    extract::{Multipart, Query},
    http::StatusCode,
    response::Json,
};
use bytes::BytesMut;
use geo::{BoundingRect, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    errors::AppError,
    file_parsers::{FileType, parse_activity_file},
    models::{AmbientWind, CoordStrategy, EnrichedFix, Fix, TrackSummary},
    pipeline::{EnrichRequest, Enricher},
    wind::{Provider, SourcePreference},
};

/// Number of points echoed back when the full series is not requested.
const SAMPLE_LEN: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct ReturnFullQuery {
    #[serde(default)]
    pub return_full: bool,
}

fn sample_and_full<T: Clone>(items: Vec<T>, return_full: bool) -> (Vec<T>, Option<Vec<T>>) {
    let sample = items.iter().take(SAMPLE_LEN).cloned().collect();
    (sample, return_full.then_some(items))
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// File decoding
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ParseResult {
    pub file_type: FileType,
    pub num_points: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    /// (min_lat, min_lon, max_lat, max_lon)
    pub bounds: Option<[f64; 4]>,
    pub speeds_derived: usize,
    pub sample: Vec<Fix>,
    pub points: Option<Vec<Fix>>,
}

fn bounds(fixes: &[Fix]) -> Option<[f64; 4]> {
    let points: MultiPoint<f64> = fixes
        .iter()
        .filter_map(Fix::position)
        .map(|(lat, lon)| Point::new(lon, lat))
        .collect();
    let rect = points.bounding_rect()?;
    Some([rect.min().y, rect.min().x, rect.max().y, rect.max().x])
}

/// Decodes an uploaded GPX/TCX/FIT file and fills in missing speeds.
pub async fn parse_gps(
    Extension(enricher): Extension<Enricher>,
    Query(params): Query<ReturnFullQuery>,
    mut multipart: Multipart,
) -> Result<Json<ParseResult>, AppError> {
    let mut file_bytes = BytesMut::new();
    let mut file_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::InvalidInput("Failed to process multipart data".to_string()))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(str::to_string);
            let chunk = field
                .bytes()
                .await
                .map_err(|_| AppError::InvalidInput("Failed to read file data".to_string()))?;
            file_bytes.extend(chunk);
        } else {
            tracing::warn!("Unexpected field: {:?}", field.name());
        }
    }

    if file_bytes.is_empty() {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    }
    let file_bytes = file_bytes.freeze();

    let file_type = FileType::detect(file_name.as_deref(), &file_bytes);
    let fixes = parse_activity_file(file_type, file_bytes)?;

    let derivation = enricher.derive(&fixes);
    let mut fixes = derivation.fixes;
    fixes.sort_by_key(|f| f.timestamp);

    let mut times = fixes.iter().filter_map(|f| f.timestamp);
    let start_time = times.next();
    let end_time = times.next_back().or(start_time);

    let (sample, points) = sample_and_full(fixes.clone(), params.return_full);
    Ok(Json(ParseResult {
        file_type,
        num_points: fixes.len(),
        start_time,
        end_time,
        bounds: bounds(&fixes),
        speeds_derived: derivation.speeds_derived,
        sample,
        points,
    }))
}

// ============================================================================
// Wind mapping
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WindForTrackRequest {
    pub points: Vec<Fix>,
    #[serde(default)]
    pub coord_strategy: CoordStrategy,
    #[serde(default)]
    pub source_preference: SourcePreference,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindedFix {
    #[serde(flatten)]
    pub fix: Fix,
    pub wind: Option<AmbientWind>,
}

#[derive(Debug, Serialize)]
pub struct WindForTrackResult {
    pub source: Provider,
    pub lat_used: f64,
    pub lon_used: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub hourly_count: usize,
    pub mapped_count: usize,
    pub sample: Vec<WindedFix>,
    pub points: Option<Vec<WindedFix>>,
}

/// Fetches hourly wind for the track and interpolates it onto every point.
pub async fn wind_for_track(
    Extension(enricher): Extension<Enricher>,
    Query(params): Query<ReturnFullQuery>,
    Json(req): Json<WindForTrackRequest>,
) -> Result<Json<WindForTrackResult>, AppError> {
    let track = enricher
        .wind_for_track(&req.points, req.coord_strategy, req.source_preference)
        .await?;
    let mapped_count = track.mapped_count();

    let winded: Vec<WindedFix> = req
        .points
        .into_iter()
        .zip(track.winds)
        .map(|(fix, wind)| WindedFix { fix, wind })
        .collect();
    let (sample, points) = sample_and_full(winded, params.return_full);

    Ok(Json(WindForTrackResult {
        source: track.source,
        lat_used: track.lat,
        lon_used: track.lon,
        start_time: track.start,
        end_time: track.end,
        hourly_count: track.hourly_count,
        mapped_count,
        sample,
        points,
    }))
}

// ============================================================================
// Apparent wind
// ============================================================================

/// A request point. Points echoed back from `/wind-for-track` keep their
/// `wind`; flat `wind_u10_ms`/`wind_v10_ms` components are accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct ApparentPoint {
    #[serde(flatten)]
    pub fix: Fix,
    #[serde(default)]
    pub wind: Option<SuppliedWind>,
    #[serde(default)]
    pub wind_u10_ms: Option<f64>,
    #[serde(default)]
    pub wind_v10_ms: Option<f64>,
}

/// The vector part of an [`AmbientWind`]; speed and direction are recomputed.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SuppliedWind {
    pub u_ms: f64,
    pub v_ms: f64,
}

impl ApparentPoint {
    pub fn supplied_wind(&self) -> Option<AmbientWind> {
        match (self.wind_u10_ms, self.wind_v10_ms) {
            (Some(u), Some(v)) => Some(AmbientWind::from_uv(u, v)),
            _ => self.wind.map(|w| AmbientWind::from_uv(w.u_ms, w.v_ms)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApparentWindRequest {
    pub points: Vec<ApparentPoint>,
    #[serde(flatten)]
    pub options: EnrichRequest,
}

#[derive(Debug, Serialize)]
pub struct ApparentWindResult {
    pub source: Option<Provider>,
    pub lat_used: Option<f64>,
    pub lon_used: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub hourly_count: Option<usize>,
    pub mapped_count: usize,
    pub supplied_count: usize,
    pub speeds_derived: usize,
    pub summary: TrackSummary,
    pub sample: Vec<EnrichedFix>,
    pub points: Option<Vec<EnrichedFix>>,
}

/// Full enrichment: kinematics, wind, apparent wind and the session summary.
/// Providers are only contacted for timed points that arrive without wind.
pub async fn apparent_wind(
    Extension(enricher): Extension<Enricher>,
    Query(params): Query<ReturnFullQuery>,
    Json(req): Json<ApparentWindRequest>,
) -> Result<Json<ApparentWindResult>, AppError> {
    if let Some(min_speed) = req.options.min_speed_ms
        && !(min_speed.is_finite() && min_speed >= 0.0)
    {
        return Err(AppError::InvalidInput(format!(
            "min_speed_ms must be a non-negative number, got {min_speed}"
        )));
    }

    let (fixes, supplied): (Vec<Fix>, Vec<Option<AmbientWind>>) = req
        .points
        .into_iter()
        .map(|point| {
            let wind = point.supplied_wind();
            (point.fix, wind)
        })
        .unzip();

    let enrichment = enricher
        .enrich_with_wind(&fixes, &supplied, req.options)
        .await?;
    let (sample, points) = sample_and_full(enrichment.fixes, params.return_full);

    Ok(Json(ApparentWindResult {
        source: enrichment.source,
        lat_used: enrichment.lat_used,
        lon_used: enrichment.lon_used,
        start_time: enrichment.start_time,
        end_time: enrichment.end_time,
        hourly_count: enrichment.hourly_count,
        mapped_count: enrichment.mapped_count,
        supplied_count: enrichment.supplied_count,
        speeds_derived: enrichment.speeds_derived,
        summary: enrichment.summary,
        sample,
        points,
    }))
}
