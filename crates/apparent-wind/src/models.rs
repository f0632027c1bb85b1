use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339, macros::format_description};

use crate::geodesy::{uv_speed, uv_to_met_direction};

/// One normalized position sample as produced by the file decoders.
///
/// Every field is optional: decoders hand over whatever the source recorded,
/// and the enrichment stages skip fixes that lack what they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    #[serde(default, with = "instant")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    /// Speed over ground in m/s.
    #[serde(default)]
    pub speed_m_s: Option<f64>,
    /// Course over ground, degrees clockwise from north.
    #[serde(default)]
    pub course_deg: Option<f64>,
    #[serde(default)]
    pub heart_rate_bpm: Option<i32>,
    #[serde(default)]
    pub cadence_rpm: Option<i32>,
}

impl Fix {
    pub fn new(timestamp: OffsetDateTime, lat: f64, lon: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            lat: Some(lat),
            lon: Some(lon),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed_m_s: f64) -> Self {
        self.speed_m_s = Some(speed_m_s);
        self
    }

    /// (lat, lon) when both coordinates are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// One hourly record from a wind provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub time: OffsetDateTime,
    /// Wind speed at 10 m in m/s.
    pub speed_ms: f64,
    /// Direction the wind blows from, degrees.
    pub direction_deg: f64,
}

/// Ambient wind at a fix, interpolated from the hourly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientWind {
    pub speed_ms: f64,
    /// Meteorological "from" direction in [0, 360).
    pub direction_deg: f64,
    pub u_ms: f64,
    pub v_ms: f64,
}

impl AmbientWind {
    /// From east/north "towards" components.
    pub fn from_uv(u: f64, v: f64) -> Self {
        Self {
            speed_ms: uv_speed(u, v),
            direction_deg: uv_to_met_direction(u, v),
            u_ms: u,
            v_ms: v,
        }
    }
}

/// Boat velocity, east (u) and north (v) components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoatVelocity {
    pub u_ms: f64,
    pub v_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApparentWind {
    pub speed_ms: f64,
    /// Direction the apparent wind comes from, [0, 360).
    pub direction_deg: f64,
    /// Angle off the bow in (-180, 180], positive to starboard. Absent when the
    /// boat is too slow for its course to mean anything.
    pub angle_deg: Option<f64>,
    /// Along-track component, positive = headwind.
    pub head_ms: Option<f64>,
    /// Cross-track component, positive = from starboard.
    pub cross_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFix {
    #[serde(flatten)]
    pub fix: Fix,
    pub wind: Option<AmbientWind>,
    pub boat: Option<BoatVelocity>,
    pub apparent: Option<ApparentWind>,
}

impl EnrichedFix {
    pub fn head_ms(&self) -> Option<f64> {
        self.apparent.and_then(|a| a.head_ms)
    }

    pub fn cross_ms(&self) -> Option<f64> {
        self.apparent.and_then(|a| a.cross_ms)
    }
}

/// Session statistics over an enriched track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub duration_s: f64,
    pub samples: usize,
    /// Samples with a head/cross decomposition; denominator of the shares below.
    pub classified: usize,
    pub median_apparent_speed_ms: Option<f64>,
    pub head_share: f64,
    pub tail_share: f64,
    pub cross_share: f64,
    /// Headwind-equivalent distance in meters.
    pub headwind_distance_m: f64,
    /// Seconds per reference distance at the average observed speed.
    pub observed_pace_s: Option<f64>,
    /// Seconds per reference distance at the average wind-adjusted speed.
    pub adjusted_pace_s: Option<f64>,
}

/// How to pick the single coordinate the wind series is fetched for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordStrategy {
    #[default]
    Centroid,
    Start,
    Midpoint,
}

/// Parses an instant the way providers and clients send them: RFC 3339, or a
/// naive ISO date-time which is taken as UTC.
pub fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t);
    }
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .or_else(|_| {
            PrimitiveDateTime::parse(
                raw,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .or_else(|_| {
            PrimitiveDateTime::parse(
                raw,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
            )
        })
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Serde adapter for optional instants: lenient on input, RFC 3339 on output.
pub mod instant {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => {
                let text = t.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_instant))
    }
}
