//! Hourly wind series as a time-indexed vector field.
//!
//! Directions are circular, so the series is interpolated on its (u, v)
//! components and speed/direction are recovered afterwards.

use rayon::prelude::*;
use time::OffsetDateTime;

use crate::{
    errors::DataQualityError,
    geodesy::met_to_uv,
    models::{AmbientWind, Fix, WindSample},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindVector {
    pub time: OffsetDateTime,
    pub u: f64,
    pub v: f64,
}

impl WindVector {
    pub fn from_sample(sample: &WindSample) -> Self {
        let (u, v) = met_to_uv(sample.speed_ms, sample.direction_deg);
        Self {
            time: sample.time,
            u,
            v,
        }
    }
}

/// Non-empty, strictly time-ascending wind vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct WindVectorSeries {
    vectors: Vec<WindVector>,
}

impl WindVectorSeries {
    pub fn from_samples<'a>(
        samples: impl IntoIterator<Item = &'a WindSample>,
    ) -> Result<Self, DataQualityError> {
        Self::from_vectors(samples.into_iter().map(WindVector::from_sample).collect())
    }

    /// Sorts by time; of several vectors at the same instant the first one wins.
    pub fn from_vectors(mut vectors: Vec<WindVector>) -> Result<Self, DataQualityError> {
        if vectors.is_empty() {
            return Err(DataQualityError::NoValidSamples);
        }
        vectors.sort_by_key(|w| w.time);
        vectors.dedup_by(|later, kept| later.time == kept.time);
        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[WindVector] {
        &self.vectors
    }

    /// (u, v) at `at`. Clamps to the end samples outside the covered range.
    pub fn interpolate(&self, at: OffsetDateTime) -> (f64, f64) {
        let first = self.vectors[0];
        let last = self.vectors[self.vectors.len() - 1];
        if at <= first.time {
            return (first.u, first.v);
        }
        if at >= last.time {
            return (last.u, last.v);
        }

        // first.time < at < last.time, so 1 <= idx <= len - 1
        let idx = self.vectors.partition_point(|w| w.time < at);
        let lower = self.vectors[idx - 1];
        let upper = self.vectors[idx];

        let span = (upper.time - lower.time).as_seconds_f64();
        if span <= 0.0 {
            return (lower.u, lower.v);
        }
        let f = (at - lower.time).as_seconds_f64() / span;
        (
            lower.u + f * (upper.u - lower.u),
            lower.v + f * (upper.v - lower.v),
        )
    }

    pub fn wind_at(&self, at: OffsetDateTime) -> AmbientWind {
        let (u, v) = self.interpolate(at);
        AmbientWind::from_uv(u, v)
    }
}

/// Ambient wind for every fix; fixes without a timestamp get none.
pub fn map_wind(fixes: &[Fix], series: &WindVectorSeries) -> Vec<Option<AmbientWind>> {
    let winds: Vec<Option<AmbientWind>> = fixes
        .par_iter()
        .map(|fix| fix.timestamp.map(|t| series.wind_at(t)))
        .collect();
    let mapped = winds.iter().filter(|w| w.is_some()).count();
    tracing::info!("Wind mapping complete: {} / {} timestamps", mapped, fixes.len());
    winds
}
