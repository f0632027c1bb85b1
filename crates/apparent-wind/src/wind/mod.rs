//! Hourly wind retrieval with reanalysis → forecast fallback.

mod cache;
mod provider;

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

pub use cache::{BIN_STEP_DEG, CacheKey, DEFAULT_CACHE_CAPACITY, WindCache};
pub use provider::{
    HOURLY_FIELDS, HourlyArrays, HourlyResponse, OpenMeteoTransport, Provider, SourcePreference,
    WindQuery, WindTransport,
};

use crate::{
    errors::{DataQualityError, ProviderError},
    interpolation::WindVectorSeries,
    models::{WindSample, parse_instant},
};

/// Fetches an hourly wind series for one coordinate and time window.
#[derive(Clone)]
pub struct WindSourceClient {
    transport: Arc<dyn WindTransport>,
}

impl WindSourceClient {
    pub fn new(transport: Arc<dyn WindTransport>) -> Self {
        Self { transport }
    }

    /// Under `Auto` only a reanalysis failure triggers the forecast attempt;
    /// forced preferences never fall back.
    pub async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        start: OffsetDateTime,
        end: OffsetDateTime,
        preference: SourcePreference,
    ) -> Result<(Provider, WindVectorSeries), ProviderError> {
        let query = WindQuery::covering(lat, lon, start, end);
        self.fetch_query(&query, preference).await
    }

    /// Like [`fetch`](Self::fetch), consulting and filling `cache` first.
    pub async fn fetch_cached(
        &self,
        cache: &WindCache,
        lat: f64,
        lon: f64,
        start: OffsetDateTime,
        end: OffsetDateTime,
        preference: SourcePreference,
    ) -> Result<(Provider, WindVectorSeries), ProviderError> {
        let query = WindQuery::covering(lat, lon, start, end);
        let key = CacheKey::new(&query, preference);
        if let Some(hit) = cache.get(&key) {
            tracing::debug!("Wind cache hit for {key:?}");
            return Ok(hit);
        }
        let (source, series) = self.fetch_query(&query, preference).await?;
        cache.insert(key, source, series.clone());
        Ok((source, series))
    }

    async fn fetch_query(
        &self,
        query: &WindQuery,
        preference: SourcePreference,
    ) -> Result<(Provider, WindVectorSeries), ProviderError> {
        let provider = match preference {
            SourcePreference::Reanalysis => Provider::Reanalysis,
            SourcePreference::Forecast => Provider::Forecast,
            SourcePreference::Auto => {
                return match self.try_provider(Provider::Reanalysis, query).await {
                    Ok(series) => Ok((Provider::Reanalysis, series)),
                    Err(primary) => {
                        info!("Falling back to {} wind data", Provider::Forecast);
                        match self.try_provider(Provider::Forecast, query).await {
                            Ok(series) => Ok((Provider::Forecast, series)),
                            Err(fallback) => Err(ProviderError::Exhausted {
                                primary: Box::new(primary),
                                fallback: Box::new(fallback),
                            }),
                        }
                    }
                };
            }
        };
        let series = self.try_provider(provider, query).await?;
        Ok((provider, series))
    }

    async fn try_provider(
        &self,
        provider: Provider,
        query: &WindQuery,
    ) -> Result<WindVectorSeries, ProviderError> {
        let result = match self.transport.hourly(provider, query).await {
            Ok(response) => series_from_hourly(response)
                .map_err(|reason| ProviderError::Unusable { provider, reason }),
            Err(e) => Err(e),
        };
        match &result {
            Ok(series) => info!("[{provider}] {} hourly samples", series.len()),
            Err(e) => warn!("[{provider}] unusable hourly: {e}"),
        }
        result
    }
}

/// Validates a provider payload and converts it to a vector series. Entries
/// with an unparsable time, speed or direction are dropped.
pub fn series_from_hourly(response: HourlyResponse) -> Result<WindVectorSeries, DataQualityError> {
    let hourly = response.hourly.ok_or(DataQualityError::MissingHourly)?;

    let times = non_empty(hourly.time, "time")?;
    let speeds = non_empty(hourly.wind_speed_10m, "wind_speed_10m")?;
    let directions = non_empty(hourly.wind_direction_10m, "wind_direction_10m")?;
    if times.len() != speeds.len() || times.len() != directions.len() {
        return Err(DataQualityError::LengthMismatch {
            time: times.len(),
            speed: speeds.len(),
            direction: directions.len(),
        });
    }

    let samples: Vec<WindSample> = times
        .iter()
        .zip(&speeds)
        .zip(&directions)
        .filter_map(|((time, speed), direction)| {
            let time = time.as_deref().and_then(parse_instant)?;
            let speed_ms = speed.filter(|s| s.is_finite())?;
            let direction_deg = direction.filter(|d| d.is_finite())?;
            Some(WindSample {
                time,
                speed_ms,
                direction_deg,
            })
        })
        .collect();

    WindVectorSeries::from_samples(&samples)
}

fn non_empty<T>(values: Option<Vec<T>>, name: &'static str) -> Result<Vec<T>, DataQualityError> {
    match values {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DataQualityError::MissingArray(name)),
    }
}
