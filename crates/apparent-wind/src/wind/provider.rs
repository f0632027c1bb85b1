//! Open-Meteo reanalysis and forecast endpoints.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{
    config::ProviderConfig,
    errors::{DataQualityError, ProviderError},
};

pub const HOURLY_FIELDS: &str = "wind_speed_10m,wind_direction_10m";

/// One of the two wind data providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// ERA5 reanalysis archive, for windows a few days old or more.
    #[serde(rename = "era5")]
    Reanalysis,
    /// Short-range forecast, for recent and near-future windows.
    #[serde(rename = "forecast")]
    Forecast,
}

impl Provider {
    pub fn tag(self) -> &'static str {
        match self {
            Provider::Reanalysis => "era5",
            Provider::Forecast => "forecast",
        }
    }

    /// Name of the wind speed unit selector. The two APIs spell it differently.
    pub fn speed_unit_param(self) -> &'static str {
        match self {
            Provider::Reanalysis => "wind_speed_unit",
            Provider::Forecast => "windspeed_unit",
        }
    }

    pub fn query_params(self, query: &WindQuery) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", format!("{:.6}", query.lat)),
            ("longitude", format!("{:.6}", query.lon)),
            ("start_date", query.start.to_string()),
            ("end_date", query.end.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            (self.speed_unit_param(), "ms".to_string()),
            ("timeformat", "iso8601".to_string()),
            ("timezone", "UTC".to_string()),
        ]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which provider(s) a fetch may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourcePreference {
    /// Reanalysis first, forecast if that fails.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "era5")]
    Reanalysis,
    #[serde(rename = "forecast")]
    Forecast,
}

impl fmt::Display for SourcePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourcePreference::Auto => "auto",
            SourcePreference::Reanalysis => "era5",
            SourcePreference::Forecast => "forecast",
        })
    }
}

/// A whole-day request for one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindQuery {
    pub lat: f64,
    pub lon: f64,
    pub start: Date,
    pub end: Date,
}

impl WindQuery {
    /// Calendar days (UTC) covering the instant range.
    pub fn covering(lat: f64, lon: f64, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            lat,
            lon,
            start: start.to_offset(UtcOffset::UTC).date(),
            end: end.to_offset(UtcOffset::UTC).date(),
        }
    }
}

/// Provider response body. Everything is optional so structural problems
/// surface as [`DataQualityError`]s rather than decode failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyResponse {
    #[serde(default)]
    pub hourly: Option<HourlyArrays>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyArrays {
    #[serde(default)]
    pub time: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub wind_speed_10m: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub wind_direction_10m: Option<Vec<Option<f64>>>,
}

/// Fetches one provider's hourly payload.
#[async_trait]
pub trait WindTransport: Send + Sync {
    async fn hourly(
        &self,
        provider: Provider,
        query: &WindQuery,
    ) -> Result<HourlyResponse, ProviderError>;
}

/// HTTP transport to the public Open-Meteo API.
#[derive(Debug, Clone)]
pub struct OpenMeteoTransport {
    client: reqwest::Client,
    reanalysis_url: String,
    forecast_url: String,
}

impl OpenMeteoTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            reanalysis_url: config.reanalysis_url.clone(),
            forecast_url: config.forecast_url.clone(),
        })
    }

    fn endpoint(&self, provider: Provider) -> &str {
        match provider {
            Provider::Reanalysis => &self.reanalysis_url,
            Provider::Forecast => &self.forecast_url,
        }
    }
}

#[async_trait]
impl WindTransport for OpenMeteoTransport {
    async fn hourly(
        &self,
        provider: Provider,
        query: &WindQuery,
    ) -> Result<HourlyResponse, ProviderError> {
        let params = provider.query_params(query);
        tracing::debug!("[Open-Meteo {provider}] {params:?}");

        let response = self
            .client
            .get(self.endpoint(provider))
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
            });
        }

        response
            .json::<HourlyResponse>()
            .await
            .map_err(|e| ProviderError::Unusable {
                provider,
                reason: DataQualityError::Malformed(e.to_string()),
            })
    }
}
