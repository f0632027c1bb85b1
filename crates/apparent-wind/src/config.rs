//! Runtime configuration, read from the environment with typed defaults.

use std::{env, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    apparent::DEFAULT_MIN_SPEED_MS, kinematics::DEFAULT_MAX_PLAUSIBLE_SPEED_MS,
    wind::DEFAULT_CACHE_CAPACITY,
};

pub const OPEN_METEO_ARCHIVE: &str = "https://archive-api.open-meteo.com/v1/era5";
pub const OPEN_METEO_FORECAST: &str = "https://api.open-meteo.com/v1/forecast";

/// Wind provider endpoints and per-call timeout.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub reanalysis_url: String,
    pub forecast_url: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            reanalysis_url: OPEN_METEO_ARCHIVE.to_string(),
            forecast_url: OPEN_METEO_FORECAST.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Tunables for the session summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Weight of the head component in the adjusted speed.
    pub head_damping: f64,
    /// Adjusted speed stays within this fraction of the raw speed.
    pub adjustment_limit: f64,
    /// Distance the pace figures are expressed over, in meters.
    pub pace_reference_m: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            head_damping: 0.25,
            adjustment_limit: 0.10,
            pace_reference_m: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Derived speeds above this are discarded as jitter.
    pub max_plausible_speed_ms: f64,
    /// Minimum boat speed for an apparent wind angle.
    pub min_speed_ms: f64,
    pub summary: SummaryConfig,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            max_plausible_speed_ms: DEFAULT_MAX_PLAUSIBLE_SPEED_MS,
            min_speed_ms: DEFAULT_MIN_SPEED_MS,
            summary: SummaryConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Keep fetched wind series for the lifetime of the server.
    pub wind_cache: bool,
    /// Most series the wind cache holds before evicting the oldest.
    pub wind_cache_capacity: usize,
    pub provider: ProviderConfig,
    pub enrich: EnrichConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            wind_cache: false,
            wind_cache_capacity: DEFAULT_CACHE_CAPACITY,
            provider: ProviderConfig::default(),
            enrich: EnrichConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("PORT", defaults.port),
            wind_cache: env_or("WIND_CACHE", defaults.wind_cache),
            wind_cache_capacity: env_or("WIND_CACHE_CAPACITY", defaults.wind_cache_capacity),
            provider: ProviderConfig {
                reanalysis_url: env::var("OPENMETEO_ARCHIVE_URL")
                    .unwrap_or(defaults.provider.reanalysis_url),
                forecast_url: env::var("OPENMETEO_FORECAST_URL")
                    .unwrap_or(defaults.provider.forecast_url),
                timeout: Duration::from_secs(env_or(
                    "OPENMETEO_TIMEOUT_S",
                    defaults.provider.timeout.as_secs(),
                )),
            },
            enrich: EnrichConfig {
                max_plausible_speed_ms: env_or(
                    "MAX_PLAUSIBLE_SPEED_MS",
                    defaults.enrich.max_plausible_speed_ms,
                ),
                min_speed_ms: env_or("MIN_SPEED_MS", defaults.enrich.min_speed_ms),
                summary: SummaryConfig {
                    head_damping: env_or("HEAD_DAMPING", defaults.enrich.summary.head_damping),
                    pace_reference_m: env_or(
                        "PACE_REFERENCE_M",
                        defaults.enrich.summary.pace_reference_m,
                    ),
                    ..defaults.enrich.summary
                },
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!("Ignoring unparsable {key}={raw:?}, using default");
        default
    })
}
