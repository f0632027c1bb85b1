//! End-to-end enrichment: kinematics, wind retrieval, interpolation,
//! apparent wind and the session summary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    apparent::ApparentWindEngine,
    config::EnrichConfig,
    errors::{EnrichError, InputError},
    interpolation::{WindVectorSeries, map_wind},
    kinematics::{Derivation, KinematicDeriver, representative_coord, track_window},
    models::{AmbientWind, CoordStrategy, EnrichedFix, Fix, TrackSummary},
    summary::summarize,
    wind::{Provider, SourcePreference, WindCache, WindSourceClient, WindTransport},
};

/// Per-request options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnrichRequest {
    #[serde(default)]
    pub coord_strategy: CoordStrategy,
    #[serde(default)]
    pub source_preference: SourcePreference,
    /// Overrides the configured minimum speed for apparent angles.
    #[serde(default)]
    pub min_speed_ms: Option<f64>,
    /// Contact the providers when a timed fix arrives without wind.
    #[serde(default = "fetch_by_default")]
    pub fetch_wind_if_missing: bool,
}

fn fetch_by_default() -> bool {
    true
}

impl Default for EnrichRequest {
    fn default() -> Self {
        Self {
            coord_strategy: CoordStrategy::default(),
            source_preference: SourcePreference::default(),
            min_speed_ms: None,
            fetch_wind_if_missing: true,
        }
    }
}

/// Ambient wind mapped onto a track, without apparent wind.
#[derive(Debug, Clone)]
pub struct WindTrack {
    pub source: Provider,
    pub lat: f64,
    pub lon: f64,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub hourly_count: usize,
    pub series: WindVectorSeries,
    /// Parallel to the fixes the track was built for.
    pub winds: Vec<Option<AmbientWind>>,
}

impl WindTrack {
    pub fn mapped_count(&self) -> usize {
        self.winds.iter().filter(|w| w.is_some()).count()
    }
}

/// Provider fields are absent when every fix arrived with its own wind.
#[derive(Debug, Clone, Serialize)]
pub struct Enrichment {
    pub source: Option<Provider>,
    pub lat_used: Option<f64>,
    pub lon_used: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub hourly_count: Option<usize>,
    pub mapped_count: usize,
    /// Fixes whose wind came with the request rather than from a provider.
    pub supplied_count: usize,
    pub speeds_derived: usize,
    pub fixes: Vec<EnrichedFix>,
    pub summary: TrackSummary,
}

/// Owns the wind client, optional cache and tunables. Shared across requests.
#[derive(Clone)]
pub struct Enricher {
    client: WindSourceClient,
    cache: Option<Arc<WindCache>>,
    config: EnrichConfig,
}

impl Enricher {
    pub fn new(transport: Arc<dyn WindTransport>, config: EnrichConfig) -> Self {
        Self {
            client: WindSourceClient::new(transport),
            cache: None,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<WindCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    pub fn derive(&self, fixes: &[Fix]) -> Derivation {
        KinematicDeriver::new(self.config.max_plausible_speed_ms).derive(fixes)
    }

    /// Fetches one hourly series for the track and maps it onto every fix.
    /// Input problems are reported before any provider is contacted.
    pub async fn wind_for_track(
        &self,
        fixes: &[Fix],
        strategy: CoordStrategy,
        preference: SourcePreference,
    ) -> Result<WindTrack, EnrichError> {
        if fixes.is_empty() {
            return Err(InputError::NoFixes.into());
        }
        let (start, end) = track_window(fixes)?;
        let (lat, lon) = representative_coord(fixes, strategy)?;
        tracing::info!(
            "Fetching wind for {} points at ({lat:.4}, {lon:.4}), {start} .. {end}, preference={preference}",
            fixes.len()
        );

        let (source, series) = match &self.cache {
            Some(cache) => {
                self.client
                    .fetch_cached(cache, lat, lon, start, end, preference)
                    .await?
            }
            None => self.client.fetch(lat, lon, start, end, preference).await?,
        };
        let (series, winds) = map_on_pool(fixes.to_vec(), series).await?;

        Ok(WindTrack {
            source,
            lat,
            lon,
            start,
            end,
            hourly_count: series.len(),
            series,
            winds,
        })
    }

    pub async fn enrich(
        &self,
        fixes: &[Fix],
        request: EnrichRequest,
    ) -> Result<Enrichment, EnrichError> {
        self.enrich_with_wind(fixes, &[], request).await
    }

    /// Like [`enrich`](Self::enrich), starting from wind the caller already
    /// has. `supplied` is parallel to `fixes`; a short slice leaves the tail
    /// without wind. Supplied values are kept as they are, and providers are
    /// only asked for the timed fixes still missing wind.
    pub async fn enrich_with_wind(
        &self,
        fixes: &[Fix],
        supplied: &[Option<AmbientWind>],
        request: EnrichRequest,
    ) -> Result<Enrichment, EnrichError> {
        if fixes.is_empty() {
            return Err(InputError::NoFixes.into());
        }
        let derivation = self.derive(fixes);
        let (start_time, end_time) = track_window(&derivation.fixes)?;

        let mut winds: Vec<Option<AmbientWind>> = (0..fixes.len())
            .map(|i| supplied.get(i).copied().flatten())
            .collect();
        let supplied_count = winds.iter().filter(|w| w.is_some()).count();
        let missing = derivation
            .fixes
            .iter()
            .zip(&winds)
            .any(|(fix, wind)| fix.timestamp.is_some() && wind.is_none());

        let track = if missing && request.fetch_wind_if_missing {
            let track = self
                .wind_for_track(
                    &derivation.fixes,
                    request.coord_strategy,
                    request.source_preference,
                )
                .await?;
            for (slot, fetched) in winds.iter_mut().zip(&track.winds) {
                if slot.is_none() {
                    *slot = *fetched;
                }
            }
            Some(track)
        } else {
            tracing::info!(
                "Skipping wind fetch: {supplied_count} of {} points carry wind",
                fixes.len()
            );
            None
        };

        let engine =
            ApparentWindEngine::new(request.min_speed_ms.unwrap_or(self.config.min_speed_ms));
        let enriched = engine.enrich(&derivation.fixes, &winds);
        let summary = summarize(&enriched, &self.config.summary);

        Ok(Enrichment {
            source: track.as_ref().map(|t| t.source),
            lat_used: track.as_ref().map(|t| t.lat),
            lon_used: track.as_ref().map(|t| t.lon),
            start_time,
            end_time,
            hourly_count: track.as_ref().map(|t| t.hourly_count),
            mapped_count: winds.iter().filter(|w| w.is_some()).count(),
            supplied_count,
            speeds_derived: derivation.speeds_derived,
            fixes: enriched,
            summary,
        })
    }
}

/// Maps the series onto the fixes on the rayon pool, off the async workers.
async fn map_on_pool(
    fixes: Vec<Fix>,
    series: WindVectorSeries,
) -> Result<(WindVectorSeries, Vec<Option<AmbientWind>>), EnrichError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    rayon::spawn(move || {
        let winds = map_wind(&fixes, &series);
        let _ = tx.send((series, winds));
    });
    rx.await.map_err(|_| EnrichError::WorkerLost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::{Duration, macros::datetime};

    use crate::{
        errors::ProviderError,
        wind::{HourlyArrays, HourlyResponse, WindQuery},
    };

    /// Constant wind from the north at 10 m/s over the whole day.
    #[derive(Default)]
    struct NortherlyTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WindTransport for NortherlyTransport {
        async fn hourly(
            &self,
            _provider: Provider,
            _query: &WindQuery,
        ) -> Result<HourlyResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hours = 0..24;
            Ok(HourlyResponse {
                hourly: Some(HourlyArrays {
                    time: Some(
                        hours
                            .clone()
                            .map(|h| Some(format!("2024-06-01T{h:02}:00")))
                            .collect(),
                    ),
                    wind_speed_10m: Some(hours.clone().map(|_| Some(10.0)).collect()),
                    wind_direction_10m: Some(hours.map(|_| Some(0.0)).collect()),
                }),
            })
        }
    }

    fn northbound_track() -> Vec<Fix> {
        let t0 = datetime!(2024-06-01 10:00 UTC);
        // 5 m/s due north
        let step = (50.0 / crate::geodesy::EARTH_RADIUS_M).to_degrees();
        (0..5)
            .map(|i| Fix::new(t0 + Duration::seconds(10 * i), 50.0 + step * i as f64, -1.0))
            .collect()
    }

    #[tokio::test]
    async fn test_enrich_headwind_track() {
        let transport = Arc::new(NortherlyTransport::default());
        let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
        let result = enricher
            .enrich(&northbound_track(), EnrichRequest::default())
            .await
            .unwrap();

        assert_eq!(result.source, Some(Provider::Reanalysis));
        assert_eq!(result.hourly_count, Some(24));
        assert_eq!(result.mapped_count, 5);
        assert_eq!(result.supplied_count, 0);
        assert_eq!(result.speeds_derived, 4);
        assert_eq!(result.fixes.len(), 5);

        // The first fix has no course, so no apparent wind.
        assert!(result.fixes[0].apparent.is_none());
        let apparent = result.fixes[2].apparent.unwrap();
        assert!((apparent.speed_ms - 15.0).abs() < 1e-6);
        assert!((apparent.head_ms.unwrap() - 15.0).abs() < 1e-6);

        let summary = &result.summary;
        assert_eq!(summary.classified, 4);
        assert_eq!(summary.head_share, 1.0);
        assert_eq!(summary.duration_s, 40.0);
        // 15 m/s headwind over 30 s of consecutive classified fixes
        assert!((summary.headwind_distance_m - 450.0).abs() < 1e-3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_input_errors_before_network() {
        let transport = Arc::new(NortherlyTransport::default());
        let enricher = Enricher::new(transport.clone(), EnrichConfig::default());

        let err = enricher.enrich(&[], EnrichRequest::default()).await.unwrap_err();
        assert!(matches!(err, EnrichError::Input(InputError::NoFixes)));

        let no_times = vec![Fix {
            lat: Some(50.0),
            lon: Some(-1.0),
            ..Default::default()
        }];
        let err = enricher
            .enrich(&no_times, EnrichRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Input(InputError::NoValidTimestamps)));

        let no_coords = vec![Fix {
            timestamp: Some(datetime!(2024-06-01 10:00 UTC)),
            ..Default::default()
        }];
        let err = enricher
            .wind_for_track(&no_coords, CoordStrategy::Start, SourcePreference::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::Input(InputError::NoValidCoordinates)));

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_shared_between_requests() {
        let transport = Arc::new(NortherlyTransport::default());
        let cache = Arc::new(WindCache::new());
        let enricher =
            Enricher::new(transport.clone(), EnrichConfig::default()).with_cache(cache.clone());

        let track = northbound_track();
        for _ in 0..3 {
            enricher
                .wind_for_track(&track, CoordStrategy::Centroid, SourcePreference::Auto)
                .await
                .unwrap();
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_min_speed_override() {
        let transport = Arc::new(NortherlyTransport::default());
        let enricher = Enricher::new(transport, EnrichConfig::default());
        let request = EnrichRequest {
            min_speed_ms: Some(6.0),
            ..Default::default()
        };
        let result = enricher.enrich(&northbound_track(), request).await.unwrap();
        // Boat at 5 m/s: apparent speed still computed, angle suppressed.
        let apparent = result.fixes[2].apparent.unwrap();
        assert!(apparent.angle_deg.is_none());
        assert_eq!(result.summary.classified, 0);
        assert!(result.summary.median_apparent_speed_ms.is_some());
    }

    fn northerly(speed: f64) -> Option<AmbientWind> {
        Some(AmbientWind::from_uv(0.0, -speed))
    }

    #[tokio::test]
    async fn test_supplied_wind_skips_providers() {
        let transport = Arc::new(NortherlyTransport::default());
        let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
        let supplied = vec![northerly(10.0); 5];

        let result = enricher
            .enrich_with_wind(&northbound_track(), &supplied, EnrichRequest::default())
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.source, None);
        assert_eq!(result.lat_used, None);
        assert_eq!(result.hourly_count, None);
        assert_eq!(result.supplied_count, 5);
        assert_eq!(result.mapped_count, 5);
        assert_eq!(result.start_time, datetime!(2024-06-01 10:00 UTC));
        let apparent = result.fixes[2].apparent.unwrap();
        assert!((apparent.head_ms.unwrap() - 15.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_partial_wind_is_filled_from_providers() {
        let transport = Arc::new(NortherlyTransport::default());
        let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
        // Stronger supplied wind on the first two fixes only.
        let supplied = vec![northerly(20.0), northerly(20.0)];

        let result = enricher
            .enrich_with_wind(&northbound_track(), &supplied, EnrichRequest::default())
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.source, Some(Provider::Reanalysis));
        assert_eq!(result.supplied_count, 2);
        assert_eq!(result.mapped_count, 5);
        assert!((result.fixes[1].wind.unwrap().speed_ms - 20.0).abs() < 1e-9);
        assert!((result.fixes[3].wind.unwrap().speed_ms - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_disabled_leaves_gaps() {
        let transport = Arc::new(NortherlyTransport::default());
        let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
        let request = EnrichRequest {
            fetch_wind_if_missing: false,
            ..Default::default()
        };

        let result = enricher
            .enrich_with_wind(&northbound_track(), &[northerly(10.0)], request)
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.mapped_count, 1);
        assert!(result.fixes[2].apparent.is_none());
        assert_eq!(result.summary.classified, 0);
    }
}
