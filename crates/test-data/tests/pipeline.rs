//! End-to-end enrichment over generated tracks and scripted wind providers.

use std::sync::Arc;

use apparent_wind::{
    errors::{DataQualityError, EnrichError, ProviderError},
    models::CoordStrategy,
    wind::{HourlyArrays, HourlyResponse, Provider, SourcePreference, WindCache},
};
use rand::{SeedableRng, rngs::StdRng};
use test_data::prelude::*;
use time::macros::{date, datetime};

fn northbound(speed_ms: f64) -> Vec<Fix> {
    VesselTrackGenerator::for_region(Region::SOLENT)
        .with_start(50.74, -1.30)
        .with_fixes(61, 10.0)
        .straight(0.0, speed_ms)
        .generate(&mut StdRng::seed_from_u64(11))
}

#[tokio::test]
async fn beating_into_a_steady_northerly() {
    let transport = Arc::new(ScriptedTransport::serving(WindField::steady(8.0, 0.0)));
    let enricher = Enricher::new(transport.clone(), EnrichConfig::default());

    let fixes = northbound(4.0);
    let result = enricher
        .enrich(&fixes, EnrichRequest::default())
        .await
        .unwrap();

    assert_eq!(result.source, Some(Provider::Reanalysis));
    assert_eq!(result.hourly_count, Some(24));
    assert_eq!(result.mapped_count, 61);
    assert_eq!(result.speeds_derived, 60);

    for fix in &result.fixes[1..] {
        let apparent = fix.apparent.unwrap();
        assert!((apparent.speed_ms - 12.0).abs() < 1e-3, "{apparent:?}");
        assert!((apparent.head_ms.unwrap() - 12.0).abs() < 1e-3);
        assert!(apparent.cross_ms.unwrap().abs() < 1e-2);
    }

    let summary = &result.summary;
    assert_eq!(summary.samples, 61);
    assert_eq!(summary.classified, 60);
    assert_eq!(summary.head_share, 1.0);
    assert_eq!(summary.tail_share, 0.0);
    assert_eq!(summary.duration_s, 600.0);
    // 12 m/s over the 590 s spanned by classified fixes
    assert!((summary.headwind_distance_m - 12.0 * 590.0).abs() < 1.0);
    // Headwind pushes the adjusted speed to the +10% cap.
    let observed = summary.observed_pace_s.unwrap();
    let adjusted = summary.adjusted_pace_s.unwrap();
    assert!((observed - 125.0).abs() < 0.01);
    assert!((adjusted - 500.0 / 4.4).abs() < 0.01);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let (_, query) = calls[0];
    assert_eq!(query.start, date!(2024-06-01));
    assert_eq!(query.end, date!(2024-06-01));
    assert!((query.lat - result.lat_used.unwrap()).abs() < 1e-12);
}

#[tokio::test]
async fn falls_back_to_forecast_when_reanalysis_is_down() {
    let transport = Arc::new(ScriptedTransport::new(
        Scripted::Status(503),
        Scripted::Serve(WindField::new(5)),
    ));
    let enricher = Enricher::new(transport.clone(), EnrichConfig::default());

    let result = enricher
        .enrich(&northbound(3.0), EnrichRequest::default())
        .await
        .unwrap();
    assert_eq!(result.source, Some(Provider::Forecast));
    assert_eq!(
        transport.providers_called(),
        vec![Provider::Reanalysis, Provider::Forecast]
    );
}

#[tokio::test]
async fn forced_provider_failure_is_reported() {
    let transport = Arc::new(ScriptedTransport::new(
        Scripted::Serve(WindField::new(5)),
        Scripted::Unreachable,
    ));
    let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
    let request = EnrichRequest {
        source_preference: SourcePreference::Forecast,
        ..Default::default()
    };

    let err = enricher.enrich(&northbound(3.0), request).await.unwrap_err();
    assert!(matches!(
        err,
        EnrichError::Provider(ProviderError::Transport {
            provider: Provider::Forecast,
            ..
        })
    ));
    assert_eq!(transport.providers_called(), vec![Provider::Forecast]);
}

#[tokio::test]
async fn both_providers_failing_is_exhausted() {
    let transport = Arc::new(ScriptedTransport::new(
        Scripted::Unreachable,
        Scripted::Status(429),
    ));
    let enricher = Enricher::new(transport, EnrichConfig::default());

    let err = enricher
        .enrich(&northbound(3.0), EnrichRequest::default())
        .await
        .unwrap_err();
    let EnrichError::Provider(ProviderError::Exhausted { primary, fallback }) = err else {
        panic!("expected exhausted, got {err:?}");
    };
    assert_eq!(primary.provider(), Provider::Reanalysis);
    assert!(matches!(*fallback, ProviderError::Status { status: 429, .. }));
}

#[tokio::test]
async fn noisy_track_keeps_invariants() {
    let mut rng = StdRng::seed_from_u64(2024);
    let fixes = VesselTrackGenerator::for_region(Region::SOLENT)
        .with_fixes(720, 5.0)
        .with_speed(3.5, 1.0)
        .with_gps_jitter(2.0)
        .with_dropouts(0.05)
        .generate(&mut rng);

    let transport = Arc::new(ScriptedTransport::serving(WindField::new(17)));
    let enricher = Enricher::new(transport, EnrichConfig::default());
    let request = EnrichRequest {
        coord_strategy: CoordStrategy::Midpoint,
        ..Default::default()
    };
    let result = enricher.enrich(&fixes, request).await.unwrap();

    assert_eq!(result.fixes.len(), fixes.len());
    assert_eq!(result.mapped_count, fixes.len());
    for fix in &result.fixes {
        let Some(apparent) = fix.apparent else {
            continue;
        };
        assert!((0.0..360.0).contains(&apparent.direction_deg));
        if let (Some(angle), Some(head), Some(cross)) =
            (apparent.angle_deg, apparent.head_ms, apparent.cross_ms)
        {
            assert!(angle > -180.0 && angle <= 180.0);
            let norm = (head * head + cross * cross).sqrt();
            assert!((norm - apparent.speed_ms).abs() < 1e-9);
        }
        // Apparent wind only exists where the boat velocity does.
        assert!(fix.boat.is_some());
    }

    let summary = &result.summary;
    assert!(summary.classified <= summary.samples);
    for share in [summary.head_share, summary.tail_share, summary.cross_share] {
        assert!((0.0..=1.0).contains(&share));
    }
    assert!(summary.head_share + summary.tail_share <= 1.0 + 1e-12);
    assert!(summary.headwind_distance_m >= 0.0);
}

#[tokio::test]
async fn shared_cache_fetches_once() {
    let transport = Arc::new(ScriptedTransport::serving(WindField::new(1)));
    let cache = Arc::new(WindCache::new());
    let enricher =
        Enricher::new(transport.clone(), EnrichConfig::default()).with_cache(cache.clone());

    let fixes = northbound(3.0);
    let first = enricher
        .enrich(&fixes, EnrichRequest::default())
        .await
        .unwrap();
    let second = enricher
        .enrich(&fixes, EnrichRequest::default())
        .await
        .unwrap();

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(first.summary, second.summary);
}

#[tokio::test]
async fn overnight_session_spans_two_days_of_wind() {
    let (lat, lon) = Region::SF_BAY.center();
    let generator = VesselTrackGenerator::for_region(Region::SF_BAY)
        .with_start(lat, lon)
        .with_start_time(datetime!(2024-06-01 22:30 UTC))
        .with_fixes(360, 30.0);
    assert_eq!(generator.config().fixes, 360);
    let fixes = generator.generate(&mut StdRng::seed_from_u64(21));

    let field = WindField::new(4).with_base(5.0, 270.0).with_swing(1.0, 10.0);
    let transport = Arc::new(ScriptedTransport::serving(field));
    let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
    let result = enricher
        .enrich(&fixes, EnrichRequest::default())
        .await
        .unwrap();

    assert_eq!(result.hourly_count, Some(48));
    let (_, query) = transport.calls()[0];
    assert_eq!(query.start, date!(2024-06-01));
    assert_eq!(query.end, date!(2024-06-02));
    for wind in result.fixes.iter().filter_map(|f| f.wind) {
        assert!(wind.speed_ms > 3.0 && wind.speed_ms < 7.0, "{wind:?}");
    }
}

#[tokio::test]
async fn malformed_reanalysis_payload_falls_back() {
    let broken = HourlyResponse {
        hourly: Some(HourlyArrays {
            time: Some(vec![Some("2024-06-01T00:00".to_string())]),
            wind_speed_10m: Some(vec![Some(4.0), Some(5.0)]),
            wind_direction_10m: Some(vec![Some(180.0)]),
        }),
    };
    let transport = Arc::new(ScriptedTransport::new(
        Scripted::Payload(broken.clone()),
        Scripted::Serve(WindField::lake_thermal(9)),
    ));
    let enricher = Enricher::new(transport.clone(), EnrichConfig::default());
    let fixes = VesselTrackGenerator::for_region(Region::LAKE_GARDA)
        .with_fixes(120, 10.0)
        .generate(&mut StdRng::seed_from_u64(13));

    let result = enricher
        .enrich(&fixes, EnrichRequest::default())
        .await
        .unwrap();
    assert_eq!(result.source, Some(Provider::Forecast));
    assert_eq!(result.mapped_count, fixes.len());

    // Forced to the broken provider, the structural problem is reported.
    let forced = Enricher::new(
        Arc::new(ScriptedTransport::new(Scripted::Payload(broken), Scripted::Unreachable)),
        EnrichConfig::default(),
    );
    let request = EnrichRequest {
        source_preference: SourcePreference::Reanalysis,
        ..Default::default()
    };
    let err = forced.enrich(&fixes, request).await.unwrap_err();
    assert!(matches!(
        err,
        EnrichError::Provider(ProviderError::Unusable {
            provider: Provider::Reanalysis,
            reason: DataQualityError::LengthMismatch { .. },
        })
    ));
}
