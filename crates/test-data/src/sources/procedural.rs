//! Procedural vessel track generation.

use apparent_wind::{geodesy::EARTH_RADIUS_M, models::Fix};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use time::{Duration, OffsetDateTime};

use crate::config::{BoundingBox, DEFAULT_SESSION_START, Region};

/// Configuration for procedural track generation.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Number of fixes to emit.
    pub fixes: usize,
    /// Seconds between consecutive fixes.
    pub interval_s: f64,
    pub start_time: OffsetDateTime,
    /// Starting point (lat, lon). If None, random within bounds.
    pub start_point: Option<(f64, f64)>,
    pub bounds: BoundingBox,
    /// Mean boat speed in m/s.
    pub cruise_speed_ms: f64,
    /// Standard deviation of the per-leg speed in m/s.
    pub speed_std_ms: f64,
    /// Initial heading, degrees. If None, random.
    pub heading_deg: Option<f64>,
    /// Maximum heading change per leg, degrees.
    pub heading_wander_deg: f64,
    /// GPS position jitter standard deviation in meters.
    pub gps_jitter_m: f64,
    /// Emit the sampled speed on each fix, as a logger with SOG would.
    pub record_speed: bool,
    /// Probability that a fix loses its position.
    pub dropout_probability: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            fixes: 120,
            interval_s: 5.0,
            start_time: DEFAULT_SESSION_START,
            start_point: None,
            bounds: Region::SOLENT,
            cruise_speed_ms: 3.0,
            speed_std_ms: 0.3,
            heading_deg: None,
            heading_wander_deg: 10.0,
            gps_jitter_m: 0.0,
            record_speed: false,
            dropout_probability: 0.0,
        }
    }
}

/// Generates synthetic vessel tracks with a random walk on heading.
pub struct VesselTrackGenerator {
    config: TrackConfig,
}

impl Default for VesselTrackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl VesselTrackGenerator {
    pub fn new() -> Self {
        Self {
            config: TrackConfig::default(),
        }
    }

    pub fn for_region(bounds: BoundingBox) -> Self {
        Self {
            config: TrackConfig {
                bounds,
                ..Default::default()
            },
        }
    }

    pub fn with_fixes(mut self, fixes: usize, interval_s: f64) -> Self {
        self.config.fixes = fixes;
        self.config.interval_s = interval_s;
        self
    }

    pub fn with_start(mut self, lat: f64, lon: f64) -> Self {
        self.config.start_point = Some((lat, lon));
        self
    }

    pub fn with_start_time(mut self, start: OffsetDateTime) -> Self {
        self.config.start_time = start;
        self
    }

    /// A fixed heading with no wander and no speed variance.
    pub fn straight(mut self, heading_deg: f64, speed_ms: f64) -> Self {
        self.config.heading_deg = Some(heading_deg);
        self.config.heading_wander_deg = 0.0;
        self.config.cruise_speed_ms = speed_ms;
        self.config.speed_std_ms = 0.0;
        self
    }

    pub fn with_speed(mut self, mean_ms: f64, std_ms: f64) -> Self {
        self.config.cruise_speed_ms = mean_ms;
        self.config.speed_std_ms = std_ms;
        self
    }

    pub fn with_gps_jitter(mut self, meters: f64) -> Self {
        self.config.gps_jitter_m = meters;
        self
    }

    pub fn with_recorded_speed(mut self) -> Self {
        self.config.record_speed = true;
        self
    }

    pub fn with_dropouts(mut self, probability: f64) -> Self {
        self.config.dropout_probability = probability;
        self
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn generate(&self, rng: &mut impl Rng) -> Vec<Fix> {
        let cfg = &self.config;
        let mut current = cfg
            .start_point
            .unwrap_or_else(|| cfg.bounds.random_point(rng));
        let mut heading = cfg
            .heading_deg
            .unwrap_or_else(|| rng.gen_range(0.0..360.0));

        let speed_dist = Normal::new(cfg.cruise_speed_ms, cfg.speed_std_ms).ok();
        let jitter_deg = (cfg.gps_jitter_m / EARTH_RADIUS_M).to_degrees();
        let jitter = Normal::new(0.0, jitter_deg).ok();

        let mut fixes = Vec::with_capacity(cfg.fixes);
        let mut speed = cfg.cruise_speed_ms;
        for i in 0..cfg.fixes {
            let timestamp = cfg.start_time + Duration::seconds_f64(i as f64 * cfg.interval_s);
            if i > 0 {
                if cfg.heading_wander_deg > 0.0 {
                    heading += rng.gen_range(-cfg.heading_wander_deg..cfg.heading_wander_deg);
                }
                speed = sample_or(speed_dist, cfg.cruise_speed_ms, rng).max(0.0);
                let (lat, lon, bounced) = self.step(current, heading, speed * cfg.interval_s);
                current = (lat, lon);
                heading = bounced;
            }

            let mut fix = Fix::new(
                timestamp,
                current.0 + sample_or(jitter, 0.0, rng),
                current.1 + sample_or(jitter, 0.0, rng),
            );
            if cfg.record_speed {
                fix.speed_m_s = Some(speed);
            }
            if cfg.dropout_probability > 0.0 && rng.r#gen::<f64>() < cfg.dropout_probability {
                fix.lat = None;
                fix.lon = None;
            }
            fixes.push(fix);
        }
        tracing::debug!(
            fixes = fixes.len(),
            interval_s = cfg.interval_s,
            "Generated vessel track"
        );
        fixes
    }

    /// Moves `distance` meters along `heading`, bouncing off the region edges.
    fn step(&self, from: (f64, f64), heading: f64, distance: f64) -> (f64, f64, f64) {
        let rad = heading.to_radians();
        let lat_delta = (distance * rad.cos() / EARTH_RADIUS_M).to_degrees();
        let lon_delta =
            (distance * rad.sin() / (EARTH_RADIUS_M * from.0.to_radians().cos())).to_degrees();
        let (lat, lon) = (from.0 + lat_delta, from.1 + lon_delta);

        let b = &self.config.bounds;
        let mut new_heading = heading;
        if !(b.min_lat..=b.max_lat).contains(&lat) {
            new_heading = 180.0 - new_heading;
        }
        if !(b.min_lon..=b.max_lon).contains(&lon) {
            new_heading = -new_heading;
        }
        if new_heading != heading {
            return (from.0, from.1, new_heading.rem_euclid(360.0));
        }
        (lat, lon, heading)
    }
}

/// Samples `dist`, or returns `fallback` when its parameters were invalid.
fn sample_or(dist: Option<Normal<f64>>, fallback: f64, rng: &mut impl Rng) -> f64 {
    dist.map_or(fallback, |d| d.sample(rng))
}
