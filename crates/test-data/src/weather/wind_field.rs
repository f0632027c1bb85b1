//! Perlin noise-based hourly wind generation.

use apparent_wind::{
    models::WindSample,
    wind::{HourlyArrays, HourlyResponse, WindQuery},
};
use noise::{NoiseFn, Perlin};
use serde_json::{Value, json};
use time::{Date, Duration, OffsetDateTime, Time, macros::format_description};

/// Generates a plausible hourly 10 m wind record.
///
/// Speed and direction drift smoothly with time using fractal Perlin noise,
/// so consecutive hours are correlated the way a real record is.
#[derive(Debug, Clone)]
pub struct WindField {
    perlin: Perlin,
    /// Mean wind speed in m/s.
    base_speed_ms: f64,
    /// Amplitude of the speed variation in m/s.
    speed_swing_ms: f64,
    /// Mean "from" direction in degrees.
    base_direction_deg: f64,
    /// Amplitude of the direction variation in degrees.
    direction_swing_deg: f64,
    /// Noise frequency in cycles per hour.
    frequency: f64,
    octaves: u32,
}

impl WindField {
    /// A breezy westerly with moderate variation.
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_speed_ms: 6.0,
            speed_swing_ms: 2.5,
            base_direction_deg: 250.0,
            direction_swing_deg: 30.0,
            frequency: 0.15,
            octaves: 3,
        }
    }

    /// The same wind every hour.
    pub fn steady(speed_ms: f64, direction_deg: f64) -> Self {
        Self {
            perlin: Perlin::new(0),
            base_speed_ms: speed_ms,
            speed_swing_ms: 0.0,
            base_direction_deg: direction_deg,
            direction_swing_deg: 0.0,
            frequency: 0.0,
            octaves: 1,
        }
    }

    /// Afternoon thermal: light northerly veering into a stronger southerly.
    pub fn lake_thermal(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_speed_ms: 7.0,
            speed_swing_ms: 4.0,
            base_direction_deg: 190.0,
            direction_swing_deg: 60.0,
            frequency: 0.08,
            octaves: 2,
        }
    }

    pub fn with_base(mut self, speed_ms: f64, direction_deg: f64) -> Self {
        self.base_speed_ms = speed_ms;
        self.base_direction_deg = direction_deg;
        self
    }

    pub fn with_swing(mut self, speed_ms: f64, direction_deg: f64) -> Self {
        self.speed_swing_ms = speed_ms;
        self.direction_swing_deg = direction_deg;
        self
    }

    /// Fractal noise in [-1, 1] for hour `h` on channel `channel`.
    fn fbm(&self, h: f64, channel: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..self.octaves {
            total += self.perlin.get([h * frequency, channel]) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        total / max_amplitude
    }

    pub fn sample_at(&self, time: OffsetDateTime) -> WindSample {
        let hours = time.unix_timestamp() as f64 / 3600.0;
        let speed_ms = (self.base_speed_ms + self.fbm(hours, 0.5) * self.speed_swing_ms).max(0.0);
        let direction_deg =
            (self.base_direction_deg + self.fbm(hours, 7.5) * self.direction_swing_deg)
                .rem_euclid(360.0);
        WindSample {
            time,
            speed_ms,
            direction_deg,
        }
    }

    /// One sample per hour over the whole calendar days `start..=end`, the
    /// way the providers answer a date-range request.
    pub fn hourly(&self, start: Date, end: Date) -> Vec<WindSample> {
        let first = start.with_time(Time::MIDNIGHT).assume_utc();
        let last = end.with_time(Time::MIDNIGHT).assume_utc() + Duration::days(1);
        let mut samples = Vec::new();
        let mut t = first;
        while t < last {
            samples.push(self.sample_at(t));
            t += Duration::hours(1);
        }
        samples
    }

    /// Provider-shaped payload for `query`.
    pub fn hourly_response(&self, query: &WindQuery) -> HourlyResponse {
        let samples = self.hourly(query.start, query.end);
        HourlyResponse {
            hourly: Some(HourlyArrays {
                time: Some(samples.iter().map(|s| Some(naive_hour(s.time))).collect()),
                wind_speed_10m: Some(samples.iter().map(|s| Some(s.speed_ms)).collect()),
                wind_direction_10m: Some(samples.iter().map(|s| Some(s.direction_deg)).collect()),
            }),
        }
    }

    /// The same payload as raw JSON, as served by the public API.
    pub fn open_meteo_json(&self, lat: f64, lon: f64, start: Date, end: Date) -> Value {
        let samples = self.hourly(start, end);
        json!({
            "latitude": lat,
            "longitude": lon,
            "timezone": "UTC",
            "hourly_units": {
                "time": "iso8601",
                "wind_speed_10m": "m/s",
                "wind_direction_10m": "°",
            },
            "hourly": {
                "time": samples.iter().map(|s| naive_hour(s.time)).collect::<Vec<_>>(),
                "wind_speed_10m": samples.iter().map(|s| s.speed_ms).collect::<Vec<_>>(),
                "wind_direction_10m": samples.iter().map(|s| s.direction_deg).collect::<Vec<_>>(),
            },
        })
    }
}

/// `YYYY-MM-DDTHH:MM`, no offset.
fn naive_hour(t: OffsetDateTime) -> String {
    t.format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .unwrap_or_default()
}
