use time::OffsetDateTime;

use crate::{
    config::SummaryConfig,
    models::{EnrichedFix, TrackSummary},
};

/// Adjusted speeds are floored here before converting to pace.
const MIN_PACE_SPEED_MS: f64 = 0.01;

pub trait TrackMetric {
    type Score;
    fn next_fix(&mut self, fix: &EnrichedFix);
    fn finish(&mut self) -> Self::Score;
}

pub fn summarize(fixes: &[EnrichedFix], config: &SummaryConfig) -> TrackSummary {
    let mut acc = Metrics::new(*config);
    for fix in fixes {
        acc.next_fix(fix);
    }
    acc.finish()
}

/// Raw speed nudged by the head component, kept within `limit` of the raw speed.
pub fn adjusted_speed(speed: f64, head: f64, damping: f64, limit: f64) -> f64 {
    let lo = speed * (1.0 - limit);
    let hi = speed * (1.0 + limit);
    (speed + damping * head).max(lo).min(hi)
}

#[derive(Debug, Clone)]
struct Metrics {
    samples: usize,
    duration: DurationMetric,
    median: MedianSpeedMetric,
    shares: ConditionShareMetric,
    headwind: HeadwindDistanceMetric,
    pace: PaceMetric,
}

impl Metrics {
    fn new(config: SummaryConfig) -> Self {
        Self {
            samples: 0,
            duration: DurationMetric::default(),
            median: MedianSpeedMetric::default(),
            shares: ConditionShareMetric::default(),
            headwind: HeadwindDistanceMetric::default(),
            pace: PaceMetric::new(config),
        }
    }
}

impl TrackMetric for Metrics {
    type Score = TrackSummary;

    fn next_fix(&mut self, fix: &EnrichedFix) {
        self.samples += 1;
        self.duration.next_fix(fix);
        self.median.next_fix(fix);
        self.shares.next_fix(fix);
        self.headwind.next_fix(fix);
        self.pace.next_fix(fix);
    }

    fn finish(&mut self) -> TrackSummary {
        let shares = self.shares.finish();
        let (observed_pace_s, adjusted_pace_s) = self.pace.finish();
        TrackSummary {
            duration_s: self.duration.finish(),
            samples: self.samples,
            classified: shares.classified,
            median_apparent_speed_ms: self.median.finish(),
            head_share: shares.head,
            tail_share: shares.tail,
            cross_share: shares.cross,
            headwind_distance_m: self.headwind.finish(),
            observed_pace_s,
            adjusted_pace_s,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DurationMetric {
    start_time: Option<OffsetDateTime>,
    end_time: Option<OffsetDateTime>,
}

impl TrackMetric for DurationMetric {
    type Score = f64;

    fn next_fix(&mut self, fix: &EnrichedFix) {
        if let Some(time) = fix.fix.timestamp {
            self.start_time = Some(self.start_time.map_or(time, |t| t.min(time)));
            self.end_time = Some(self.end_time.map_or(time, |t| t.max(time)));
        }
    }

    fn finish(&mut self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).as_seconds_f64(),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MedianSpeedMetric {
    speeds: Vec<f64>,
}

impl TrackMetric for MedianSpeedMetric {
    type Score = Option<f64>;

    fn next_fix(&mut self, fix: &EnrichedFix) {
        if let Some(apparent) = fix.apparent {
            self.speeds.push(apparent.speed_ms);
        }
    }

    /// Lower median: even-length series take the lower of the two middles.
    fn finish(&mut self) -> Option<f64> {
        if self.speeds.is_empty() {
            return None;
        }
        self.speeds.sort_by(f64::total_cmp);
        Some(self.speeds[(self.speeds.len() - 1) / 2])
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Shares {
    classified: usize,
    head: f64,
    tail: f64,
    cross: f64,
}

#[derive(Debug, Clone, Default)]
struct ConditionShareMetric {
    classified: usize,
    head: usize,
    tail: usize,
    cross: usize,
}

impl TrackMetric for ConditionShareMetric {
    type Score = Shares;

    fn next_fix(&mut self, fix: &EnrichedFix) {
        let (Some(head), Some(cross)) = (fix.head_ms(), fix.cross_ms()) else {
            return;
        };
        self.classified += 1;
        if head > 0.0 {
            self.head += 1;
        } else if head < 0.0 {
            self.tail += 1;
        }
        // Coarse proxy, not an angular bucket.
        if cross.abs() > head.abs() {
            self.cross += 1;
        }
    }

    fn finish(&mut self) -> Shares {
        if self.classified == 0 {
            return Shares::default();
        }
        let n = self.classified as f64;
        Shares {
            classified: self.classified,
            head: self.head as f64 / n,
            tail: self.tail as f64 / n,
            cross: self.cross as f64 / n,
        }
    }
}

/// Trapezoidal integral of max(0, head) over time. A fix without a time or
/// head component breaks the chain of pairs.
#[derive(Debug, Clone, Default)]
struct HeadwindDistanceMetric {
    total: f64,
    last: Option<(OffsetDateTime, f64)>,
}

impl TrackMetric for HeadwindDistanceMetric {
    type Score = f64;

    fn next_fix(&mut self, fix: &EnrichedFix) {
        let current = match (fix.fix.timestamp, fix.head_ms()) {
            (Some(t), Some(head)) => Some((t, head.max(0.0))),
            _ => None,
        };
        if let (Some((t0, h0)), Some((t1, h1))) = (self.last, current) {
            let dt = (t1 - t0).as_seconds_f64();
            if dt > 0.0 {
                self.total += 0.5 * (h0 + h1) * dt;
            }
        }
        self.last = current;
    }

    fn finish(&mut self) -> f64 {
        self.total
    }
}

#[derive(Debug, Clone)]
struct PaceMetric {
    config: SummaryConfig,
    observed_sum: f64,
    adjusted_sum: f64,
    count: usize,
}

impl PaceMetric {
    fn new(config: SummaryConfig) -> Self {
        Self {
            config,
            observed_sum: 0.0,
            adjusted_sum: 0.0,
            count: 0,
        }
    }

    fn pace(&self, speed: f64) -> f64 {
        self.config.pace_reference_m / speed.max(MIN_PACE_SPEED_MS)
    }
}

impl TrackMetric for PaceMetric {
    /// (observed, adjusted) seconds per reference distance.
    type Score = (Option<f64>, Option<f64>);

    fn next_fix(&mut self, fix: &EnrichedFix) {
        let (Some(speed), Some(head)) = (fix.fix.speed_m_s, fix.head_ms()) else {
            return;
        };
        self.observed_sum += speed;
        self.adjusted_sum += adjusted_speed(
            speed,
            head,
            self.config.head_damping,
            self.config.adjustment_limit,
        );
        self.count += 1;
    }

    fn finish(&mut self) -> (Option<f64>, Option<f64>) {
        if self.count == 0 {
            return (None, None);
        }
        let n = self.count as f64;
        (
            Some(self.pace(self.observed_sum / n)),
            Some(self.pace(self.adjusted_sum / n)),
        )
    }
}
