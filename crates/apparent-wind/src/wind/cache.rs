use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
};

use time::Date;

use super::{Provider, SourcePreference, WindQuery};
use crate::interpolation::WindVectorSeries;

/// Spatial bin size in degrees (~5.5 km at mid-latitudes).
pub const BIN_STEP_DEG: f64 = 0.05;

pub const DEFAULT_CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_bin: i64,
    lon_bin: i64,
    start: Date,
    end: Date,
    preference: SourcePreference,
}

impl CacheKey {
    pub fn new(query: &WindQuery, preference: SourcePreference) -> Self {
        Self {
            lat_bin: (query.lat / BIN_STEP_DEG).round() as i64,
            lon_bin: (query.lon / BIN_STEP_DEG).round() as i64,
            start: query.start,
            end: query.end,
            preference,
        }
    }
}

/// Hourly series already fetched, shared across requests by whoever owns it.
///
/// Holds at most `capacity` series; once full, the oldest insertion is evicted.
#[derive(Debug)]
pub struct WindCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    series: HashMap<CacheKey, (Provider, WindVectorSeries)>,
    order: VecDeque<CacheKey>,
}

impl Default for WindCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl WindCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &CacheKey) -> Option<(Provider, WindVectorSeries)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .series
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: CacheKey, source: Provider, series: WindVectorSeries) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.series.insert(key, (source, series)).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.series.remove(&oldest);
                tracing::debug!("Wind cache full, evicted {oldest:?}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .series
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.series.clear();
        entries.order.clear();
    }
}
