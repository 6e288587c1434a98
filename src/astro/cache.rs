//! In-memory TTL cache of resolved celestial snapshots.
//!
//! Keys are canonical: timestamp floored to the hour, location rounded to
//! 0.1°. Entries are immutable `Arc`s; an expired entry is dropped when its
//! key is read, and an insert sweeps every expired entry once per TTL so keys
//! that are never read again do not accumulate. Concurrent inserts for the
//! same key are last-write-wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use tracing::trace;

use crate::model::GeoLocation;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Unix hour number.
    pub hour: i64,
    pub lat_decis: Option<i32>,
    pub lon_decis: Option<i32>,
}

impl CacheKey {
    pub fn canonical(at: DateTime<Utc>, location: Option<GeoLocation>) -> Self {
        Self {
            hour: at.timestamp().div_euclid(3600),
            lat_decis: location.map(|l| (l.latitude * 10.0).round() as i32),
            lon_decis: location.map(|l| (l.longitude * 10.0).round() as i32),
        }
    }

    /// Start of the hour bucket this key represents.
    pub fn canonical_timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.hour * 3600, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Location rounded to the key's resolution.
    pub fn canonical_location(&self) -> Option<GeoLocation> {
        match (self.lat_decis, self.lon_decis) {
            (Some(lat), Some(lon)) => Some(GeoLocation {
                latitude: lat as f64 / 10.0,
                longitude: lon as f64 / 10.0,
            }),
            _ => None,
        }
    }
}

struct Entry<T> {
    value: Arc<T>,
    expires_at: Instant,
}

struct Entries<T> {
    map: HashMap<CacheKey, Entry<T>>,
    last_sweep: Instant,
}

impl<T> Entries<T> {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        self.last_sweep = now;
        before - self.map.len()
    }
}

pub struct AstroCache<T> {
    ttl: Duration,
    entries: RwLock<Entries<T>>,
}

impl<T> AstroCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            match entries.map.get(key) {
                Some(e) if e.expires_at > now => {
                    counter!("astro_cache_hits_total").increment(1);
                    return Some(Arc::clone(&e.value));
                }
                None => {
                    counter!("astro_cache_misses_total").increment(1);
                    return None;
                }
                Some(_) => {}
            }
        }
        // Expired: evict unless someone refreshed it in the meantime.
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if entries.map.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.map.remove(key);
            trace!(target: "astro", hour = key.hour, "evicted expired snapshot");
        }
        counter!("astro_cache_misses_total").increment(1);
        None
    }

    pub fn insert(&self, key: CacheKey, value: Arc<T>) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if now.duration_since(entries.last_sweep) >= self.ttl {
            let removed = entries.sweep(now);
            if removed > 0 {
                trace!(target: "astro", removed, "swept expired snapshots");
            }
        }
        entries.map.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .sweep(Instant::now())
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for AstroCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
