use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::IncidentRecord;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Holds the canonical record set for a fixed time window.
///
/// The set is shared read-only through an `Arc`; a refresh replaces it
/// wholesale and never mutates a set already handed out.
#[derive(Debug)]
pub struct RecordCache {
    ttl: Duration,
    entry: Option<(Instant, Arc<[IncidentRecord]>)>,
}

impl Default for RecordCache {
    fn default() -> Self {
        RecordCache::new(DEFAULT_TTL)
    }
}

impl RecordCache {
    pub fn new(ttl: Duration) -> Self {
        RecordCache { ttl, entry: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        match &self.entry {
            Some((loaded_at, _)) => now.saturating_duration_since(*loaded_at) < self.ttl,
            None => false,
        }
    }

    /// Return the cached set, calling `load` first when it is missing or stale.
    pub fn get_or_refresh<F>(&mut self, now: Instant, load: F) -> Arc<[IncidentRecord]>
    where
        F: FnOnce() -> Vec<IncidentRecord>,
    {
        if let Some((_, records)) = self.entry.as_ref().filter(|_| self.is_fresh(now)) {
            return Arc::clone(records);
        }
        let records: Arc<[IncidentRecord]> = load().into();
        debug!(records = records.len(), "record cache refreshed");
        self.entry = Some((now, Arc::clone(&records)));
        records
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn reuses_records_within_ttl() {
        let mut cache = RecordCache::new(Duration::from_secs(60));
        assert_eq!(cache.ttl(), Duration::from_secs(60));
        let calls = Cell::new(0);
        let start = Instant::now();
        let load = || {
            calls.set(calls.get() + 1);
            Vec::new()
        };
        cache.get_or_refresh(start, load);
        cache.get_or_refresh(start + Duration::from_secs(59), load);
        assert_eq!(calls.get(), 1);
        assert!(cache.is_fresh(start + Duration::from_secs(30)));
    }

    #[test]
    fn reloads_after_expiry_or_invalidation() {
        let mut cache = RecordCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let start = Instant::now();
        let load = || {
            calls.set(calls.get() + 1);
            Vec::new()
        };
        cache.get_or_refresh(start, load);
        cache.get_or_refresh(start + Duration::from_secs(60), load);
        assert_eq!(calls.get(), 2);
        cache.invalidate();
        assert!(!cache.is_fresh(start + Duration::from_secs(61)));
        cache.get_or_refresh(start + Duration::from_secs(61), load);
        assert_eq!(calls.get(), 3);
    }
}
