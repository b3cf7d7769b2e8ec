use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Conversion counters. Shared by reference across bulk workers, hence atomics.
#[derive(Debug, Default)]
pub struct ConversionMetrics {
    decodes: AtomicU64,
    encodes: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    keys_decoded: AtomicU64,
}

impl ConversionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decode(&self, key_count: usize) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        self.keys_decoded
            .fetch_add(key_count as u64, Ordering::Relaxed);
    }

    pub fn record_encode(&self) {
        self.encodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache(&self, hit: bool) {
        let counter = if hit {
            &self.cache_hits
        } else {
            &self.cache_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            decodes: self.decodes.load(Ordering::Relaxed),
            encodes: self.encodes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            keys_decoded: self.keys_decoded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub decodes: u64,
    pub encodes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub keys_decoded: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "conversion_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("decodes".to_string(), json!(self.decodes));
        map.insert("encodes".to_string(), json!(self.encodes));
        map.insert("failures".to_string(), json!(self.failures));
        map.insert("cache_hits".to_string(), json!(self.cache_hits));
        map.insert("cache_misses".to_string(), json!(self.cache_misses));
        map.insert("keys_decoded".to_string(), json!(self.keys_decoded));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let metrics = ConversionMetrics::new();
        metrics.record_decode(4);
        metrics.record_decode(2);
        metrics.record_encode();
        metrics.record_failure();
        metrics.record_cache(true);
        metrics.record_cache(false);
        metrics.record_cache(false);

        let snapshot = metrics.snapshot(Duration::from_millis(12));
        assert_eq!(
            snapshot,
            MetricSnapshot {
                uptime_ms: 12,
                decodes: 2,
                encodes: 1,
                failures: 1,
                cache_hits: 1,
                cache_misses: 2,
                keys_decoded: 6,
            }
        );
    }

    #[test]
    fn snapshot_converts_to_log_event() {
        let metrics = ConversionMetrics::new();
        metrics.record_encode();
        let event = metrics
            .snapshot(Duration::ZERO)
            .to_log_event("physical_layout::metrics");
        assert_eq!(event.message, "conversion_metrics");
        assert_eq!(event.fields["encodes"], json!(1));
        assert_eq!(event.fields.len(), 7);
    }
}
