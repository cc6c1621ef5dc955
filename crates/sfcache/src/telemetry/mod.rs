// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events and metrics for cache operations.
//!
//! Every cache operation emits one or more `cache.event` records through [`tracing`], carrying
//! the cache name, the operation and what happened. The level depends on the activity: reads are
//! logged at `DEBUG`, writes and removals at `INFO`, loader failures at `ERROR`.
//!
//! When the cache is built with a meter provider, the same events are counted through
//! OpenTelemetry, loader durations are recorded in a histogram and the number of stored entries
//! is reported through a gauge after every write.

use std::time::Duration;

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Histogram, Meter},
};
use tracing::Level;

pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Type alias for cache names used in telemetry.
pub type CacheName = &'static str;

// Field names must match the ones spelled out in `CacheTelemetry::emit`.
const CACHE_NAME: &str = "cache.name";
const CACHE_OPERATION_NAME: &str = "cache.operation";
const CACHE_ACTIVITY_NAME: &str = "cache.activity";
#[cfg(test)]
const CACHE_DURATION_NAME: &str = "cache.duration_ns";
#[cfg(test)]
const CACHE_EVENT_NAME: &str = "cache.event";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Load,
    Get,
    Peek,
    Set,
    Delete,
    Clear,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "cache.load",
            Self::Get => "cache.get",
            Self::Peek => "cache.peek",
            Self::Set => "cache.set",
            Self::Delete => "cache.delete",
            Self::Clear => "cache.clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    HitAbsent,
    Expired,
    Miss,
    Loaded,
    Joined,
    LoadFailed,
    Inserted,
    Rejected,
    Evicted,
    Deleted,
    Cleared,
    Cancelled,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::HitAbsent => "cache.hit_absent",
            Self::Expired => "cache.expired",
            Self::Miss => "cache.miss",
            Self::Loaded => "cache.loaded",
            Self::Joined => "cache.joined",
            Self::LoadFailed => "cache.load_failed",
            Self::Inserted => "cache.inserted",
            Self::Rejected => "cache.rejected",
            Self::Evicted => "cache.evicted",
            Self::Deleted => "cache.deleted",
            Self::Cleared => "cache.cleared",
            Self::Cancelled => "cache.cancelled",
        }
    }

    pub fn severity(self) -> Level {
        match self {
            Self::Hit | Self::HitAbsent | Self::Miss | Self::Loaded | Self::Joined => Level::DEBUG,
            Self::Expired
            | Self::Inserted
            | Self::Rejected
            | Self::Evicted
            | Self::Deleted
            | Self::Cleared
            | Self::Cancelled => Level::INFO,
            Self::LoadFailed => Level::ERROR,
        }
    }
}

/// Records cache events as log records and, if a meter was configured, as metrics.
#[derive(Clone, Debug, Default)]
pub(crate) struct CacheTelemetry {
    event_counter: Option<Counter<u64>>,
    load_duration: Option<Histogram<f64>>,
    cache_size: Option<Gauge<u64>>,
}

impl CacheTelemetry {
    pub fn new(meter: Option<&Meter>) -> Self {
        Self {
            event_counter: meter.map(metrics::create_event_counter),
            load_duration: meter.map(metrics::create_load_duration_histogram),
            cache_size: meter.map(metrics::create_cache_size_gauge),
        }
    }

    pub fn record(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        if self.event_counter.is_some() || self.load_duration.is_some() {
            let attrs = [
                KeyValue::new(CACHE_NAME, cache_name),
                KeyValue::new(CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(CACHE_ACTIVITY_NAME, activity.as_str()),
            ];
            if let Some(counter) = &self.event_counter {
                counter.add(1, &attrs);
            }
            if let (Some(d), Some(histogram)) = (duration, &self.load_duration) {
                histogram.record(d.as_secs_f64(), &attrs);
            }
        }

        Self::emit(cache_name, operation, activity, duration);
    }

    /// Reports the number of stored entries.
    pub fn record_size(&self, cache_name: CacheName, size: usize) {
        if let Some(gauge) = &self.cache_size {
            gauge.record(u64::try_from(size).unwrap_or(u64::MAX), &[KeyValue::new(CACHE_NAME, cache_name)]);
        }
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        let op = operation.as_str();
        let ev = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // The level of a tracing event must be a constant.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = ev,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Level::ERROR => emit_event!(error),
            Level::INFO => emit_event!(info),
            _ => emit_event!(debug),
        }
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::metrics::MeterProvider;

    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};

    const ALL_ACTIVITIES: [CacheActivity; 13] = [
        CacheActivity::Hit,
        CacheActivity::HitAbsent,
        CacheActivity::Expired,
        CacheActivity::Miss,
        CacheActivity::Loaded,
        CacheActivity::Joined,
        CacheActivity::LoadFailed,
        CacheActivity::Inserted,
        CacheActivity::Rejected,
        CacheActivity::Evicted,
        CacheActivity::Deleted,
        CacheActivity::Cleared,
        CacheActivity::Cancelled,
    ];

    #[test]
    fn cache_operation_as_str() {
        assert_eq!(CacheOperation::Load.as_str(), "cache.load");
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Peek.as_str(), "cache.peek");
        assert_eq!(CacheOperation::Set.as_str(), "cache.set");
        assert_eq!(CacheOperation::Delete.as_str(), "cache.delete");
        assert_eq!(CacheOperation::Clear.as_str(), "cache.clear");
    }

    #[test]
    fn activity_names_are_prefixed_and_unique() {
        let names: std::collections::HashSet<_> = ALL_ACTIVITIES.iter().map(|a| a.as_str()).collect();
        assert_eq!(names.len(), ALL_ACTIVITIES.len());
        assert!(names.iter().all(|name| name.starts_with("cache.")));
    }

    #[test]
    fn severity_levels() {
        for activity in [
            CacheActivity::Hit,
            CacheActivity::HitAbsent,
            CacheActivity::Miss,
            CacheActivity::Loaded,
            CacheActivity::Joined,
        ] {
            assert_eq!(activity.severity(), Level::DEBUG, "{activity:?}");
        }
        for activity in [
            CacheActivity::Expired,
            CacheActivity::Inserted,
            CacheActivity::Rejected,
            CacheActivity::Evicted,
            CacheActivity::Deleted,
            CacheActivity::Cleared,
            CacheActivity::Cancelled,
        ] {
            assert_eq!(activity.severity(), Level::INFO, "{activity:?}");
        }
        assert_eq!(CacheActivity::LoadFailed.severity(), Level::ERROR);
    }

    #[test]
    fn record_contains_all_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::default().record(
            "my_test_cache",
            CacheOperation::Load,
            CacheActivity::LoadFailed,
            Some(Duration::from_nanos(12345)),
        );

        capture.assert_contains(CACHE_NAME);
        capture.assert_contains(CACHE_OPERATION_NAME);
        capture.assert_contains(CACHE_ACTIVITY_NAME);
        capture.assert_contains(CACHE_DURATION_NAME);
        capture.assert_contains(CACHE_EVENT_NAME);

        capture.assert_contains("my_test_cache");
        capture.assert_contains(CacheOperation::Load.as_str());
        capture.assert_contains(CacheActivity::LoadFailed.as_str());
        capture.assert_contains("12345");
    }

    #[test]
    fn record_uses_activity_severity() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::default().record("cache", CacheOperation::Load, CacheActivity::LoadFailed, None);
        capture.assert_contains("ERROR");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::default().record("cache", CacheOperation::Set, CacheActivity::Inserted, None);
        capture.assert_contains("INFO");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::default().record("cache", CacheOperation::Get, CacheActivity::Hit, None);
        capture.assert_contains("DEBUG");
    }

    #[test]
    fn metrics_carry_name_operation_and_activity() {
        let tester = MetricTester::new();
        let meter = tester.meter_provider().meter("cache");
        let telemetry = CacheTelemetry::new(Some(&meter));

        telemetry.record("my_cache", CacheOperation::Load, CacheActivity::Loaded, Some(Duration::from_millis(5)));

        tester.assert_attributes_contain(&[
            KeyValue::new(CACHE_NAME, "my_cache"),
            KeyValue::new(CACHE_OPERATION_NAME, CacheOperation::Load.as_str()),
            KeyValue::new(CACHE_ACTIVITY_NAME, CacheActivity::Loaded.as_str()),
        ]);
    }

    #[test]
    fn size_gauge_carries_cache_name() {
        let tester = MetricTester::new();
        let meter = tester.meter_provider().meter("cache");
        let telemetry = CacheTelemetry::new(Some(&meter));

        telemetry.record_size("size_test_cache", 42);

        tester.assert_attributes_contain(&[KeyValue::new(CACHE_NAME, "size_test_cache")]);
    }

    #[test]
    fn without_meter_only_logs_are_emitted() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let telemetry = CacheTelemetry::new(None);

        telemetry.record("quiet", CacheOperation::Get, CacheActivity::Miss, None);
        telemetry.record_size("quiet", 3);

        assert_eq!(capture.count("cache.miss"), 1);
    }
}
