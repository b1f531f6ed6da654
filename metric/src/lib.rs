//! A small in-process metrics registry.
//!
//! Mirrors the shape IOx's own `metric` crate exposes: a [`Registry`] of
//! named, attribute-keyed instruments, with `U64Counter` and
//! `DurationHistogram` as the two instrument kinds the queue manager needs
//! (tick counters, lease/poll latency).
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A set of key-value labels identifying one time series within a metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one label, builder-style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl<const N: usize> From<[(&'static str, &'static str); N]> for Attributes {
    fn from(pairs: [(&'static str, &'static str); N]) -> Self {
        let mut attrs = Self::new();
        for (k, v) in pairs {
            attrs = attrs.with(k, v);
        }
        attrs
    }
}

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct U64Counter(AtomicU64);

impl U64Counter {
    /// Adds `value` to the counter.
    pub fn inc(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    /// Returns the current value.
    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A histogram of observed durations, bucketed by power-of-two
/// milliseconds; no export path, only in-process introspection.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    buckets: Mutex<BTreeMap<u32, u64>>,
}

impl DurationHistogram {
    /// Records one observation.
    pub fn record(&self, value: Duration) {
        let bucket = 64 - (value.as_millis().max(1) as u64).leading_zeros();
        *self.buckets.lock().entry(bucket).or_insert(0) += 1;
    }

    /// Total number of observations recorded.
    pub fn count(&self) -> u64 {
        self.buckets.lock().values().sum()
    }
}

/// One named, attribute-keyed family of instruments of type `T`.
#[derive(Debug)]
pub struct Metric<T> {
    name: &'static str,
    instruments: Mutex<BTreeMap<Attributes, Arc<T>>>,
}

impl<T: Default> Metric<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            instruments: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns this metric's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the instrument for `attributes`, creating it on first use.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> Arc<T> {
        self.instruments
            .lock()
            .entry(attributes.into())
            .or_insert_with(|| Arc::new(T::default()))
            .clone()
    }
}

/// Registry of named metrics, one process-wide instance per binary.
#[derive(Debug, Default)]
pub struct Registry {
    counters: Mutex<BTreeMap<&'static str, Arc<Metric<U64Counter>>>>,
    histograms: Mutex<BTreeMap<&'static str, Arc<Metric<DurationHistogram>>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or returns the existing) counter family named `name`.
    pub fn register_counter(&self, name: &'static str) -> Arc<Metric<U64Counter>> {
        self.counters
            .lock()
            .entry(name)
            .or_insert_with(|| Arc::new(Metric::new(name)))
            .clone()
    }

    /// Registers (or returns the existing) histogram family named `name`.
    pub fn register_histogram(&self, name: &'static str) -> Arc<Metric<DurationHistogram>> {
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| Arc::new(Metric::new(name)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_recorder_is_shared_per_attribute_set() {
        let registry = Registry::new();
        let family = registry.register_counter("tasks_leased");

        let a = family.recorder(Attributes::new().with("tag", "x"));
        let b = family.recorder(Attributes::new().with("tag", "x"));
        a.inc(3);
        b.inc(4);
        assert_eq!(a.fetch(), 7);

        let c = family.recorder(Attributes::new().with("tag", "y"));
        assert_eq!(c.fetch(), 0);
    }

    #[test]
    fn histogram_counts_observations() {
        let registry = Registry::new();
        let family = registry.register_histogram("lease_latency");
        let hist = family.recorder(Attributes::new());
        hist.record(Duration::from_millis(5));
        hist.record(Duration::from_millis(500));
        assert_eq!(hist.count(), 2);
    }
}
