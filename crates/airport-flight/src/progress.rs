//! Scan progress shared between the pulling workers and telemetry readers.
//!
//! Each endpoint reports into its own [`ScanProgress`] cell; a multi-endpoint
//! scan is as far along as the mean of its cells.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A fraction in `[0, 1]` that never decreases.
///
/// Writers and readers use relaxed atomics; a reader eventually observes the
/// latest value written and nothing stronger is promised.
#[derive(Debug)]
pub struct ScanProgress {
    bits: AtomicU64,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanProgress {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Record a reported fraction. NaN is ignored and values are clamped.
    pub fn update(&self, fraction: f64) {
        if fraction.is_nan() || fraction <= 0.0 {
            return;
        }
        // Positive IEEE-754 doubles order the same as their bit patterns.
        let clamped = fraction.min(1.0);
        self.bits.fetch_max(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Progress as a percentage, for display.
    pub fn percent(&self) -> f64 {
        self.get() * 100.0
    }
}

/// Per-endpoint progress of one scan.
#[derive(Debug)]
pub struct EndpointProgress {
    endpoints: Vec<Arc<ScanProgress>>,
}

impl EndpointProgress {
    pub fn new(endpoints: usize) -> Self {
        Self {
            endpoints: (0..endpoints).map(|_| Arc::new(ScanProgress::new())).collect(),
        }
    }

    /// The cell for endpoint `index`; out-of-range indices get a detached cell.
    pub fn endpoint(&self, index: usize) -> Arc<ScanProgress> {
        self.endpoints
            .get(index)
            .cloned()
            .unwrap_or_else(|| Arc::new(ScanProgress::new()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Mean of the endpoint fractions. A scan without endpoints is complete.
    pub fn get(&self) -> f64 {
        if self.endpoints.is_empty() {
            return 1.0;
        }
        let sum: f64 = self.endpoints.iter().map(|p| p.get()).sum();
        sum / self.endpoints.len() as f64
    }

    pub fn percent(&self) -> f64 {
        self.get() * 100.0
    }
}
