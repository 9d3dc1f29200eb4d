//! Common types shared by all adapters

use std::sync::atomic::{AtomicU64, Ordering};

/// Uniform delivery outcome
///
/// Transport failures are folded into HTTP-like codes so the retry/abort
/// policy only ever looks at one shape:
/// connection errors → 500, timeouts → 504, throttling → 429.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    pub status_code: u16,
    pub body: String,
    pub content_type: String,
}

impl DeliveryResponse {
    pub fn new(status_code: u16, body: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            content_type: content_type.into(),
        }
    }

    /// Plain 200 with an empty body
    pub fn success() -> Self {
        Self::new(200, "", "")
    }

    /// Transport-level failure folded into a 500
    pub fn transport_error(detail: impl Into<String>) -> Self {
        Self::new(500, detail, "text/plain")
    }

    /// Timeout folded into a 504
    pub fn timeout() -> Self {
        Self::new(504, "delivery timed out", "text/plain")
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.class() == ResponseClass::Success
    }

    /// Outcome class driving the job state machine
    #[inline]
    pub fn class(&self) -> ResponseClass {
        ResponseClass::of(self.status_code)
    }
}

/// Coarse classification of a delivery outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx - delivered
    Success,
    /// 429 - destination asked to slow down
    Throttle,
    /// 5xx and transport failures - worth retrying
    Transient,
    /// Remaining 4xx and anything unclassifiable - do not retry
    Permanent,
}

impl ResponseClass {
    /// Classify an HTTP-like status code
    pub fn of(status_code: u16) -> Self {
        match status_code {
            200..=299 => ResponseClass::Success,
            429 => ResponseClass::Throttle,
            500..=599 => ResponseClass::Transient,
            _ => ResponseClass::Permanent,
        }
    }
}

/// Delivery counters shared by adapter kinds
///
/// All fields use atomics for lock-free updates from concurrent sends.
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    /// Total delivery attempts
    pub attempts: AtomicU64,
    /// Attempts answered with 2xx
    pub successes: AtomicU64,
    /// Attempts answered with anything else
    pub failures: AtomicU64,
    /// Bytes handed to the destination
    pub bytes_sent: AtomicU64,
    /// Reconnects performed (connection-oriented adapters)
    pub reconnects: AtomicU64,
}

impl AdapterMetrics {
    pub const fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_attempt(&self, bytes: u64) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_outcome(&self, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> AdapterMetricsSnapshot {
        AdapterMetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of adapter metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterMetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub bytes_sent: u64,
    pub reconnects: u64,
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
