//! Metrics for SMTP operations.
//!
//! Counters are plain atomics so concurrent sends can update them without
//! coordination. Logging goes through `tracing` at the call sites.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// SMTP metrics collector.
#[derive(Debug, Default)]
pub struct SmtpMetrics {
    /// Total emails sent successfully.
    pub emails_sent: AtomicU64,
    /// Total emails failed.
    pub emails_failed: AtomicU64,
    /// Total connection attempts.
    pub connection_attempts: AtomicU64,
    /// Failed connections.
    pub connections_failed: AtomicU64,
    /// Total authentication attempts.
    pub auth_attempts: AtomicU64,
    /// Failed authentications.
    pub auth_failed: AtomicU64,
}

impl SmtpMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful email send.
    pub fn record_send_success(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed email send.
    pub fn record_send_failure(&self) {
        self.emails_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the server's answer to the AUTH LOGIN password line.
    pub fn record_auth_attempt(&self, success: bool) {
        self.auth_attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.auth_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a connection attempt.
    pub fn record_connection_attempt(&self, success: bool) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.connections_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            auth_attempts: self.auth_attempts.load(Ordering::Relaxed),
            auth_failed: self.auth_failed.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.emails_sent.store(0, Ordering::Relaxed);
        self.emails_failed.store(0, Ordering::Relaxed);
        self.connection_attempts.store(0, Ordering::Relaxed);
        self.connections_failed.store(0, Ordering::Relaxed);
        self.auth_attempts.store(0, Ordering::Relaxed);
        self.auth_failed.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total emails sent successfully.
    pub emails_sent: u64,
    /// Total emails failed.
    pub emails_failed: u64,
    /// Total connection attempts.
    pub connection_attempts: u64,
    /// Failed connections.
    pub connections_failed: u64,
    /// Total authentication attempts.
    pub auth_attempts: u64,
    /// Failed authentications.
    pub auth_failed: u64,
}

impl MetricsSnapshot {
    /// Returns the email success rate.
    pub fn success_rate(&self) -> f64 {
        let total = self.emails_sent + self.emails_failed;
        if total == 0 {
            1.0
        } else {
            self.emails_sent as f64 / total as f64
        }
    }
}

/// Timer for measuring operation duration.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    /// Creates and starts a new timer.
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Stops the timer and returns the duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        tracing::debug!(timer = self.name, duration_ms = elapsed.as_millis() as u64, "Timer stopped");
        elapsed
    }
}
