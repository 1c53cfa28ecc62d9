//! Request counters for the protocol engine.
//!
//! Counters are lock-free and shared between the engine and the
//! `server-information` toolset, which reports them back to the client.

use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const PREFIX: &str = "jamfpro_mcp";

/// Metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Requests dispatched (responses owed)
    pub requests_total: AtomicU64,
    /// Requests answered with a JSON-RPC error
    pub requests_failed: AtomicU64,
    /// Notifications received
    pub notifications_total: AtomicU64,
    /// Lines that failed to decode
    pub parse_errors: AtomicU64,
    /// Tool invocations
    pub tool_calls: AtomicU64,
    /// Tool invocations that produced an error result
    pub tool_failures: AtomicU64,
    /// Successful resource reads
    pub resource_reads: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications(&self) {
        self.notifications_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one tool invocation and whether it failed.
    pub fn record_tool_call(&self, failed: bool) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.tool_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_resource_reads(&self) {
        self.resource_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            notifications_total: self.notifications_total.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            resource_reads: self.resource_reads.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let series = [
            ("requests_total", "Requests dispatched", s.requests_total),
            ("requests_failed", "Requests answered with an error", s.requests_failed),
            ("notifications_total", "Notifications received", s.notifications_total),
            ("parse_errors", "Input lines that failed to decode", s.parse_errors),
            ("tool_calls", "Tool invocations", s.tool_calls),
            ("tool_failures", "Tool invocations reporting an error", s.tool_failures),
            ("resource_reads", "Resources read", s.resource_reads),
        ];

        let mut out = String::new();
        for (name, help, value) in series {
            let _ = writeln!(out, "# HELP {}_{} {}", PREFIX, name, help);
            let _ = writeln!(out, "# TYPE {}_{} counter", PREFIX, name);
            let _ = writeln!(out, "{}_{} {}", PREFIX, name, value);
        }
        out
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub notifications_total: u64,
    pub parse_errors: u64,
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub resource_reads: u64,
}

/// Timer for measuring durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
