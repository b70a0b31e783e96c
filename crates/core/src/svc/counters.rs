//! Request subsystem counters.
//!
//! Exposed through [SvcRequestCounters::snapshot] for an external telemetry
//! collector. Every counter is a relaxed atomic, they are diagnostics only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters of a request pool.
#[derive(Debug, Default)]
pub struct SvcRequestCounters {
    invocation_errors: AtomicU64,
    timeouts: AtomicU64,
    unknown_msg_types: AtomicU64,
    late_responses: AtomicU64,
    completed_ok: AtomicU64,
    completed_err: AtomicU64,
    rtt_total_micros: AtomicU64,
    rtt_max_micros: AtomicU64,
}

/// Point-in-time copy of [SvcRequestCounters].
#[derive(
    Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct SvcRequestCountersSnapshot {
    /// Locally synthesized invocation failures.
    pub invocation_errors: u64,

    /// Requests that timed out.
    pub timeouts: u64,

    /// Inbound requests dropped for lack of a handler.
    pub unknown_msg_types: u64,

    /// Responses that arrived for requests no longer in flight.
    pub late_responses: u64,

    /// Tracked requests that completed with success.
    pub completed_ok: u64,

    /// Tracked requests that completed with an error.
    pub completed_err: u64,

    /// Sum of invoke-to-completion times, in microseconds.
    pub rtt_total_micros: u64,

    /// Largest invoke-to-completion time, in microseconds.
    pub rtt_max_micros: u64,
}

impl SvcRequestCountersSnapshot {
    /// Mean invoke-to-completion time of completed tracked requests.
    pub fn rtt_mean(&self) -> Option<Duration> {
        let count = self.completed_ok + self.completed_err;
        if count == 0 {
            return None;
        }
        Some(Duration::from_micros(self.rtt_total_micros / count))
    }
}

impl SvcRequestCounters {
    pub(crate) fn incr_invocation_errors(&self) {
        self.invocation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_unknown_msg_types(&self) {
        self.unknown_msg_types.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_late_responses(&self) {
        self.late_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tracked request reaching Complete.
    pub(crate) fn record_completion(&self, rtt: Duration, ok: bool) {
        if ok {
            self.completed_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed_err.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(rtt.as_micros()).unwrap_or(u64::MAX);
        self.rtt_total_micros.fetch_add(micros, Ordering::Relaxed);
        self.rtt_max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    /// Take a snapshot of the current counter values.
    pub fn snapshot(&self) -> SvcRequestCountersSnapshot {
        SvcRequestCountersSnapshot {
            invocation_errors: self.invocation_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            unknown_msg_types: self.unknown_msg_types.load(Ordering::Relaxed),
            late_responses: self.late_responses.load(Ordering::Relaxed),
            completed_ok: self.completed_ok.load(Ordering::Relaxed),
            completed_err: self.completed_err.load(Ordering::Relaxed),
            rtt_total_micros: self.rtt_total_micros.load(Ordering::Relaxed),
            rtt_max_micros: self.rtt_max_micros.load(Ordering::Relaxed),
        }
    }
}
