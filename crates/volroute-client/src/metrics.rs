//! Master connection outcome counters
//!
//! Counts every connection attempt and how it ended, exportable in
//! Prometheus text format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// How a connection attempt (or a message on it) turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectOutcome {
    /// Every attempt, regardless of result
    Total,
    Connected,
    RedirectedToLeader,
    FailedToKeepConnected,
    FailedToSend,
    FailedToReceive,
    OnPeerUpdate,
    Failed,
}

impl ConnectOutcome {
    pub const ALL: [Self; 8] = [
        Self::Total,
        Self::Connected,
        Self::RedirectedToLeader,
        Self::FailedToKeepConnected,
        Self::FailedToSend,
        Self::FailedToReceive,
        Self::OnPeerUpdate,
        Self::Failed,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Connected => "connected",
            Self::RedirectedToLeader => "redirectedToLeader",
            Self::FailedToKeepConnected => "failedToKeepConnected",
            Self::FailedToSend => "failedToSend",
            Self::FailedToReceive => "failedToReceive",
            Self::OnPeerUpdate => "onPeerUpdate",
            Self::Failed => "failed",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Per-client connection counters
#[derive(Debug, Default)]
pub struct ConnectionCounters {
    counts: [AtomicU64; 8],
}

impl ConnectionCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, outcome: ConnectOutcome) {
        self.counts[outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self, outcome: ConnectOutcome) -> u64 {
        self.counts[outcome.index()].load(Ordering::Relaxed)
    }

    /// Current value of every counter
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ConnectOutcome, u64)> {
        ConnectOutcome::ALL
            .iter()
            .map(|outcome| (*outcome, self.get(*outcome)))
            .collect()
    }

    /// Export counters in Prometheus text format
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(512);
        let _ = writeln!(
            output,
            "# HELP volroute_master_client_connect_total Master client connection outcomes"
        );
        let _ = writeln!(output, "# TYPE volroute_master_client_connect_total counter");
        for (outcome, value) in self.snapshot() {
            let _ = writeln!(
                output,
                "volroute_master_client_connect_total{{type=\"{}\"}} {}",
                outcome.as_str(),
                value
            );
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment_independently() {
        let counters = ConnectionCounters::new();
        counters.inc(ConnectOutcome::Total);
        counters.inc(ConnectOutcome::Total);
        counters.inc(ConnectOutcome::RedirectedToLeader);

        assert_eq!(counters.get(ConnectOutcome::Total), 2);
        assert_eq!(counters.get(ConnectOutcome::RedirectedToLeader), 1);
        assert_eq!(counters.get(ConnectOutcome::Failed), 0);
    }

    #[test]
    fn test_export_prometheus() {
        let counters = ConnectionCounters::new();
        counters.inc(ConnectOutcome::Connected);

        let text = counters.export_prometheus();
        assert!(text.contains("# TYPE volroute_master_client_connect_total counter"));
        assert!(text.contains("volroute_master_client_connect_total{type=\"connected\"} 1"));
        assert!(text.contains("volroute_master_client_connect_total{type=\"failed\"} 0"));
    }
}
