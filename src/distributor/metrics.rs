use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

pub const RECEIVED_REQUESTS: &str = "alertdist_received_requests_total";
pub const REPLICA_SENDS: &str = "alertdist_replica_sends_total";
pub const REPLICA_SEND_FAILURES: &str = "alertdist_replica_send_failures_total";
pub const REPLICATION_FACTOR: &str = "alertdist_replication_factor";

/// Monotonic counter keyed by a single label value.
#[derive(Debug, Default)]
struct LabeledCounter {
    values: Mutex<HashMap<String, u64>>,
}

impl LabeledCounter {
    fn inc(&self, label: &str) {
        // A panic while holding the lock cannot leave a counter half-updated.
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match values.get_mut(label) {
            Some(value) => *value += 1,
            None => {
                values.insert(label.to_string(), 1);
            }
        }
    }

    fn get(&self, label: &str) -> u64 {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(label).copied().unwrap_or(0)
    }

    fn total(&self) -> u64 {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.values().sum()
    }

    fn sorted(&self) -> BTreeMap<String, u64> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

/// Point-in-time copy of the distributor counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistributorMetricsSnapshot {
    pub received_requests: BTreeMap<String, u64>,
    pub replica_sends: BTreeMap<String, u64>,
    pub replica_send_failures: BTreeMap<String, u64>,
    pub replication_factor: u64,
}

/// Counters for requests received per tenant and calls sent per replica.
#[derive(Debug, Default)]
pub struct DistributorMetrics {
    received_requests: LabeledCounter,
    replica_sends: LabeledCounter,
    replica_send_failures: LabeledCounter,
    replication_factor: AtomicU64,
}

impl DistributorMetrics {
    pub fn new(replication_factor: usize) -> Self {
        let metrics = Self::default();
        metrics
            .replication_factor
            .store(replication_factor as u64, Ordering::Relaxed);
        metrics
    }

    pub fn record_received(&self, tenant_id: &str) {
        self.received_requests.inc(tenant_id);
    }

    pub fn record_send(&self, replica: &str) {
        self.replica_sends.inc(replica);
    }

    pub fn record_send_failure(&self, replica: &str) {
        self.replica_send_failures.inc(replica);
    }

    pub fn received_requests(&self, tenant_id: &str) -> u64 {
        self.received_requests.get(tenant_id)
    }

    pub fn replica_sends(&self, replica: &str) -> u64 {
        self.replica_sends.get(replica)
    }

    pub fn replica_send_failures(&self, replica: &str) -> u64 {
        self.replica_send_failures.get(replica)
    }

    pub fn total_sends(&self) -> u64 {
        self.replica_sends.total()
    }

    pub fn total_send_failures(&self) -> u64 {
        self.replica_send_failures.total()
    }

    pub fn replication_factor(&self) -> u64 {
        self.replication_factor.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DistributorMetricsSnapshot {
        DistributorMetricsSnapshot {
            received_requests: self.received_requests.sorted(),
            replica_sends: self.replica_sends.sorted(),
            replica_send_failures: self.replica_send_failures.sorted(),
            replication_factor: self.replication_factor(),
        }
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn render_text(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        write_counter(
            &mut out,
            RECEIVED_REQUESTS,
            "The total number of API requests received.",
            "tenant",
            &snapshot.received_requests,
        );
        write_counter(
            &mut out,
            REPLICA_SENDS,
            "The total number of requests sent to a replica.",
            "replica",
            &snapshot.replica_sends,
        );
        write_counter(
            &mut out,
            REPLICA_SEND_FAILURES,
            "The total number of requests to a replica that failed.",
            "replica",
            &snapshot.replica_send_failures,
        );
        let _ = writeln!(out, "# HELP {REPLICATION_FACTOR} The configured replication factor.");
        let _ = writeln!(out, "# TYPE {REPLICATION_FACTOR} gauge");
        let _ = writeln!(out, "{REPLICATION_FACTOR} {}", snapshot.replication_factor);
        out
    }
}

fn write_counter(
    out: &mut String,
    name: &str,
    help: &str,
    label: &str,
    values: &BTreeMap<String, u64>,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    for (value, count) in values {
        let _ = writeln!(out, "{name}{{{label}=\"{}\"}} {count}", escape_label(value));
    }
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
