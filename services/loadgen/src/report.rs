use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use hdrhistogram::{CreationError, Histogram};
use serde::Serialize;
use traffic_model::RequestOutcome;

/// Where virtual users hand their outcomes. Shared by every user, so
/// implementations must accept concurrent writers.
pub trait OutcomeSink: Send + Sync {
    fn emit(&self, outcome: RequestOutcome);

    /// A task was selected but its gate kept it from firing.
    fn skipped(&self, _task_name: &str, _user_id: usize) {}
}

/// Logs every outcome as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn emit(&self, outcome: RequestOutcome) {
        if outcome.success {
            tracing::debug!(
                task = %outcome.task_name,
                user = outcome.user_id,
                status = %outcome.status,
                duration_ms = outcome.duration_ms,
                "Request completed"
            );
        } else {
            tracing::warn!(
                task = %outcome.task_name,
                user = outcome.user_id,
                status = %outcome.status,
                duration_ms = outcome.duration_ms,
                "Request failed"
            );
        }
    }

    fn skipped(&self, task_name: &str, user_id: usize) {
        tracing::trace!(task = task_name, user = user_id, "Gate skipped task");
    }
}

/// Sends every event to each inner sink in order.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl OutcomeSink for Fanout {
    fn emit(&self, outcome: RequestOutcome) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(outcome.clone());
            }
            last.emit(outcome);
        }
    }

    fn skipped(&self, task_name: &str, user_id: usize) {
        for sink in &self.sinks {
            sink.skipped(task_name, user_id);
        }
    }
}

/// Latencies above this are recorded as this value.
const MAX_TRACKED_LATENCY_MS: u64 = 3_600_000;
const LATENCY_SIGFIGS: u8 = 3;

#[derive(Debug)]
struct TaskStats {
    requests: u64,
    failures: u64,
    skipped: u64,
    latency: Histogram<u64>,
    status_codes: BTreeMap<u16, u64>,
    errors: BTreeMap<String, u64>,
}

impl TaskStats {
    fn new(latency: Histogram<u64>) -> Self {
        Self {
            requests: 0,
            failures: 0,
            skipped: 0,
            latency,
            status_codes: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }
}

/// Per-task counters and a fixed-size latency histogram for the end-of-run
/// report. Memory does not grow with the number of requests.
#[derive(Debug)]
pub struct SummarySink {
    empty: Histogram<u64>,
    tasks: Mutex<BTreeMap<String, TaskStats>>,
}

impl SummarySink {
    pub fn new() -> Result<Self, CreationError> {
        let empty =
            Histogram::new_with_bounds(1, MAX_TRACKED_LATENCY_MS, LATENCY_SIGFIGS)?;
        Ok(Self {
            empty,
            tasks: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn summary(&self) -> RunSummary {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<TaskSummary> = tasks
            .iter()
            .map(|(name, stats)| TaskSummary::from_stats(name, stats))
            .collect();
        rows.sort_by(|a, b| b.requests.cmp(&a.requests).then_with(|| a.name.cmp(&b.name)));

        let requests = rows.iter().map(|r| r.requests).sum();
        let failures = rows.iter().map(|r| r.failures).sum();
        let skipped = rows.iter().map(|r| r.skipped).sum();

        RunSummary {
            tasks: rows,
            requests,
            failures,
            skipped,
        }
    }

    fn with_task<F: FnOnce(&mut TaskStats)>(&self, task_name: &str, update: F) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match tasks.get_mut(task_name) {
            Some(stats) => update(stats),
            None => {
                let mut stats = TaskStats::new(self.empty.clone());
                update(&mut stats);
                tasks.insert(task_name.to_string(), stats);
            }
        }
    }
}

impl OutcomeSink for SummarySink {
    fn emit(&self, outcome: RequestOutcome) {
        self.with_task(&outcome.task_name, |stats| {
            stats.requests += 1;
            if !outcome.success {
                stats.failures += 1;
            }
            stats.latency.saturating_record(outcome.duration_ms);
            match outcome.status {
                traffic_model::OutcomeStatus::Status(code) => {
                    *stats.status_codes.entry(code).or_default() += 1;
                }
                traffic_model::OutcomeStatus::Error(kind) => {
                    *stats.errors.entry(kind.to_string()).or_default() += 1;
                }
            }
        });
    }

    fn skipped(&self, task_name: &str, _user_id: usize) {
        self.with_task(task_name, |stats| stats.skipped += 1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub name: String,
    pub requests: u64,
    pub failures: u64,
    pub skipped: u64,
    pub min_ms: u64,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<String, u64>,
}

impl TaskSummary {
    fn from_stats(name: &str, stats: &TaskStats) -> Self {
        let latency = &stats.latency;
        let recorded = !latency.is_empty();
        let pick = |value: u64| if recorded { value } else { 0 };

        Self {
            name: name.to_string(),
            requests: stats.requests,
            failures: stats.failures,
            skipped: stats.skipped,
            min_ms: pick(latency.min()),
            mean_ms: if recorded { latency.mean() } else { 0.0 },
            p50_ms: pick(latency.value_at_quantile(0.50)),
            p95_ms: pick(latency.value_at_quantile(0.95)),
            max_ms: pick(latency.max()),
            status_codes: stats.status_codes.clone(),
            errors: stats.errors.clone(),
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub tasks: Vec<TaskSummary>,
    pub requests: u64,
    pub failures: u64,
    pub skipped: u64,
}

impl RunSummary {
    pub fn task(&self, name: &str) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.requests as f64
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<18} {:>8} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7}",
            "task", "reqs", "fails", "skipped", "min", "p50", "p95", "max"
        )?;
        for t in &self.tasks {
            writeln!(
                f,
                "{:<18} {:>8} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7}",
                t.name, t.requests, t.failures, t.skipped, t.min_ms, t.p50_ms, t.p95_ms, t.max_ms
            )?;
        }
        write!(
            f,
            "{:<18} {:>8} {:>8} {:>8}   failure rate {:.2}%",
            "total",
            self.requests,
            self.failures,
            self.skipped,
            self.failure_rate() * 100.0
        )
    }
}
