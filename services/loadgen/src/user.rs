use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use traffic_model::{TaskSet, ThinkTime, Tick};

use crate::{executor::Executor, report::OutcomeSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Running,
    Stopped,
}

/// What one virtual user did before it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReport {
    pub id: usize,
    pub state: UserState,
    pub ticks: u64,
    pub fired: u64,
    pub skipped: u64,
    pub failures: u64,
}

impl UserReport {
    fn new(id: usize) -> Self {
        Self {
            id,
            state: UserState::Running,
            ticks: 0,
            fired: 0,
            skipped: 0,
            failures: 0,
        }
    }
}

/// One simulated client: select a task, run it to completion, think, repeat.
///
/// Never has more than one request in flight. The stop token is checked
/// between iterations and during the pauses, never while a request runs.
pub struct VirtualUser<A, E> {
    id: usize,
    tasks: Arc<TaskSet<A>>,
    executor: Arc<E>,
    sink: Arc<dyn OutcomeSink>,
    think_time: ThinkTime,
    start_delay: Duration,
    rng: StdRng,
    stop: CancellationToken,
}

impl<A, E> VirtualUser<A, E>
where
    A: Send + Sync + 'static,
    E: Executor<A> + 'static,
{
    pub fn new(
        id: usize,
        tasks: Arc<TaskSet<A>>,
        executor: Arc<E>,
        sink: Arc<dyn OutcomeSink>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            id,
            tasks,
            executor,
            sink,
            think_time: ThinkTime::default(),
            start_delay: Duration::ZERO,
            rng: StdRng::from_os_rng(),
            stop,
        }
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Use a reproducible random stream for this user.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub async fn run(mut self) -> UserReport {
        let mut report = UserReport::new(self.id);

        if !self.start_delay.is_zero() && !self.pause(self.start_delay).await {
            report.state = UserState::Stopped;
            return report;
        }

        tracing::debug!(user = self.id, "Virtual user started");

        while !self.stop.is_cancelled() {
            report.ticks += 1;
            match self.tasks.tick(&mut self.rng) {
                Tick::Fire(task) => {
                    let outcome = self.executor.execute(self.id, task).await;
                    report.fired += 1;
                    if !outcome.success {
                        report.failures += 1;
                    }
                    self.sink.emit(outcome);
                }
                Tick::Skipped(task) => {
                    report.skipped += 1;
                    self.sink.skipped(&task.name, self.id);
                }
            }

            let pause = self.think_time.sample(&mut self.rng);
            if !self.pause(pause).await {
                break;
            }
        }

        report.state = UserState::Stopped;
        tracing::debug!(
            user = self.id,
            ticks = report.ticks,
            fired = report.fired,
            failures = report.failures,
            "Virtual user stopped"
        );
        report
    }

    /// Sleep unless stopped first. Returns `false` if the stop signal won.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
