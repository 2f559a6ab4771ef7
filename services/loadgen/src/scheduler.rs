use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use traffic_model::{RampUp, TaskSet, ThinkTime};
use uuid::Uuid;

use crate::{
    executor::Executor,
    report::OutcomeSink,
    user::{UserReport, VirtualUser},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    pub think_time: ThinkTime,
    pub ramp_up: RampUp,
}

/// Drives a pool of virtual users over a shared, immutable task set.
pub struct Scheduler<A, E> {
    tasks: Arc<TaskSet<A>>,
    executor: Arc<E>,
    sink: Arc<dyn OutcomeSink>,
    pacing: Pacing,
    seed: Option<u64>,
}

impl<A, E> Clone for Scheduler<A, E> {
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
            executor: Arc::clone(&self.executor),
            sink: Arc::clone(&self.sink),
            pacing: self.pacing,
            seed: self.seed,
        }
    }
}

impl<A, E> Scheduler<A, E>
where
    A: Send + Sync + 'static,
    E: Executor<A> + 'static,
{
    pub fn new(tasks: TaskSet<A>, executor: E, sink: Arc<dyn OutcomeSink>) -> Self {
        Self {
            tasks: Arc::new(tasks),
            executor: Arc::new(executor),
            sink,
            pacing: Pacing::default(),
            seed: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Seed each user's random stream from `seed + user id`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Spawn `concurrency` virtual users and hand back control of the run.
    pub fn start(&self, concurrency: usize) -> RunningLoad<A, E> {
        let mut running = RunningLoad {
            scheduler: self.clone(),
            run_id: Uuid::new_v4(),
            root: CancellationToken::new(),
            active: Vec::new(),
            retired: Vec::new(),
            next_id: 0,
            started: Instant::now(),
        };
        tracing::info!(run_id = %running.run_id, users = concurrency, "Starting load run");
        running.scale_to(concurrency);
        running
    }

    /// Run until `duration` elapses or `stop` is cancelled, whichever comes
    /// first, then stop every user and wait for them to finish.
    pub async fn run(
        &self,
        concurrency: usize,
        duration: Option<Duration>,
        stop: CancellationToken,
    ) -> RunReport {
        let running = self.start(concurrency);

        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        tracing::info!(run_id = %running.run_id, "Run time elapsed");
                    }
                    _ = stop.cancelled() => {
                        tracing::info!(run_id = %running.run_id, "Stop requested");
                    }
                }
            }
            None => {
                stop.cancelled().await;
                tracing::info!(run_id = %running.run_id, "Stop requested");
            }
        }

        running.join().await
    }
}

struct UserHandle {
    id: usize,
    stop: CancellationToken,
    handle: JoinHandle<UserReport>,
}

/// A load run in progress.
pub struct RunningLoad<A, E> {
    scheduler: Scheduler<A, E>,
    run_id: Uuid,
    root: CancellationToken,
    active: Vec<UserHandle>,
    retired: Vec<JoinHandle<UserReport>>,
    next_id: usize,
    started: Instant,
}

impl<A, E> RunningLoad<A, E>
where
    A: Send + Sync + 'static,
    E: Executor<A> + 'static,
{
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn users(&self) -> usize {
        self.active.len()
    }

    /// Grow or shrink the pool. New users are staggered over the ramp-up
    /// window; removed users are the most recently started ones and stop
    /// after their current request.
    pub fn scale_to(&mut self, users: usize) {
        let current = self.active.len();

        if users > current {
            let added = users - current;
            let pacing = self.scheduler.pacing;
            for slot in 0..added {
                let id = self.next_id;
                self.next_id += 1;

                let stop = self.root.child_token();
                let mut user = VirtualUser::new(
                    id,
                    Arc::clone(&self.scheduler.tasks),
                    Arc::clone(&self.scheduler.executor),
                    Arc::clone(&self.scheduler.sink),
                    stop.clone(),
                )
                .with_think_time(pacing.think_time)
                .with_start_delay(pacing.ramp_up.delay_for(slot, added));
                if let Some(seed) = self.scheduler.seed {
                    user = user.with_seed(seed.wrapping_add(id as u64));
                }

                let handle = tokio::spawn(user.run());
                self.active.push(UserHandle { id, stop, handle });
            }
            tracing::info!(run_id = %self.run_id, from = current, to = users, "Scaled up");
        } else if users < current {
            for user in self.active.drain(users..) {
                tracing::debug!(run_id = %self.run_id, user = user.id, "Retiring virtual user");
                user.stop.cancel();
                self.retired.push(user.handle);
            }
            tracing::info!(run_id = %self.run_id, from = current, to = users, "Scaled down");
        }
    }

    /// Signal every user to stop without waiting.
    pub fn stop(&self) {
        self.root.cancel();
    }

    /// Stop every user and wait for all of them, including retired ones.
    pub async fn join(self) -> RunReport {
        self.root.cancel();

        let handles = self
            .active
            .into_iter()
            .map(|u| u.handle)
            .chain(self.retired);

        let mut users = Vec::new();
        for result in join_all(handles).await {
            match result {
                Ok(report) => users.push(report),
                Err(e) => tracing::error!(run_id = %self.run_id, error = %e, "Virtual user task failed"),
            }
        }
        users.sort_by_key(|u| u.id);

        let report = RunReport {
            run_id: self.run_id,
            elapsed: self.started.elapsed(),
            users,
        };
        tracing::info!(
            run_id = %report.run_id,
            elapsed_ms = report.elapsed.as_millis() as u64,
            fired = report.fired(),
            failures = report.failures(),
            "Load run finished"
        );
        report
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub elapsed: Duration,
    pub users: Vec<UserReport>,
}

impl RunReport {
    pub fn fired(&self) -> u64 {
        self.users.iter().map(|u| u.fired).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.users.iter().map(|u| u.skipped).sum()
    }

    pub fn failures(&self) -> u64 {
        self.users.iter().map(|u| u.failures).sum()
    }
}
