use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::Utc;
use downstream::FailureKind;
use reqwest::Client;
use traffic_model::{ErrorKind, RequestOutcome, TaskDefinition};

use crate::target::Endpoint;

/// Performs the action of a selected task and reports how it went.
///
/// Implementations must not fail: every problem becomes a failed
/// [`RequestOutcome`] so the calling virtual user keeps going.
#[async_trait]
pub trait Executor<A: Sync>: Send + Sync {
    async fn execute(&self, user_id: usize, task: &TaskDefinition<A>) -> RequestOutcome;
}

#[async_trait]
impl<A, E> Executor<A> for Arc<E>
where
    A: Sync,
    E: Executor<A> + ?Sized,
{
    async fn execute(&self, user_id: usize, task: &TaskDefinition<A>) -> RequestOutcome {
        (**self).execute(user_id, task).await
    }
}

/// Issues a GET for each task against its resolved endpoint.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    timeout: Duration,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(Client::new(), timeout)
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

/// Outcome error for a failed request, using the same classification as
/// the downstream adapter.
fn error_kind(failure: FailureKind) -> ErrorKind {
    match failure {
        FailureKind::Timeout => ErrorKind::Timeout,
        FailureKind::Connect => ErrorKind::Connect,
        FailureKind::Decode => ErrorKind::Body,
        FailureKind::Status | FailureKind::Transport => ErrorKind::Transport,
    }
}

#[async_trait]
impl Executor<Endpoint> for HttpExecutor {
    async fn execute(&self, user_id: usize, task: &TaskDefinition<Endpoint>) -> RequestOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();

        let result = self
            .client
            .get(task.action.url.clone())
            .timeout(self.timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(task = %task.name, user = user_id, error = %err, "Request failed");
                return RequestOutcome::from_error(
                    task.name.as_str(),
                    user_id,
                    started_at,
                    clock.elapsed(),
                    error_kind(FailureKind::from(&err)),
                );
            }
        };

        let status = response.status().as_u16();
        // The body is not inspected, but latency includes reading it.
        match response.bytes().await {
            Ok(_) => RequestOutcome::from_status(
                task.name.as_str(),
                user_id,
                started_at,
                clock.elapsed(),
                status,
            ),
            Err(err) => RequestOutcome::from_error(
                task.name.as_str(),
                user_id,
                started_at,
                clock.elapsed(),
                error_kind(FailureKind::from(&err)),
            ),
        }
    }
}
