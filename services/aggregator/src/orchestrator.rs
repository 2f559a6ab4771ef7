use downstream::{DownstreamClient, UpstreamFailure};
use serde::Serialize;
use serde_json::Value;

/// Fields this service contributes to every response it builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceIdentity {
    pub service: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            service: "service-b".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    #[serde(flatten)]
    pub identity: ServiceIdentity,
    /// Downstream body, passed through untouched.
    pub service_a_payload: Value,
}

/// Combines this service's identity with one downstream fortune lookup.
///
/// Holds no mutable state, so concurrent requests share one instance.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    downstream: DownstreamClient,
    path: String,
    identity: ServiceIdentity,
}

impl Orchestrator {
    pub fn new(downstream: DownstreamClient, path: impl Into<String>) -> Self {
        Self {
            downstream,
            path: path.into(),
            identity: ServiceIdentity::default(),
        }
    }

    /// Exactly one downstream call per invocation; failures are returned as is.
    pub async fn aggregate(&self) -> Result<AggregateResult, UpstreamFailure> {
        let payload = self.downstream.get_json(&self.path).await?;
        Ok(AggregateResult {
            identity: self.identity.clone(),
            service_a_payload: payload,
        })
    }
}
