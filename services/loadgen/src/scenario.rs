use traffic_model::{ConfigurationError, TaskDefinition, TaskSet};

use crate::{
    config::Config,
    target::{Endpoint, Target},
};

pub const BETA_TAG: &str = "beta";

/// Canary gateway traffic: mostly the root page, some fortunes, a gated
/// slice of the beta feature and calls that fan out through service-b.
pub fn gateway_tasks(
    target: &Target,
    config: &Config,
) -> Result<Vec<TaskDefinition<Endpoint>>, ConfigurationError> {
    let endpoints = &config.endpoints;
    Ok(vec![
        TaskDefinition::new("hit_root", 5, target.endpoint(&endpoints.canary)?),
        TaskDefinition::new("pull_fortune", 3, target.endpoint(&endpoints.fortune)?),
        TaskDefinition::new("beta_feature", 1, target.endpoint(&endpoints.beta)?)
            .with_tag(BETA_TAG)
            .with_gate(config.beta_gate),
        TaskDefinition::new(
            "aggregate_call",
            2,
            target.endpoint(&endpoints.aggregate_path())?,
        ),
    ])
}

/// Build and validate the task set the run will use.
pub fn gateway_traffic(
    target: &Target,
    config: &Config,
) -> Result<TaskSet<Endpoint>, ConfigurationError> {
    let tasks = gateway_tasks(target, config)?;
    TaskSet::excluding_tags(tasks, &config.exclude_tags)
}
