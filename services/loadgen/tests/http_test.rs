mod common;

use common::*;
use loadgen::{scenario, Config, Executor, HttpExecutor, Pacing, Scheduler, SummarySink, Target};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use traffic_model::{ErrorKind, TaskDefinition};
use url::Url;

fn config_for(base: &str, extra: &[(&str, &str)]) -> Config {
    let base = base.to_string();
    let extra: Vec<(String, String)> = extra
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(move |key| {
        if key == "TARGET_HOST" {
            return Some(base.clone());
        }
        extra.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn gateway_run_hits_every_endpoint() {
    let (base, hits) = spawn_gateway().await;
    let config = config_for(
        &base,
        &[
            ("LOADGEN_USERS", "4"),
            ("LOADGEN_THINK_MIN_MS", "1"),
            ("LOADGEN_THINK_MAX_MS", "5"),
            ("LOADGEN_RAMP_UP_MS", "20"),
            ("BETA_GATE_PROBABILITY", "1.0"),
            ("LOADGEN_SEED", "11"),
        ],
    );

    let target = Target::new(config.target_host.clone());
    let tasks = scenario::gateway_traffic(&target, &config).unwrap();
    let summary = Arc::new(SummarySink::new().unwrap());

    let scheduler = Scheduler::new(tasks, HttpExecutor::new(config.request_timeout), summary.clone())
        .with_pacing(Pacing {
            think_time: config.think_time,
            ramp_up: config.ramp_up,
        })
        .with_seed(config.seed);
    let report = scheduler
        .run(config.users, Some(Duration::from_millis(600)), CancellationToken::new())
        .await;

    let summary = summary.summary();
    // Every response the mock served was recorded exactly once
    assert_eq!(summary.requests, hits.total());
    assert_eq!(summary.requests, report.fired());

    for path in ["/", "/fortunes", "/beta-insights", "/service-b/aggregate"] {
        assert!(hits.get(path) > 0, "no traffic reached {}", path);
    }
    assert!(hits.get("/") > hits.get("/beta-insights"));

    // Aggregate calls fail with 502 and are counted, the run carried on
    let aggregate = summary.task("aggregate_call").unwrap();
    assert_eq!(aggregate.failures, aggregate.requests);
    assert_eq!(aggregate.status_codes.get(&502), Some(&aggregate.requests));
    assert_eq!(summary.task("hit_root").unwrap().failures, 0);
    assert_eq!(summary.failures, report.failures());
}

#[tokio::test]
async fn closed_beta_gate_sends_no_beta_traffic() {
    let (base, hits) = spawn_gateway().await;
    let config = config_for(
        &base,
        &[
            ("LOADGEN_THINK_MIN_MS", "1"),
            ("LOADGEN_THINK_MAX_MS", "2"),
            ("LOADGEN_RAMP_UP_MS", "0"),
            ("BETA_GATE_PROBABILITY", "0"),
        ],
    );
    let target = Target::new(config.target_host.clone());
    let summary = Arc::new(SummarySink::new().unwrap());

    let scheduler = Scheduler::new(
        scenario::gateway_traffic(&target, &config).unwrap(),
        HttpExecutor::new(config.request_timeout),
        summary.clone(),
    )
    .with_pacing(Pacing {
        think_time: config.think_time,
        ramp_up: config.ramp_up,
    });
    scheduler
        .run(2, Some(Duration::from_millis(300)), CancellationToken::new())
        .await;

    assert_eq!(hits.get("/beta-insights"), 0);
    let beta = summary.summary();
    let beta = beta.task("beta_feature").unwrap();
    assert_eq!(beta.requests, 0);
    assert!(beta.skipped > 0);
}

#[tokio::test]
async fn slow_endpoint_is_recorded_as_timeout() {
    let (base, _hits) = spawn_gateway().await;
    let target = Target::new(Url::parse(&base).unwrap());
    let task = TaskDefinition::new("slow", 1, target.endpoint("/slow").unwrap());

    let executor = HttpExecutor::new(Duration::from_millis(100));
    let outcome = executor.execute(7, &task).await;

    assert!(!outcome.success);
    assert_eq!(outcome.user_id, 7);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout));
    assert!(outcome.duration_ms < 1000, "took {}ms", outcome.duration_ms);
}

#[tokio::test]
async fn unreachable_host_is_recorded_as_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = Target::new(Url::parse(&format!("http://{}", addr)).unwrap());
    let task = TaskDefinition::new("hit_root", 1, target.endpoint("/").unwrap());
    let outcome = HttpExecutor::new(Duration::from_secs(1)).execute(0, &task).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Connect));
}

#[tokio::test]
async fn non_2xx_is_a_failed_outcome_with_status() {
    let (base, hits) = spawn_gateway().await;
    let target = Target::new(Url::parse(&base).unwrap());
    let task = TaskDefinition::new("missing", 1, target.endpoint("/nope").unwrap());

    let outcome = HttpExecutor::new(Duration::from_secs(1)).execute(0, &task).await;
    assert!(!outcome.success);
    assert_eq!(outcome.status_code(), Some(404));
    assert_eq!(hits.get("/nope"), 1);
}
