mod common;

use common::{fast_settings, parameters, scratch_dir, FakeCluster, Op};
use netperf_launcher::{
    cluster::ResourceKind, execution_modes::ExecutionMode, launch, INVALID_PARAMETERS_EXIT_CODE,
};
use std::{fs, sync::Arc};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn benchmark_mode_runs_and_reports_success() -> anyhow::Result<()> {
    let results_dir = scratch_dir();
    let cluster = Arc::new(FakeCluster::new(2));

    let code = launch(
        cluster.clone(),
        ExecutionMode::Benchmark(parameters(1, &results_dir)),
        fast_settings(),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(code, 0);
    assert!(results_dir.join("results_netperf-latest").is_dir());
    assert!(cluster.is_empty());

    fs::remove_dir_all(results_dir)?;
    Ok(())
}

#[tokio::test]
async fn same_node_for_both_roles_is_rejected_before_provisioning() -> anyhow::Result<()> {
    let results_dir = scratch_dir();
    let cluster = Arc::new(FakeCluster::new(3));
    let mut params = parameters(1, &results_dir);
    params.secondary_index = 0;

    let code = launch(
        cluster.clone(),
        ExecutionMode::Benchmark(params),
        fast_settings(),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(code, INVALID_PARAMETERS_EXIT_CODE);
    assert_eq!(cluster.created(), 0);
    assert_eq!(cluster.calls(Op::EnsureNamespace), 0);
    assert!(!results_dir.exists());
    Ok(())
}

#[tokio::test]
async fn unschedulable_nodes_do_not_count() -> anyhow::Result<()> {
    let results_dir = scratch_dir();
    let cluster = Arc::new(FakeCluster::new(1).with_unschedulable("control-plane"));

    let code = launch(
        cluster.clone(),
        ExecutionMode::Benchmark(parameters(1, &results_dir)),
        fast_settings(),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(code, INVALID_PARAMETERS_EXIT_CODE);
    assert_eq!(cluster.created(), 0);
    Ok(())
}

#[tokio::test]
async fn out_of_range_node_index_is_rejected() -> anyhow::Result<()> {
    let results_dir = scratch_dir();
    let cluster = Arc::new(FakeCluster::new(2));
    let mut params = parameters(1, &results_dir);
    params.secondary_index = 2;

    let code = launch(
        cluster.clone(),
        ExecutionMode::Benchmark(params),
        fast_settings(),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(code, INVALID_PARAMETERS_EXIT_CODE);
    assert_eq!(cluster.created(), 0);
    Ok(())
}

#[tokio::test]
async fn interrupted_run_exits_with_130() -> anyhow::Result<()> {
    let results_dir = scratch_dir();
    let token = CancellationToken::new();
    let cluster = Arc::new(FakeCluster::new(2).cancel_on(Op::PodLogs, 1, token.clone()));

    let code = launch(
        cluster.clone(),
        ExecutionMode::Benchmark(parameters(1, &results_dir)),
        fast_settings(),
        token,
    )
    .await?;

    assert_eq!(code, 130);
    assert!(cluster.is_empty());

    if results_dir.exists() {
        fs::remove_dir_all(results_dir)?;
    }
    Ok(())
}

#[tokio::test]
async fn interrupted_cleanup_mode_exits_with_130() -> anyhow::Result<()> {
    let token = CancellationToken::new();
    let cluster = Arc::new(FakeCluster::new(2).cancel_on(
        Op::List(ResourceKind::ReplicationController),
        1,
        token.clone(),
    ));
    cluster.seed(ResourceKind::Pod, "netperf-orch-abc12");

    let code = launch(
        cluster.clone(),
        ExecutionMode::CleanupOnly {
            namespace: "netperf".to_string(),
        },
        fast_settings(),
        token,
    )
    .await?;

    assert_eq!(code, 130);
    assert_eq!(cluster.passes_after_cancel(), 0);
    Ok(())
}

#[tokio::test]
async fn cleanup_mode_only_deletes() -> anyhow::Result<()> {
    let cluster = Arc::new(FakeCluster::new(2));
    cluster.seed(ResourceKind::ReplicationController, "netperf-orch");
    cluster.seed(ResourceKind::Pod, "netperf-orch-abc12");
    cluster.seed(ResourceKind::Service, "netperf-orch");

    let code = launch(
        cluster.clone(),
        ExecutionMode::CleanupOnly {
            namespace: "netperf".to_string(),
        },
        fast_settings(),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(code, 0);
    assert!(cluster.is_empty());
    assert_eq!(cluster.calls(Op::ListNodes), 0);
    assert_eq!(cluster.created(), 0);
    Ok(())
}
