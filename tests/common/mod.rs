#![allow(dead_code)]

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ReplicationController, Service};
use netperf_launcher::{
    cluster::{ClusterClient, ClusterNode, ResourceKind},
    config::{
        ArtifactSettings, PollingSettings, ProvisioningSettings, RunConfig, RunParameters,
        Settings, TestRange,
    },
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

pub const COMPLETE_LOG: &str = "starting tests\n\
GENERATING CSV OUTPUT\n\
MSS,Maximum,96,352,608\n\
1 iperf TCP. Same VM using Pod IP,9210.4,2049.1,5612.0,8817.3\n\
END CSV DATA\n\
writing /tmp/results.json\n\
END JSON DATA\n";

pub const CSV_PAYLOAD: &str = "MSS,Maximum,96,352,608\n\
1 iperf TCP. Same VM using Pod IP,9210.4,2049.1,5612.0,8817.3\n";

pub const JSON_PAYLOAD: &[u8] = br#"{"tests":[{"name":"1 iperf TCP","mbps":9210.4}]}"#;

/// Cluster operations the fake can be told to cancel the run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListNodes,
    EnsureNamespace,
    CreateService,
    CreateController,
    List(ResourceKind),
    Delete,
    PodLogs,
    Copy,
}

#[derive(Default)]
struct State {
    nodes: Vec<ClusterNode>,
    resources: HashMap<ResourceKind, Vec<String>>,
    namespaces: Vec<String>,
    logs: Vec<String>,
    log_failures: u32,
    fail_namespace: bool,
    fail_controller: Option<String>,
    fail_copy: bool,
    fail_list: Option<ResourceKind>,
    fail_delete: Option<String>,
    cancel_on: Option<(Op, usize, CancellationToken)>,
    calls: HashMap<Op, usize>,
    passes_after_cancel: usize,
    created: usize,
}

/// In-memory cluster. Creating a replication controller immediately creates its pod.
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new(node_count: usize) -> Self {
        let state = State {
            nodes: (1..=node_count)
                .map(|i| ClusterNode::schedulable(&format!("node-{}", i)))
                .collect(),
            logs: vec![COMPLETE_LOG.to_string()],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Successive log snapshots of the coordinator. The last one repeats forever.
    pub fn with_logs(self, logs: &[&str]) -> Self {
        self.state.lock().unwrap().logs = logs.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_log_failures(self, count: u32) -> Self {
        self.state.lock().unwrap().log_failures = count;
        self
    }

    pub fn with_unschedulable(self, name: &str) -> Self {
        self.state.lock().unwrap().nodes.push(ClusterNode {
            name: name.to_string(),
            schedulable: false,
        });
        self
    }

    pub fn failing_namespace(self) -> Self {
        self.state.lock().unwrap().fail_namespace = true;
        self
    }

    pub fn failing_controller(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_controller = Some(name.to_string());
        self
    }

    pub fn failing_copy(self) -> Self {
        self.state.lock().unwrap().fail_copy = true;
        self
    }

    pub fn failing_list(self, kind: ResourceKind) -> Self {
        self.state.lock().unwrap().fail_list = Some(kind);
        self
    }

    pub fn failing_delete(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_delete = Some(name.to_string());
        self
    }

    /// Cancels `token` while serving the `nth` call (1-based) of `op`.
    pub fn cancel_on(self, op: Op, nth: usize, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on = Some((op, nth, token));
        self
    }

    pub fn seed(&self, kind: ResourceKind, name: &str) {
        self.state
            .lock()
            .unwrap()
            .resources
            .entry(kind)
            .or_default()
            .push(name.to_string());
    }

    pub fn resources(&self, kind: ResourceKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        ResourceKind::CLEANUP_ORDER
            .iter()
            .all(|kind| self.resources(*kind).is_empty())
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&op)
            .copied()
            .unwrap_or_default()
    }

    /// Number of objects created so far.
    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    /// Cleanup passes started after the run was cancelled. Every pass starts by listing
    /// replication controllers.
    pub fn passes_after_cancel(&self) -> usize {
        self.state.lock().unwrap().passes_after_cancel
    }

    fn record(&self, op: Op) {
        let mut state = self.state.lock().unwrap();
        let cancelled = state
            .cancel_on
            .as_ref()
            .is_some_and(|(_, _, token)| token.is_cancelled());
        if cancelled && op == Op::List(ResourceKind::ReplicationController) {
            state.passes_after_cancel += 1;
        }

        let count = state.calls.entry(op).or_default();
        *count += 1;
        let count = *count;
        if let Some((target, nth, token)) = &state.cancel_on {
            if *target == op && *nth == count {
                token.cancel();
            }
        }
    }

    fn add(&self, kind: ResourceKind, name: String) {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        state.resources.entry(kind).or_default().push(name);
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_nodes(&self) -> anyhow::Result<Vec<ClusterNode>> {
        self.record(Op::ListNodes);
        Ok(self.state.lock().unwrap().nodes.clone())
    }

    async fn ensure_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        self.record(Op::EnsureNamespace);
        let mut state = self.state.lock().unwrap();
        if state.fail_namespace {
            bail!("namespaces is forbidden");
        }
        if !state.namespaces.iter().any(|ns| ns == namespace) {
            state.namespaces.push(namespace.to_string());
        }
        Ok(())
    }

    async fn create_service(&self, _namespace: &str, service: &Service) -> anyhow::Result<()> {
        self.record(Op::CreateService);
        let name = service.metadata.name.clone().unwrap_or_default();
        if self.resources(ResourceKind::Service).contains(&name) {
            bail!("services \"{}\" already exists", name);
        }
        self.add(ResourceKind::Service, name);
        Ok(())
    }

    async fn create_replication_controller(
        &self,
        _namespace: &str,
        controller: &ReplicationController,
    ) -> anyhow::Result<()> {
        self.record(Op::CreateController);
        let name = controller.metadata.name.clone().unwrap_or_default();
        if self.state.lock().unwrap().fail_controller.as_deref() == Some(name.as_str()) {
            bail!("replicationcontrollers \"{}\" is invalid", name);
        }
        let pod = format!("{}-{}", name, nanoid::nanoid!(5, &nanoid::alphabet::SAFE));
        self.add(ResourceKind::ReplicationController, name);
        self.add(ResourceKind::Pod, pod.to_lowercase());
        Ok(())
    }

    async fn list_resources(
        &self,
        _namespace: &str,
        kind: ResourceKind,
    ) -> anyhow::Result<Vec<String>> {
        self.record(Op::List(kind));
        if self.state.lock().unwrap().fail_list == Some(kind) {
            bail!("the server is currently unable to handle the request");
        }
        Ok(self.resources(kind))
    }

    async fn delete_resource(
        &self,
        _namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> anyhow::Result<()> {
        self.record(Op::Delete);
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.as_deref() == Some(name) {
            bail!("{} {} could not be deleted", kind, name);
        }
        if let Some(names) = state.resources.get_mut(&kind) {
            names.retain(|existing| existing != name);
        }
        Ok(())
    }

    async fn pod_logs(&self, _namespace: &str, pod: &str) -> anyhow::Result<String> {
        self.record(Op::PodLogs);
        let mut state = self.state.lock().unwrap();
        if !state
            .resources
            .get(&ResourceKind::Pod)
            .is_some_and(|pods| pods.iter().any(|p| p == pod))
        {
            bail!("pods \"{}\" not found", pod);
        }
        if state.log_failures > 0 {
            state.log_failures -= 1;
            bail!("container \"netperf-orch\" in pod \"{}\" is waiting to start", pod);
        }
        let log = if state.logs.len() > 1 {
            state.logs.remove(0)
        } else {
            state.logs.first().cloned().unwrap_or_default()
        };
        Ok(log)
    }

    async fn copy_from_container(
        &self,
        _namespace: &str,
        pod: &str,
        container: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> anyhow::Result<u64> {
        self.record(Op::Copy);
        if self.state.lock().unwrap().fail_copy {
            return Err(anyhow!(
                "tar: {}: Cannot stat: No such file or directory",
                remote_path
            ));
        }
        if container != "netperf-orch" || !pod.starts_with("netperf-orch-") {
            bail!("unexpected copy from {}/{}", pod, container);
        }
        std::fs::write(local_path, JSON_PAYLOAD)?;
        Ok(JSON_PAYLOAD.len() as u64)
    }
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("netperf-launcher-{}", nanoid::nanoid!(8)))
}

/// Settings that poll every millisecond and never wait between provisioning steps.
pub fn fast_settings() -> Settings {
    Settings {
        polling: PollingSettings {
            interval_secs: 0,
            interval_millis: Some(1),
            coordinator_max_attempts: 5,
            tabular_max_attempts: 5,
            structured_max_attempts: 5,
        },
        provisioning: ProvisioningSettings {
            worker_spawn_delay_secs: 0,
            service_settle_secs: 0,
        },
        artifact: ArtifactSettings::default(),
    }
}

pub fn parameters(iterations: u32, results_dir: &Path) -> RunParameters {
    RunParameters {
        iterations,
        image: "sebymiano/netperf-latest".to_string(),
        namespace: "netperf".to_string(),
        tag: "latest".to_string(),
        primary_index: 0,
        secondary_index: 1,
        host_networking: false,
        test_range: TestRange {
            test_from: 0,
            test_to: 11,
            msg_size_min: 1,
            mss_size_min: 96,
        },
        results_dir: results_dir.to_path_buf(),
    }
}

pub async fn run_config(
    cluster: &FakeCluster,
    iterations: u32,
    results_dir: &Path,
) -> anyhow::Result<RunConfig> {
    let nodes = cluster.list_nodes().await?;
    Ok(RunConfig::validate(
        parameters(iterations, results_dir),
        fast_settings(),
        &nodes,
    )?)
}
