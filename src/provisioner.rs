/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    cluster::ClusterClient,
    config::RunConfig,
    errors::RunError,
    polling::{interruptible, sleep_or_cancel},
};
use k8s_openapi::{
    api::core::v1::{
        Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ReplicationController,
        ReplicationControllerSpec, Service, ServicePort, ServiceSpec,
    },
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use std::{collections::BTreeMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const ORCHESTRATOR_NAME: &str = "netperf-orch";
pub const WORKER_SERVICE_NAME: &str = "netperf-w2";
pub const ORCHESTRATOR_PORT: i32 = 5202;
pub const IPERF3_PORT: i32 = 5201;
pub const QPERF_CONTROL_PORT: i32 = 19766;
pub const QPERF_DATA_PORT: i32 = 19765;
pub const NETPERF_PORT: i32 = 12865;
pub const WORKER_COUNT: usize = 3;

fn app_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

fn service_port(name: &str, protocol: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        protocol: Some(protocol.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        ..Default::default()
    }
}

fn cluster_ip_service(name: &str, ports: Vec<ServicePort>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(app_labels(name)),
            ports: Some(ports),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service pointing at the coordinator pod.
pub fn orchestrator_service() -> Service {
    cluster_ip_service(
        ORCHESTRATOR_NAME,
        vec![service_port(ORCHESTRATOR_NAME, "TCP", ORCHESTRATOR_PORT)],
    )
}

/// Service pointing at worker 2, the target of every measurement. Several tools share the pod so
/// the service carries one port per tool.
pub fn worker_service() -> Service {
    let name = WORKER_SERVICE_NAME;
    cluster_ip_service(
        name,
        vec![
            service_port(name, "TCP", IPERF3_PORT),
            service_port(&format!("{name}-qperf19766"), "TCP", QPERF_CONTROL_PORT),
            service_port(&format!("{name}-qperf19765"), "TCP", QPERF_DATA_PORT),
            service_port(&format!("{name}-udp"), "UDP", IPERF3_PORT),
            service_port(&format!("{name}-netperf"), "TCP", NETPERF_PORT),
        ],
    )
}

fn single_replica_controller(name: &str, pod_spec: PodSpec) -> ReplicationController {
    ReplicationController {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(ReplicationControllerSpec {
            replicas: Some(1),
            selector: Some(app_labels(name)),
            template: Some(PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels(name)),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Replication controller for the coordinator. The test range is handed to the process verbatim.
pub fn orchestrator_controller(config: &RunConfig) -> ReplicationController {
    let range = &config.test_range;
    let container = Container {
        name: ORCHESTRATOR_NAME.to_string(),
        image: Some(config.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: ORCHESTRATOR_PORT,
            ..Default::default()
        }]),
        args: Some(vec![
            "--mode=orchestrator".to_string(),
            format!("--testFrom={}", range.test_from),
            format!("--testTo={}", range.test_to),
            format!("--msgSizeMin={}", range.msg_size_min),
            format!("--mssSizeMin={}", range.mss_size_min),
        ]),
        image_pull_policy: Some("Always".to_string()),
        ..Default::default()
    };

    single_replica_controller(
        ORCHESTRATOR_NAME,
        PodSpec {
            containers: vec![container],
            termination_grace_period_seconds: Some(0),
            ..Default::default()
        },
    )
}

pub fn worker_name(index: usize) -> String {
    format!("netperf-w{}", index)
}

/// Node a worker is pinned to. Workers 1 and 2 share the primary node, worker 3 runs on the
/// secondary node so inter-node traffic can be measured.
pub fn worker_node(config: &RunConfig, index: usize) -> &str {
    if index == WORKER_COUNT {
        &config.nodes.secondary.name
    } else {
        &config.nodes.primary.name
    }
}

/// Replication controller for worker `index` (1-based).
pub fn worker_controller(config: &RunConfig, index: usize) -> ReplicationController {
    let name = worker_name(index);
    let node = worker_node(config, index).to_string();

    // worker 1 only initiates tests, nothing connects to it
    let ports = if index > 1 {
        vec![
            ContainerPort {
                container_port: IPERF3_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
            ContainerPort {
                container_port: IPERF3_PORT,
                protocol: Some("SCTP".to_string()),
                ..Default::default()
            },
        ]
    } else {
        vec![]
    };

    let env: Vec<EnvVar> = [("worker", &name), ("kubeNode", &node), ("podname", &name)]
        .into_iter()
        .map(|(key, value)| EnvVar {
            name: key.to_string(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: name.clone(),
        image: Some(config.image.clone()),
        ports: Some(ports),
        args: Some(vec!["--mode=worker".to_string()]),
        env: Some(env),
        image_pull_policy: Some("Always".to_string()),
        ..Default::default()
    };

    single_replica_controller(
        &name,
        PodSpec {
            node_name: Some(node),
            containers: vec![container],
            termination_grace_period_seconds: Some(0),
            ..Default::default()
        },
    )
}

/// Submits the benchmark topology for one iteration. Nothing is rolled back on failure, the run
/// controller's cleanup removes whatever was created.
pub struct Provisioner {
    client: Arc<dyn ClusterClient>,
    config: Arc<RunConfig>,
    token: CancellationToken,
}

impl Provisioner {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        config: Arc<RunConfig>,
        token: CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            token,
        }
    }

    /// Ensures the namespace exists, then creates the coordinator and worker services.
    pub async fn create_services(&self) -> Result<(), RunError> {
        let namespace = &self.config.namespace;

        // an existing namespace is fine, a failure here surfaces again when creating the services
        if let Err(e) = interruptible(&self.token, async {
            Ok(self.client.ensure_namespace(namespace).await)
        })
        .await?
        {
            error!("Failed to create namespace {}: {:#}", namespace, e);
        }

        for service in [orchestrator_service(), worker_service()] {
            let name = service.metadata.name.clone().unwrap_or_default();
            interruptible(&self.token, async {
                self.client
                    .create_service(namespace, &service)
                    .await
                    .map_err(|source| {
                        error!("Failed to create {} service: {:#}", name, source);
                        RunError::Provisioning {
                            what: "services",
                            source,
                        }
                    })
            })
            .await?;
            info!("Created {} service", name);
        }

        Ok(())
    }

    /// Creates the coordinator, then the workers one at a time with a delay in between so the
    /// scheduler isn't flooded.
    pub async fn create_pods(&self) -> Result<(), RunError> {
        let namespace = &self.config.namespace;

        let mut controllers = vec![orchestrator_controller(&self.config)];
        controllers.extend((1..=WORKER_COUNT).map(|index| worker_controller(&self.config, index)));

        for (position, controller) in controllers.iter().enumerate() {
            if position > 0 {
                sleep_or_cancel(
                    &self.token,
                    self.config.settings.provisioning.worker_spawn_delay(),
                )
                .await?;
            }

            let name = controller.metadata.name.clone().unwrap_or_default();
            info!("Creating replication controller {}", name);
            interruptible(&self.token, async {
                self.client
                    .create_replication_controller(namespace, controller)
                    .await
                    .map_err(|source| {
                        error!("Error creating replication controller {}: {:#}", name, source);
                        RunError::Provisioning {
                            what: "replication controllers",
                            source,
                        }
                    })
            })
            .await?;
        }

        Ok(())
    }
}
