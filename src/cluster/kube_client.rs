/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{ClusterClient, ClusterNode, ResourceKind};
use anyhow::{bail, Context};
use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::{Namespace, Node, Pod, ReplicationController, Service},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{
    api::{Api, AttachParams, DeleteParams, ListParams, LogParams, PostParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::{
    fmt::Debug,
    fs::{self, File},
    path::Path,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// `ClusterClient` backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from a kubeconfig file, optionally selecting a context. When the file does
    /// not exist the configuration is inferred (in-cluster service account or `KUBECONFIG`).
    pub async fn connect(kubeconfig: &Path, context: Option<String>) -> anyhow::Result<Self> {
        let config = if kubeconfig.exists() {
            debug!("Loading kubeconfig from {}", kubeconfig.display());
            let kubeconfig = Kubeconfig::read_from(kubeconfig).context(format!(
                "Failed to read kubeconfig {}",
                kubeconfig.display()
            ))?;
            let options = KubeConfigOptions {
                context,
                ..Default::default()
            };
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .context("Failed to build Kubernetes config from kubeconfig")?
        } else {
            debug!(
                "No kubeconfig at {}, inferring configuration",
                kubeconfig.display()
            );
            Config::infer()
                .await
                .context("Failed to infer Kubernetes config")?
        };

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }

    async fn names<K>(api: Api<K>) -> anyhow::Result<Vec<String>>
    where
        K: Resource + Clone + DeserializeOwned + Debug,
    {
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|obj| obj.name_any()).collect())
    }

    async fn delete<K>(api: Api<K>, name: &str, params: &DeleteParams) -> anyhow::Result<()>
    where
        K: Resource + Clone + DeserializeOwned + Debug,
    {
        match api.delete(name, params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!("{} already deleted", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn list_nodes(&self) -> anyhow::Result<Vec<ClusterNode>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default().fields("spec.unschedulable=false"))
            .await
            .context("Failed to fetch nodes")?;

        Ok(nodes
            .items
            .iter()
            .map(|node| ClusterNode {
                name: node.name_any(),
                schedulable: !node
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.unschedulable)
                    .unwrap_or(false),
            })
            .collect())
    }

    async fn ensure_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());

        if api.get_opt(namespace).await?.is_some() {
            debug!("Namespace {} already exists", namespace);
            return Ok(());
        }

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!("Created namespace {}", namespace);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(e).context(format!("Failed to create namespace {}", namespace)),
        }
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> anyhow::Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), service)
            .await
            .context(format!("Failed to create service {}", service.name_any()))?;
        Ok(())
    }

    async fn create_replication_controller(
        &self,
        namespace: &str,
        controller: &ReplicationController,
    ) -> anyhow::Result<()> {
        let api: Api<ReplicationController> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), controller)
            .await
            .context(format!(
                "Failed to create replication controller {}",
                controller.name_any()
            ))?;
        Ok(())
    }

    async fn list_resources(
        &self,
        namespace: &str,
        kind: ResourceKind,
    ) -> anyhow::Result<Vec<String>> {
        let client = self.client.clone();
        let names = match kind {
            ResourceKind::ReplicationController => {
                Self::names(Api::<ReplicationController>::namespaced(client, namespace)).await
            }
            ResourceKind::Pod => Self::names(Api::<Pod>::namespaced(client, namespace)).await,
            ResourceKind::Service => {
                Self::names(Api::<Service>::namespaced(client, namespace)).await
            }
        };
        names.context(format!("Failed to list {} in namespace {}", kind, namespace))
    }

    async fn delete_resource(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> anyhow::Result<()> {
        let client = self.client.clone();
        let res = match kind {
            ResourceKind::ReplicationController => {
                Self::delete(
                    Api::<ReplicationController>::namespaced(client, namespace),
                    name,
                    &DeleteParams::default(),
                )
                .await
            }
            ResourceKind::Pod => {
                // pods are killed immediately, they hold no state worth a graceful shutdown
                let params = DeleteParams {
                    grace_period_seconds: Some(0),
                    ..Default::default()
                };
                Self::delete(Api::<Pod>::namespaced(client, namespace), name, &params).await
            }
            ResourceKind::Service => {
                Self::delete(
                    Api::<Service>::namespaced(client, namespace),
                    name,
                    &DeleteParams::default(),
                )
                .await
            }
        };
        res.context(format!("Failed to delete {} {}", kind, name))
    }

    async fn pod_logs(&self, namespace: &str, pod: &str) -> anyhow::Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.logs(pod, &LogParams::default())
            .await
            .context(format!("Failed to read logs from pod {}", pod))
    }

    async fn copy_from_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> anyhow::Result<u64> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(true);

        // same approach as `kubectl cp`: stream a tarball of the file over an exec session
        let mut attached = api
            .exec(pod, vec!["tar", "cf", "-", remote_path], &params)
            .await
            .context(format!("Failed to exec into pod {}", pod))?;
        let status = attached.take_status();
        let mut stdout = attached
            .stdout()
            .context("Exec session did not provide stdout")?;
        let mut stderr = attached
            .stderr()
            .context("Exec session did not provide stderr")?;

        let mut archive = Vec::new();
        let mut errors = String::new();
        let (out_res, err_res) = tokio::join!(
            stdout.read_to_end(&mut archive),
            stderr.read_to_string(&mut errors)
        );
        out_res.context("Failed to read archive from exec session")?;
        err_res.context("Failed to read stderr from exec session")?;

        if let Some(status) = status {
            if let Some(status) = status.await {
                if status.status.as_deref() == Some("Failure") {
                    bail!(
                        "tar failed in pod {}: {} {}",
                        pod,
                        status.message.unwrap_or_default(),
                        errors.trim()
                    );
                }
            }
        }

        unpack_single_file(&archive, local_path)
    }
}

/// Extracts the first regular file of a tar archive to `local_path`. An existing file at
/// `local_path` is never overwritten.
///
/// # Returns
///
/// The number of bytes written
pub fn unpack_single_file(archive: &[u8], local_path: &Path) -> anyhow::Result<u64> {
    let mut archive = tar::Archive::new(archive);
    for entry in archive.entries().context("Corrupt archive")? {
        let mut entry = entry.context("Corrupt archive entry")?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create_new(local_path)
            .context(format!("Failed to create {}", local_path.display()))?;
        let written = std::io::copy(&mut entry, &mut file)?;
        return Ok(written);
    }

    bail!("Archive did not contain a regular file")
}
