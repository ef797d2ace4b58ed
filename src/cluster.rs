/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod kube_client;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ReplicationController, Service};
use std::{fmt, path::Path};

pub use kube_client::KubeCluster;

/// A cluster machine the benchmark pods can be pinned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub name: String,
    pub schedulable: bool,
}
impl ClusterNode {
    pub fn schedulable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schedulable: true,
        }
    }
}

/// Namespaced object kinds the launcher creates and therefore has to clean up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ReplicationController,
    Pod,
    Service,
}
impl ResourceKind {
    /// Deletion order used by cleanup. Controllers go first so they don't recreate the pods.
    pub const CLEANUP_ORDER: [ResourceKind; 3] = [
        ResourceKind::ReplicationController,
        ResourceKind::Pod,
        ResourceKind::Service,
    ];
}
impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResourceKind::ReplicationController => write!(f, "rc"),
            ResourceKind::Pod => write!(f, "pod"),
            ResourceKind::Service => write!(f, "svc"),
        }
    }
}

/// Everything the launcher needs from the cluster.
///
/// All calls are scoped to a namespace except node listing. Implementations must treat deleting
/// an object that no longer exists as success.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Lists the schedulable nodes of the cluster.
    async fn list_nodes(&self) -> anyhow::Result<Vec<ClusterNode>>;

    /// Creates the namespace unless it already exists.
    async fn ensure_namespace(&self, namespace: &str) -> anyhow::Result<()>;

    async fn create_service(&self, namespace: &str, service: &Service) -> anyhow::Result<()>;

    async fn create_replication_controller(
        &self,
        namespace: &str,
        controller: &ReplicationController,
    ) -> anyhow::Result<()>;

    /// Returns the names of every object of the given kind in the namespace.
    async fn list_resources(&self, namespace: &str, kind: ResourceKind)
        -> anyhow::Result<Vec<String>>;

    async fn delete_resource(
        &self,
        namespace: &str,
        kind: ResourceKind,
        name: &str,
    ) -> anyhow::Result<()>;

    /// Fetches the complete log of a pod, without timestamps.
    async fn pod_logs(&self, namespace: &str, pod: &str) -> anyhow::Result<String>;

    /// Copies a single file out of a running container to the local filesystem.
    ///
    /// # Returns
    ///
    /// The number of bytes written locally
    async fn copy_from_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> anyhow::Result<u64>;
}
