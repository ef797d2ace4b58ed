/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    cluster::{ClusterClient, ResourceKind},
    errors::RunError,
    polling::{poll_until, RetryPolicy},
    provisioner::ORCHESTRATOR_NAME,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Returns the first pod name belonging to the coordinator's replication controller.
pub fn find_orchestrator_pod<'a>(pod_names: &'a [String]) -> Option<&'a str> {
    let prefix = format!("{}-", ORCHESTRATOR_NAME);
    pod_names
        .iter()
        .find(|name| name.contains(&prefix))
        .map(String::as_str)
}

/// Polls the namespace until the coordinator pod exists.
///
/// # Returns
///
/// The coordinator pod name, `RunError::Timeout` if it never shows up within the policy or
/// `RunError::Interrupted` if the run is cancelled while waiting.
pub async fn locate_coordinator(
    client: &dyn ClusterClient,
    namespace: &str,
    policy: RetryPolicy,
    token: &CancellationToken,
) -> Result<String, RunError> {
    let pod = poll_until("coordinator startup", policy, token, || async move {
        let pods = client.list_resources(namespace, ResourceKind::Pod).await?;
        Ok::<_, anyhow::Error>(find_orchestrator_pod(&pods).map(str::to_string))
    })
    .await?;

    info!("Orchestrator pod is {}", pod);
    Ok(pod)
}
