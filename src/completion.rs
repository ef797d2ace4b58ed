/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Detects benchmark completion from the coordinator's log output.
//!
//! The coordinator prints its CSV results between two marker lines and, once the JSON results
//! file has been written inside the container, prints a third marker. Every poll fetches the whole
//! log, which is fine for the few hundred lines a run produces.

use crate::{
    cluster::ClusterClient,
    errors::RunError,
    polling::{poll_until, RetryPolicy},
};
use tokio_util::sync::CancellationToken;

pub const CSV_DATA_MARKER: &str = "GENERATING CSV OUTPUT";
pub const CSV_END_DATA_MARKER: &str = "END CSV DATA";
pub const JSON_END_DATA_MARKER: &str = "END JSON DATA";

/// Extracts the CSV payload from a log snapshot.
///
/// The payload starts one character past the start marker (the line break ending the marker
/// line) and runs up to the end marker. Returns `None` unless both markers are present with the
/// end marker after the start marker.
pub fn extract_tabular(log: &str) -> Option<&str> {
    let start = log.find(CSV_DATA_MARKER)?;
    let rest = &log[start + CSV_DATA_MARKER.len()..];
    let end = rest.find(CSV_END_DATA_MARKER)?;

    let mut payload = rest[..end].chars();
    payload.next();
    Some(payload.as_str())
}

/// True once the coordinator reports the JSON results file as written.
pub fn structured_ready(log: &str) -> bool {
    log.contains(JSON_END_DATA_MARKER)
}

/// Watches the coordinator pod's log for both completion markers.
pub struct CompletionPoller<'a> {
    client: &'a dyn ClusterClient,
    namespace: &'a str,
    pod: &'a str,
    token: &'a CancellationToken,
}

impl<'a> CompletionPoller<'a> {
    pub fn new(
        client: &'a dyn ClusterClient,
        namespace: &'a str,
        pod: &'a str,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            namespace,
            pod,
            token,
        }
    }

    /// Waits for the CSV block and returns its payload.
    pub async fn poll_for_tabular_result(&self, policy: RetryPolicy) -> Result<String, RunError> {
        poll_until("CSV results", policy, self.token, || async move {
            let log = self.client.pod_logs(self.namespace, self.pod).await?;
            Ok::<_, anyhow::Error>(extract_tabular(&log).map(str::to_string))
        })
        .await
    }

    /// Waits until the JSON results file has been written inside the coordinator container.
    pub async fn poll_for_structured_result(&self, policy: RetryPolicy) -> Result<(), RunError> {
        poll_until("JSON results", policy, self.token, || async move {
            let log = self.client.pod_logs(self.namespace, self.pod).await?;
            Ok::<_, anyhow::Error>(structured_ready(&log).then_some(()))
        })
        .await
    }
}
