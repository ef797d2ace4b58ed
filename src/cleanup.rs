/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::cluster::{ClusterClient, ResourceKind};
use anyhow::anyhow;
use colored::Colorize;
use itertools::Itertools;
use tracing::{debug, warn};

/// Outcome of one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}
impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.deleted == 0 && self.failed == 0
    }
}

/// Deletes every replication controller, pod and service in the namespace.
///
/// This is a safety net rather than an undo: it removes whatever is in the namespace, including
/// leftovers from a crashed run. Deleting something that is already gone counts as success, so
/// running it twice in a row is harmless.
///
/// # Returns
///
/// A report of what was deleted, or an error if any of the kinds could not be listed. Failed
/// deletes are logged and counted but do not make the pass fail.
pub async fn cleanup_namespace(
    client: &dyn ClusterClient,
    namespace: &str,
) -> anyhow::Result<CleanupReport> {
    let mut report = CleanupReport::default();
    let mut unlisted = vec![];

    for kind in ResourceKind::CLEANUP_ORDER {
        let names = match client.list_resources(namespace, kind).await {
            Ok(names) => names,
            Err(err) => {
                warn!("Failed to get {} in {}: {:#}", kind, namespace, err);
                unlisted.push(kind);
                continue;
            }
        };

        for name in names {
            println!("> deleting {} {}", kind, name.green());
            match client.delete_resource(namespace, kind, &name).await {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    warn!("Failed to delete {} {}: {:#}", kind, name, err);
                    report.failed += 1;
                }
            }
        }
    }

    if !unlisted.is_empty() {
        return Err(anyhow!(
            "Unable to list {} in namespace {}",
            unlisted.iter().join(", "),
            namespace
        ));
    }

    debug!(
        "Cleanup of {} deleted {} object(s), {} failure(s)",
        namespace, report.deleted, report.failed
    );
    Ok(report)
}
