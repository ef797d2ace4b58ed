/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{cluster::ClusterClient, errors::RunError, provisioner::ORCHESTRATOR_NAME};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Local destinations for one iteration's results. Both files share the same stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    pub stamp: String,
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Names and writes result files under `results_<namespace>-<tag>`.
#[derive(Debug)]
pub struct ResultStore {
    directory: PathBuf,
    prefix: String,
    last_stamp: Option<i64>,
}

impl ResultStore {
    pub fn new(results_dir: &Path, namespace: &str, tag: &str) -> Self {
        Self {
            directory: results_dir.join(format!("results_{}-{}", namespace, tag)),
            prefix: format!("{}-{}", namespace, tag),
            last_stamp: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Builds the paths for the next iteration. Stamps have one second resolution, so a stamp
    /// that would repeat the previous one is moved forward to keep file names distinct.
    pub fn next_paths(&mut self, now: DateTime<Utc>) -> ResultPaths {
        let mut secs = now.timestamp();
        if let Some(last) = self.last_stamp {
            if secs <= last {
                secs = last + 1;
            }
        }
        self.last_stamp = Some(secs);

        let stamp = DateTime::<Utc>::from_timestamp(secs, 0)
            .unwrap_or(now)
            .format(TIMESTAMP_FORMAT)
            .to_string();
        let base = format!("{}_{}", self.prefix, stamp);

        ResultPaths {
            csv: self.directory.join(format!("{}.csv", base)),
            json: self.directory.join(format!("{}.json", base)),
            stamp,
        }
    }

    /// Writes the CSV payload. Existing files are never overwritten.
    pub fn write_tabular(&self, paths: &ResultPaths, payload: &str) -> Result<(), RunError> {
        let write = || -> anyhow::Result<()> {
            fs::create_dir_all(&self.directory).context(format!(
                "Error creating directory {}",
                self.directory.display()
            ))?;
            let mut file = File::create_new(&paths.csv)?;
            file.write_all(payload.as_bytes())?;
            file.flush()?;
            Ok(())
        };

        write().map_err(|source| RunError::Persist {
            path: paths.csv.display().to_string(),
            source,
        })?;
        info!(
            "Test concluded - CSV raw data written to {}",
            paths.csv.display()
        );
        Ok(())
    }
}

/// Copies the coordinator's JSON results file to `local_path`.
pub async fn retrieve(
    client: &dyn ClusterClient,
    namespace: &str,
    pod: &str,
    remote_path: &str,
    local_path: &Path,
) -> Result<u64, RunError> {
    let bytes = client
        .copy_from_container(namespace, pod, ORCHESTRATOR_NAME, remote_path, local_path)
        .await
        .map_err(|source| RunError::Retrieval {
            pod: pod.to_string(),
            remote: remote_path.to_string(),
            source,
        })?;

    info!(
        "Copied {} ({} bytes) from {} to {}",
        remote_path,
        bytes,
        pod,
        local_path.display()
    );
    Ok(bytes)
}
