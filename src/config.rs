/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{cluster::ClusterNode, errors::ConfigError, polling::RetryPolicy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, io::Read, path::PathBuf, time::Duration};

pub const DEFAULT_REMOTE_JSON_PATH: &str = "/tmp/results.json";

// ******** ******** ********
// **   TIMING SETTINGS    **
// ******** ******** ********
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub polling: PollingSettings,
    pub provisioning: ProvisioningSettings,
    pub artifact: ArtifactSettings,
}
impl Settings {
    pub fn try_from_path(path: &std::path::Path) -> anyhow::Result<Settings> {
        let mut settings_str = String::new();
        fs::File::open(path)
            .context(format!("Unable to open settings file {}", path.display()))?
            .read_to_string(&mut settings_str)?;
        Settings::try_from_str(&settings_str)
    }

    pub fn try_from_str(settings_str: &str) -> anyhow::Result<Settings> {
        toml::from_str::<Settings>(settings_str)
            .map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))
    }

    pub fn coordinator_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.polling.interval(),
            self.polling.coordinator_max_attempts,
        )
    }

    pub fn tabular_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.polling.interval(), self.polling.tabular_max_attempts)
    }

    pub fn structured_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.polling.interval(),
            self.polling.structured_max_attempts,
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    /// Sub-second interval used instead of `interval_secs` when set. Mostly useful for tests.
    pub interval_millis: Option<u64>,
    pub coordinator_max_attempts: u32,
    pub tabular_max_attempts: u32,
    pub structured_max_attempts: u32,
}
impl PollingSettings {
    pub fn interval(&self) -> Duration {
        match self.interval_millis {
            Some(millis) => Duration::from_millis(millis),
            None => Duration::from_secs(self.interval_secs),
        }
    }
}
impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            interval_millis: None,
            coordinator_max_attempts: 15,
            tabular_max_attempts: 240,
            structured_max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub worker_spawn_delay_secs: u64,
    pub service_settle_secs: u64,
}
impl ProvisioningSettings {
    pub fn worker_spawn_delay(&self) -> Duration {
        Duration::from_secs(self.worker_spawn_delay_secs)
    }

    pub fn service_settle(&self) -> Duration {
        Duration::from_secs(self.service_settle_secs)
    }
}
impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            worker_spawn_delay_secs: 3,
            service_settle_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ArtifactSettings {
    pub remote_json_path: String,
}
impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            remote_json_path: DEFAULT_REMOTE_JSON_PATH.to_string(),
        }
    }
}

// ******** ******** ********
// **    RUN PARAMETERS    **
// ******** ******** ********

/// Arguments passed through verbatim to the coordinator process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestRange {
    pub test_from: u32,
    pub test_to: u32,
    pub msg_size_min: u32,
    pub mss_size_min: u32,
}

/// Unvalidated run parameters, as collected from the command line.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub iterations: u32,
    pub image: String,
    pub namespace: String,
    pub tag: String,
    pub primary_index: usize,
    pub secondary_index: usize,
    pub host_networking: bool,
    pub test_range: TestRange,
    pub results_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePair {
    pub primary: ClusterNode,
    pub secondary: ClusterNode,
}

/// Validated, immutable configuration for a whole run. Shared between components behind an
/// `Arc` and never mutated once built.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub iterations: u32,
    pub image: String,
    pub namespace: String,
    pub tag: String,
    pub nodes: NodePair,
    pub host_networking: bool,
    pub test_range: TestRange,
    pub results_dir: PathBuf,
    pub settings: Settings,
}
impl RunConfig {
    /// Validates the parameters against the schedulable nodes discovered in the cluster.
    ///
    /// # Arguments
    /// * params - parameters from the command line
    /// * settings - timing settings
    /// * nodes - the schedulable nodes, in the order the cluster returned them
    pub fn validate(
        params: RunParameters,
        settings: Settings,
        nodes: &[ClusterNode],
    ) -> Result<RunConfig, ConfigError> {
        if params.iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        if params.test_range.test_from > params.test_range.test_to {
            return Err(ConfigError::EmptyTestRange {
                from: params.test_range.test_from,
                to: params.test_range.test_to,
            });
        }

        let nodes = select_nodes(nodes, params.primary_index, params.secondary_index)?;

        Ok(RunConfig {
            iterations: params.iterations,
            image: params.image,
            namespace: params.namespace,
            tag: params.tag,
            nodes,
            host_networking: params.host_networking,
            test_range: params.test_range,
            results_dir: params.results_dir,
            settings,
        })
    }
}

/// Picks the primary and secondary node by index from the schedulable node list.
pub fn select_nodes(
    nodes: &[ClusterNode],
    primary_index: usize,
    secondary_index: usize,
) -> Result<NodePair, ConfigError> {
    let schedulable = nodes.iter().filter(|node| node.schedulable).collect::<Vec<_>>();
    if schedulable.len() < 2 {
        return Err(ConfigError::InsufficientNodes {
            found: schedulable.len(),
        });
    }

    for (which, index) in [("primary", primary_index), ("secondary", secondary_index)] {
        if index >= schedulable.len() {
            return Err(ConfigError::NodeIndexOutOfRange {
                which,
                index,
                available: schedulable.len(),
            });
        }
    }

    if primary_index == secondary_index {
        return Err(ConfigError::SameNodeIndex(primary_index));
    }

    Ok(NodePair {
        primary: schedulable[primary_index].clone(),
        secondary: schedulable[secondary_index].clone(),
    })
}
