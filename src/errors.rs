/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use thiserror::Error;

/// Problems with the run parameters. A run that fails validation never touches the cluster.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("insufficient number of nodes for test (need minimum 2 schedulable nodes, found {found})")]
    InsufficientNodes { found: usize },

    #[error("{which} node index {index} is out of range ({available} schedulable nodes)")]
    NodeIndexOutOfRange {
        which: &'static str,
        index: usize,
        available: usize,
    },

    #[error("primary node index should be different than secondary node index (both are {0})")]
    SameNodeIndex(usize),

    #[error("iteration count must be at least 1")]
    NoIterations,

    #[error("test range is empty: testFrom ({from}) is greater than testTo ({to})")]
    EmptyTestRange { from: u32, to: u32 },
}

/// Conditions that abort a benchmark run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to provision {what}")]
    Provisioning {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist results to {path}")]
    Persist {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to retrieve {remote} from pod {pod}")]
    Retrieval {
        pod: String,
        remote: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("timed out waiting for {stage} after {attempts} attempts")]
    Timeout { stage: &'static str, attempts: u32 },

    #[error("interrupted")]
    Interrupted,
}

impl RunError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, RunError::Interrupted)
    }
}

/// Renders an error followed by each of its sources, `outer: inner: root`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    std::iter::successors(Some(err), |e| e.source())
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
