/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod artifact;
pub mod clap_args;
pub mod cleanup;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod errors;
pub mod execution_modes;
pub mod polling;
pub mod provisioner;
pub mod readiness;
pub mod summary;

use anyhow::Context;
use cleanup::cleanup_namespace;
use cluster::ClusterClient;
use colored::Colorize;
use config::{RunConfig, Settings};
use execution_modes::{
    interrupt::INTERRUPTED_EXIT_CODE, run_controller::RunController, ExecutionMode,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit code for runs rejected before anything was created in the cluster.
pub const INVALID_PARAMETERS_EXIT_CODE: u8 = 1;

/// Runs the selected mode against the cluster and returns the process exit code.
///
/// Parameters are validated against the cluster's schedulable nodes before any object is
/// created, so a rejected run leaves the namespace untouched.
///
/// # Arguments
///
/// * client - the cluster to run against
/// * mode - what to do
/// * settings - polling and provisioning timings
/// * token - cancelled when the user interrupts the run
pub async fn launch(
    client: Arc<dyn ClusterClient>,
    mode: ExecutionMode,
    settings: Settings,
    token: CancellationToken,
) -> anyhow::Result<u8> {
    match mode {
        ExecutionMode::CleanupOnly { namespace } => {
            println!("> cleaning up namespace {}", namespace.green());
            let res = cleanup_namespace(client.as_ref(), &namespace).await;
            if token.is_cancelled() {
                if let Err(err) = &res {
                    error!("Cleanup interrupted: {:#}", err);
                }
                warn!("Cleanup of {} was interrupted", namespace);
                return Ok(INTERRUPTED_EXIT_CODE);
            }

            let report = res?;
            info!(
                "Cleanup finished, deleted {} object(s), {} failure(s)",
                report.deleted, report.failed
            );
            Ok(0)
        }

        ExecutionMode::Benchmark(params) => {
            let nodes = client
                .list_nodes()
                .await
                .context("Failed to list cluster nodes")?;

            let config = match RunConfig::validate(params, settings, &nodes) {
                Ok(config) => config,
                Err(err) => {
                    error!("Invalid run parameters: {}", err);
                    return Ok(INVALID_PARAMETERS_EXIT_CODE);
                }
            };
            println!("{}", summary::render_parameters(&config));

            let report = RunController::new(client, Arc::new(config), token)
                .run()
                .await;
            println!("{}", summary::render_report(&report));
            Ok(report.exit_code())
        }
    }
}
