/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Drives a benchmark run through its iterations.
//!
//! Each iteration walks the same sequence of states:
//!
//! ```text
//! Cleaning -> Provisioning -> AwaitingCoordinator -> AwaitingTabularResult
//!          -> AwaitingStructuredResult -> RetrievingArtifact -> IterationDone
//! ```
//!
//! After the last iteration, a fatal error or an interrupt, the controller enters `Cleanup` and
//! removes everything in the namespace. That final pass happens exactly once per run no matter
//! how the run ended.

use crate::{
    artifact::{self, ResultPaths, ResultStore},
    cleanup::{cleanup_namespace, CleanupReport},
    cluster::ClusterClient,
    completion::CompletionPoller,
    config::RunConfig,
    errors::{error_chain, RunError},
    execution_modes::interrupt::INTERRUPTED_EXIT_CODE,
    polling::{interruptible, sleep_or_cancel},
    provisioner::Provisioner,
    readiness::locate_coordinator,
};
use chrono::Utc;
use colored::Colorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Cleaning,
    Provisioning,
    AwaitingCoordinator,
    AwaitingTabularResult,
    AwaitingStructuredResult,
    RetrievingArtifact,
    IterationDone,
    Cleanup,
}

/// Results of a single successful iteration.
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub iteration: u32,
    pub coordinator: String,
    pub paths: ResultPaths,
    pub json_bytes: u64,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed(RunError),
    Interrupted,
}
impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Failed(_) => 1,
            RunOutcome::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub iterations: Vec<IterationResult>,
    pub outcome: RunOutcome,
    /// Every state the controller entered, in order.
    pub states: Vec<RunState>,
    /// `None` when the final cleanup pass itself failed.
    pub cleanup: Option<CleanupReport>,
}
impl RunReport {
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}

pub struct RunController {
    client: Arc<dyn ClusterClient>,
    config: Arc<RunConfig>,
    token: CancellationToken,
    store: ResultStore,
    state: RunState,
    states: Vec<RunState>,
}

impl RunController {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        config: Arc<RunConfig>,
        token: CancellationToken,
    ) -> Self {
        let store = ResultStore::new(&config.results_dir, &config.namespace, &config.tag);
        Self {
            client,
            config,
            token,
            store,
            state: RunState::Idle,
            states: vec![RunState::Idle],
        }
    }

    /// Runs every iteration, then cleans up the namespace once.
    pub async fn run(mut self) -> RunReport {
        let mut iterations = vec![];
        let res = self.run_iterations(&mut iterations).await;

        self.enter(RunState::Cleanup);
        println!("> {}", "cleaning up services and pods".yellow());
        let cleanup = match cleanup_namespace(self.client.as_ref(), &self.config.namespace).await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!("Final cleanup failed: {:#}", err);
                None
            }
        };

        // an interrupt during the final cleanup still counts as an interrupted run
        let interrupted = self.token.is_cancelled();
        let outcome = match res {
            Ok(()) if interrupted => RunOutcome::Interrupted,
            Ok(()) => RunOutcome::Completed,
            Err(err) if err.is_interrupt() => RunOutcome::Interrupted,
            Err(err) => {
                error!(
                    "Run aborted in state {:?}: {}",
                    self.last_active_state(),
                    error_chain(&err)
                );
                if interrupted {
                    RunOutcome::Interrupted
                } else {
                    RunOutcome::Failed(err)
                }
            }
        };

        RunReport {
            iterations,
            outcome,
            states: self.states,
            cleanup,
        }
    }

    async fn run_iterations(
        &mut self,
        completed: &mut Vec<IterationResult>,
    ) -> Result<(), RunError> {
        let client = self.client.clone();
        let config = self.config.clone();
        let token = self.token.clone();
        let settings = &config.settings;

        for iteration in 1..=config.iterations {
            println!(
                "> {}",
                format!("netperf iteration {}/{}", iteration, config.iterations).green()
            );

            self.transition(RunState::Cleaning)?;
            let entry_cleanup = interruptible(&token, async {
                Ok(cleanup_namespace(client.as_ref(), &config.namespace).await)
            })
            .await?;
            if let Err(err) = entry_cleanup {
                warn!("Cleanup before iteration {} failed, continuing: {:#}", iteration, err);
            }

            self.transition(RunState::Provisioning)?;
            let provisioner = Provisioner::new(client.clone(), config.clone(), token.clone());
            provisioner.create_services().await?;
            sleep_or_cancel(&token, settings.provisioning.service_settle()).await?;
            provisioner.create_pods().await?;

            self.transition(RunState::AwaitingCoordinator)?;
            let coordinator = locate_coordinator(
                client.as_ref(),
                &config.namespace,
                settings.coordinator_policy(),
                &token,
            )
            .await?;

            self.transition(RunState::AwaitingTabularResult)?;
            let poller =
                CompletionPoller::new(client.as_ref(), &config.namespace, &coordinator, &token);
            let csv = poller.poll_for_tabular_result(settings.tabular_policy()).await?;
            let paths = self.store.next_paths(Utc::now());
            self.store.write_tabular(&paths, &csv)?;

            self.transition(RunState::AwaitingStructuredResult)?;
            poller
                .poll_for_structured_result(settings.structured_policy())
                .await?;

            self.transition(RunState::RetrievingArtifact)?;
            let json_bytes = interruptible(
                &token,
                artifact::retrieve(
                    client.as_ref(),
                    &config.namespace,
                    &coordinator,
                    &settings.artifact.remote_json_path,
                    &paths.json,
                ),
            )
            .await?;

            self.transition(RunState::IterationDone)?;
            info!(
                "TEST RUN (Iteration {}) FINISHED - results in {}",
                iteration,
                self.store.directory().display()
            );
            completed.push(IterationResult {
                iteration,
                coordinator,
                paths,
                json_bytes,
            });
        }

        Ok(())
    }

    /// Moves to `next` unless the run has been interrupted.
    fn transition(&mut self, next: RunState) -> Result<(), RunError> {
        if self.token.is_cancelled() {
            return Err(RunError::Interrupted);
        }
        self.enter(next);
        Ok(())
    }

    fn enter(&mut self, next: RunState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        self.states.push(next);
    }

    fn last_active_state(&self) -> RunState {
        self.states
            .iter()
            .rev()
            .find(|state| **state != RunState::Cleanup)
            .copied()
            .unwrap_or(RunState::Idle)
    }
}
