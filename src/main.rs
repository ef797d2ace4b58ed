/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use netperf_launcher::{
    clap_args,
    cluster::KubeCluster,
    config::Settings,
    execution_modes::{interrupt, ExecutionMode},
    launch,
};
use std::{process::ExitCode, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, subscriber::set_global_default, Subscriber};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = clap_args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    init_subscriber(get_subscriber(level.into()));

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: clap_args::Args) -> anyhow::Result<u8> {
    let settings = match &args.config {
        Some(path) => Settings::try_from_path(path)?,
        None => Settings::default(),
    };

    let client = KubeCluster::connect(&args.kubeconfig_path(), args.context.clone()).await?;

    let token = CancellationToken::new();
    interrupt::install(token.clone())?;

    let mode = if args.cleanup {
        ExecutionMode::CleanupOnly {
            namespace: args.namespace.clone(),
        }
    } else {
        ExecutionMode::Benchmark(args.run_parameters())
    };

    launch(Arc::new(client), mode, settings, token).await
}

fn get_subscriber(env_filter: String) -> impl Subscriber + Send + Sync {
    // RUST_LOG takes precedence over the verbosity flag
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .finish()
}

fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    if let Err(err) = set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", err);
    }
}
