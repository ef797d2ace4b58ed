/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::config::{RunParameters, TestRange};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Runs the netperf benchmark suite between two Kubernetes nodes", long_about = None)]
pub struct Args {
    /// Number of iterations to run
    #[arg(long, default_value_t = 1)]
    pub iterations: u32,

    /// Run the benchmark pods with host networking
    #[arg(long = "hostnetworking", alias = "hostNetworking")]
    pub host_networking: bool,

    /// Suffix for the results directory and file names
    #[arg(long, default_value = "latest")]
    pub tag: String,

    /// Benchmark image
    #[arg(long, default_value = "sebymiano/netperf-latest")]
    pub image: String,

    /// Namespace the benchmark runs in
    #[arg(long, default_value = "netperf")]
    pub namespace: String,

    /// Path to the kubeconfig file, falls back to the in-cluster configuration if missing
    #[arg(long, alias = "kubeConfig")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Index of the primary node in the schedulable node list
    #[arg(long, default_value_t = 0)]
    pub node1: usize,

    /// Index of the secondary node in the schedulable node list
    #[arg(long, default_value_t = 1)]
    pub node2: usize,

    /// Only delete leftover benchmark objects from the namespace
    #[arg(long)]
    pub cleanup: bool,

    /// First test case to run
    #[arg(long = "test-from", alias = "testFrom", default_value_t = 0)]
    pub test_from: u32,

    /// Last test case to run
    #[arg(long = "test-to", alias = "testTo", default_value_t = 11)]
    pub test_to: u32,

    /// Minimum message size
    #[arg(long = "msg-size-min", alias = "msgSizeMin", default_value_t = 1)]
    pub msg_size_min: u32,

    /// Minimum MSS
    #[arg(long = "mss-size-min", alias = "mssSizeMin", default_value_t = 96)]
    pub mss_size_min: u32,

    /// Directory the results directory is created in
    #[arg(long = "results-dir", alias = "resultsDir", default_value = ".")]
    pub results_dir: PathBuf,

    /// TOML file with polling and provisioning settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose mode (-v, --verbose)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Kubeconfig to load, `$HOME/.kube/config` unless given explicitly.
    pub fn kubeconfig_path(&self) -> PathBuf {
        self.kubeconfig.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(".kube")
                .join("config")
        })
    }

    pub fn run_parameters(&self) -> RunParameters {
        RunParameters {
            iterations: self.iterations,
            image: self.image.clone(),
            namespace: self.namespace.clone(),
            tag: self.tag.clone(),
            primary_index: self.node1,
            secondary_index: self.node2,
            host_networking: self.host_networking,
            test_range: TestRange {
                test_from: self.test_from,
                test_to: self.test_to,
                msg_size_min: self.msg_size_min,
                mss_size_min: self.mss_size_min,
            },
            results_dir: self.results_dir.clone(),
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
