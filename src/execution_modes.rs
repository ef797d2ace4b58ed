/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod interrupt;
pub mod run_controller;

use crate::config::RunParameters;

#[derive(Debug)]
pub enum ExecutionMode {
    /// Provision the topology and collect results for every iteration.
    Benchmark(RunParameters),

    /// Only remove leftover benchmark objects from the namespace.
    CleanupOnly { namespace: String },
}
