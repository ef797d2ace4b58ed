/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Translates SIGINT/SIGTERM into a cancellation of `token`.
///
/// The first signal only cancels the token, the run controller notices, cleans up and exits. A
/// second signal while cleanup is still running exits the process immediately.
pub fn install(token: CancellationToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if token.is_cancelled() {
            eprintln!("Second interrupt received, exiting without waiting for cleanup");
            std::process::exit(INTERRUPTED_EXIT_CODE as i32);
        }

        warn!("Interrupt received, stopping the run and cleaning up (interrupt again to force exit)");
        token.cancel();
    })
    .context("Error setting Ctrl-C handler")
}
