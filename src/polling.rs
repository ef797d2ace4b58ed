/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::errors::RunError;
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed-cadence, bounded retry policy shared by every poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}
impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Sleeps for the given duration unless the token is cancelled first.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> Result<(), RunError> {
    tokio::select! {
        _ = token.cancelled() => Err(RunError::Interrupted),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Drives a future to completion unless the token is cancelled first, in which case the future
/// is dropped and `RunError::Interrupted` is returned.
pub async fn interruptible<T, F>(token: &CancellationToken, fut: F) -> Result<T, RunError>
where
    F: Future<Output = Result<T, RunError>>,
{
    if token.is_cancelled() {
        return Err(RunError::Interrupted);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RunError::Interrupted),
        res = fut => res,
    }
}

/// Calls `probe` until it yields a value, the attempt budget is spent or the run is cancelled.
///
/// A probe returning `Ok(None)` means "not ready yet". A probe returning `Err` is a transient
/// failure: it is logged and retried on the same cadence, it never aborts the poll on its own.
///
/// # Arguments
///
/// * stage - human readable name of what is being waited for, used in logs and errors
/// * policy - poll cadence and attempt budget
/// * token - the run's cancellation token
/// * probe - the check to perform on each attempt
pub async fn poll_until<T, F, Fut>(
    stage: &'static str,
    policy: RetryPolicy,
    token: &CancellationToken,
    mut probe: F,
) -> Result<T, RunError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        match interruptible(token, async { Ok(probe().await) }).await? {
            Ok(Some(value)) => {
                debug!("{} ready after {} attempt(s)", stage, attempt);
                return Ok(value);
            }
            Ok(None) => info!(
                "Waiting for {} (attempt {}/{})",
                stage, attempt, policy.max_attempts
            ),
            Err(err) => warn!(
                "Transient failure while waiting for {} (attempt {}/{}): {:#}",
                stage, attempt, policy.max_attempts, err
            ),
        }

        if attempt < policy.max_attempts {
            sleep_or_cancel(token, policy.interval).await?;
        }
    }

    Err(RunError::Timeout {
        stage,
        attempts: policy.max_attempts,
    })
}
