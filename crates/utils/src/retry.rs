// Copyright 2024 FerroStore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::Rng;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// MAX_JITTER randomizes over the full exponential backoff delay.
pub const MAX_JITTER: f64 = 1.0;

/// NO_JITTER disables randomization of the exponential backoff delay.
pub const NO_JITTER: f64 = 0.0;

/// Computes the backoff delay for the given attempt according to
/// https://www.awsarchitectureblog.com/2015/03/backoff.html
fn exponential_backoff_wait(unit: Duration, cap: Duration, jitter: f64, attempt: u32) -> Duration {
    // Normalize jitter to the range [0, 1.0].
    let jitter = jitter.clamp(NO_JITTER, MAX_JITTER);

    let mut sleep = unit.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    if sleep > cap {
        sleep = cap;
    }
    if jitter != NO_JITTER {
        let frac: f64 = rand::rng().random::<f64>() * jitter;
        sleep = sleep.mul_f64(1.0 - frac);
    }
    sleep
}

/// Creates a timer emitting attempt tokens with exponentially increasing
/// delays, capped at `cap`.
///
/// The returned receiver yields the attempt number. Receiving an attempt
/// advances the backoff; a broadcast on `wakeup` resets the backoff to
/// zero so the next attempt is offered immediately; cancelling `cancel`
/// stops the producer and closes the stream.
///
/// Single producer, single consumer. The stream is infinite until
/// cancelled; retry limits are the consumer's policy.
pub fn new_retry_timer(
    unit: Duration,
    cap: Duration,
    jitter: f64,
    mut wakeup: broadcast::Receiver<()>,
    cancel: CancellationToken,
) -> mpsc::Receiver<u32> {
    let (attempt_tx, attempt_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut next_backoff: u32 = 0;
        let mut wakeup_open = true;
        loop {
            let delay;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                res = wakeup.recv(), if wakeup_open => {
                    match res {
                        // Reset to reduce the subsequent wait and re-read
                        // format state immediately.
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            next_backoff = 0;
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            wakeup_open = false;
                            continue;
                        }
                    }
                }
                res = attempt_tx.send(next_backoff) => {
                    if res.is_err() {
                        // Consumer went away.
                        return;
                    }
                    delay = exponential_backoff_wait(unit, cap, jitter, next_backoff);
                    next_backoff += 1;
                }
            }
            tokio::time::sleep(delay).await;
        }
    });

    attempt_rx
}
