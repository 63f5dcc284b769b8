// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The queue worker: lease the head task, attempt dispatch, update its
//! status, close the lease, and notify on success. Runs until told to
//! stop, checked only at loop boundaries so an outstanding lease always
//! gets to close before the task exits.

use crate::dispatcher::{Dispatcher, Outcome};
use crate::queue::Queue;
use crate::webhook;
use async_std::channel::Receiver;
use std::sync::Arc;

pub struct WorkerOptions {
    pub max_retries: u32,
    pub notify_on_failure: bool,
}

/// Drive `queue` against `dispatcher` until a value arrives on `stop`.
/// Exits after the current iteration's lease has been closed, never
/// mid-lease.
pub async fn run(
    queue: Arc<dyn Queue>,
    dispatcher: Arc<Dispatcher>,
    options: WorkerOptions,
    stop: Receiver<()>,
) {
    loop {
        if stop.try_recv().is_ok() {
            tracing::info!("worker received stop signal, exiting");
            return;
        }

        let mut lease = queue.lease().await;
        if let Some(task) = lease.task_mut() {
            let (outcome, response) = dispatcher.call(&task.message).await;
            match outcome {
                Outcome::Ack => {
                    let response = response.expect("Ack outcome always carries a response");
                    if response.status == 200 {
                        if let Err(err) = task.mark_done(&response.body) {
                            tracing::error!(id = task.id, %err, "worker tried to mark a non-pending task done");
                        } else {
                            tracing::info!(id = task.id, "task signed");
                            webhook::notify(&task.sanitize()).await;
                        }
                    } else {
                        task.inc_retries();
                        tracing::warn!(
                            id = task.id,
                            status = response.status,
                            retries = task.num_retries,
                            "upstream rejected task"
                        );
                        if task.num_retries >= options.max_retries {
                            tracing::error!(
                                id = task.id,
                                retries = task.num_retries,
                                "task exceeded max retries, giving up"
                            );
                            if let Err(err) = task.mark_failed() {
                                tracing::error!(id = task.id, %err, "worker tried to fail an already-terminal task");
                            } else if options.notify_on_failure {
                                webhook::notify(&task.sanitize()).await;
                            }
                        }
                    }
                }
                Outcome::Busy => {
                    // Leave the task pending; it stays at the head and is
                    // retried next cycle without counting against
                    // `max_retries` (rate limiting is not the task's fault).
                }
            }
        }

        if let Err(err) = queue.close(lease).await {
            tracing::error!(%err, "failed to close queue lease");
        }
        async_std::task::sleep(dispatcher.time_step()).await;
    }
}
