// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The application context: owns config, dispatcher, queue, and the
//! worker's lifecycle for the process's entire run. Constructed once at
//! startup, torn down once at shutdown.

use crate::config::{QueueType, ShimOptions};
use crate::dispatcher::Dispatcher;
use crate::queue::memory::MemoryQueue;
use crate::queue::persistent::PersistentQueue;
use crate::queue::Queue;
use crate::worker::{self, WorkerOptions};
use async_std::channel::{self, Sender};
use async_std::task::JoinHandle;
use std::sync::Arc;

pub struct ShimContext {
    pub config: ShimOptions,
    pub dispatcher: Arc<Dispatcher>,
    pub queue: Arc<dyn Queue>,
}

impl ShimContext {
    pub fn new(config: ShimOptions) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        let queue: Arc<dyn Queue> = match config.queue_type {
            QueueType::InMemory => Arc::new(MemoryQueue::new()),
            QueueType::Persistent => {
                let path = config.persistent_queue_path()?;
                Arc::new(
                    PersistentQueue::open(&path)
                        .unwrap_or_else(|err| panic!("failed to open persistent queue: {}", err)),
                )
            }
        };
        let dispatcher = Arc::new(Dispatcher::new(
            config.unreliable_service_url.clone(),
            config.api_key.clone(),
            config.max_requests_per_minute,
        ));
        Ok(Self {
            config,
            dispatcher,
            queue,
        })
    }

    /// Spawn the queue worker, returning its handle and a sender that
    /// requests a graceful stop.
    pub fn spawn_worker(self: &Arc<Self>) -> (JoinHandle<()>, Sender<()>) {
        let (stop_tx, stop_rx) = channel::bounded(1);
        let options = WorkerOptions {
            max_retries: self.config.max_task_retries,
            notify_on_failure: self.config.notify_on_failure,
        };
        let queue = self.queue.clone();
        let dispatcher = self.dispatcher.clone();
        let handle = async_std::task::spawn(worker::run(queue, dispatcher, options, stop_rx));
        (handle, stop_tx)
    }
}
