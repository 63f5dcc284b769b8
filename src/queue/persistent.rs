// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Durable implementation of [`Queue`], backed by `atomic_store`.
//!
//! Every `add`/`close` appends a snapshot of the task plus its entry
//! state to an [`AppendLog`]; on load, the log is replayed to
//! reconstruct both the unacked set and its FIFO order. An outstanding
//! lease that never reaches `close` (process crash) simply never gets a
//! new log entry, so the task reappears head-of-queue on restart with
//! its last durably-recorded content -- equivalent to a nack.

use super::{close_action, CloseAction, Lease, Queue, QueueError};
use crate::task::Task;
use async_std::sync::Mutex;
use async_trait::async_trait;
use atomic_store::{load_store::BincodeLoadStore, AppendLog, AtomicStore, AtomicStoreLoader};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
enum EntryState {
    Unacked,
    Acked,
    AckFailed,
}

type QueueRecord = (Task, EntryState);

struct Index {
    /// Current content of every task still unacked, keyed by id.
    tasks: HashMap<u128, Task>,
    /// FIFO order of unacked ids. Only `add` pushes a new id; `nack`
    /// (re-recording the same id as `Unacked`) never changes position.
    order: VecDeque<u128>,
}

pub struct PersistentQueue {
    store: Mutex<AtomicStore>,
    log: Mutex<AppendLog<BincodeLoadStore<QueueRecord>>>,
    index: Mutex<Index>,
}

impl PersistentQueue {
    /// Open the store at `path`, creating it if this is the first run.
    pub fn open(path: &Path) -> Result<Self, QueueError> {
        match Self::load(path) {
            Ok(queue) => Ok(queue),
            Err(_) => Self::create(path),
        }
    }

    pub fn create(path: &Path) -> Result<Self, QueueError> {
        let mut loader = AtomicStoreLoader::create(path, "signing_shim_queue")
            .map_err(|err| QueueError::WriteFailed {
                msg: err.to_string(),
            })?;
        let log = AppendLog::create(&mut loader, Default::default(), "requests", 1024)
            .map_err(|err| QueueError::WriteFailed {
                msg: err.to_string(),
            })?;
        let store = AtomicStore::open(loader).map_err(|err| QueueError::WriteFailed {
            msg: err.to_string(),
        })?;
        Ok(Self {
            store: Mutex::new(store),
            log: Mutex::new(log),
            index: Mutex::new(Index {
                tasks: HashMap::new(),
                order: VecDeque::new(),
            }),
        })
    }

    pub fn load(path: &Path) -> Result<Self, QueueError> {
        let mut loader = AtomicStoreLoader::load(path, "signing_shim_queue")
            .map_err(|err| QueueError::WriteFailed {
                msg: err.to_string(),
            })?;
        let log: AppendLog<BincodeLoadStore<QueueRecord>> =
            AppendLog::load(&mut loader, Default::default(), "requests", 1024).map_err(|err| {
                QueueError::WriteFailed {
                    msg: err.to_string(),
                }
            })?;
        let store = AtomicStore::open(loader).map_err(|err| QueueError::WriteFailed {
            msg: err.to_string(),
        })?;

        let mut tasks = HashMap::new();
        let mut seen = std::collections::HashSet::new();
        let mut order = Vec::new();
        let entries: Vec<QueueRecord> = log
            .iter()
            .collect::<Result<_, _>>()
            .map_err(|err| QueueError::WriteFailed {
                msg: err.to_string(),
            })?;
        for (task, state) in entries {
            if seen.insert(task.id) {
                // First time this id appears anywhere in the log: this is
                // its position in enqueue order, regardless of how many
                // times it is later re-recorded by a nack.
                order.push(task.id);
            }
            match state {
                EntryState::Unacked => {
                    tasks.insert(task.id, task);
                }
                EntryState::Acked | EntryState::AckFailed => {
                    tasks.remove(&task.id);
                }
            }
        }
        let order: VecDeque<u128> = order.into_iter().filter(|id| tasks.contains_key(id)).collect();

        Ok(Self {
            store: Mutex::new(store),
            log: Mutex::new(log),
            index: Mutex::new(Index { tasks, order }),
        })
    }

    async fn record(&self, record: QueueRecord) -> Result<(), QueueError> {
        let mut log = self.log.lock().await;
        log.store_resource(&record)
            .map_err(|err| QueueError::WriteFailed {
                msg: err.to_string(),
            })?;
        log.commit_version().map_err(|err| QueueError::WriteFailed {
            msg: err.to_string(),
        })?;
        self.store
            .lock()
            .await
            .commit_version()
            .map_err(|err| QueueError::WriteFailed {
                msg: err.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl Queue for PersistentQueue {
    async fn add(&self, task: Task) -> Result<(), QueueError> {
        self.record((task.clone(), EntryState::Unacked)).await?;
        let mut index = self.index.lock().await;
        index.order.push_back(task.id);
        index.tasks.insert(task.id, task);
        Ok(())
    }

    async fn lease(&self) -> Lease {
        let index = self.index.lock().await;
        match index.order.front() {
            Some(id) => match index.tasks.get(id) {
                Some(task) => Lease::Active(task.clone()),
                None => Lease::Empty,
            },
            None => Lease::Empty,
        }
    }

    async fn close(&self, lease: Lease) -> Result<(), QueueError> {
        let task = match lease {
            Lease::Active(task) => task,
            Lease::Empty => return Ok(()),
        };
        match close_action(task.status) {
            CloseAction::Ack => {
                self.record((task.clone(), EntryState::Acked)).await?;
                let mut index = self.index.lock().await;
                index.order.pop_front();
                index.tasks.remove(&task.id);
            }
            CloseAction::AckFailed => {
                self.record((task.clone(), EntryState::AckFailed)).await?;
                let mut index = self.index.lock().await;
                index.order.pop_front();
                index.tasks.remove(&task.id);
            }
            CloseAction::Nack => {
                self.record((task.clone(), EntryState::Unacked)).await?;
                let mut index = self.index.lock().await;
                index.tasks.insert(task.id, task);
                // `order` is untouched: the task's position never moves.
            }
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.index.lock().await.order.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::task::TaskStatus;
    use tempdir::TempDir;

    fn task(id: u128) -> Task {
        Task::new(b"msg".to_vec(), String::new(), id)
    }

    #[async_std::test]
    async fn fifo_and_ack_decrements_len() {
        let dir = TempDir::new("persistent_queue").unwrap();
        let queue = PersistentQueue::create(dir.path()).unwrap();
        queue.add(task(1)).await.unwrap();
        queue.add(task(2)).await.unwrap();
        assert_eq!(queue.len().await, 2);

        let mut lease = queue.lease().await;
        assert_eq!(lease.task().unwrap().id, 1);
        lease.task_mut().unwrap().mark_done(b"sig").unwrap();
        queue.close(lease).await.unwrap();
        assert_eq!(queue.len().await, 1);

        let lease = queue.lease().await;
        assert_eq!(lease.task().unwrap().id, 2);
    }

    #[async_std::test]
    async fn nack_preserves_position_and_mutation() {
        let dir = TempDir::new("persistent_queue").unwrap();
        let queue = PersistentQueue::create(dir.path()).unwrap();
        queue.add(task(1)).await.unwrap();

        let mut lease = queue.lease().await;
        lease.task_mut().unwrap().inc_retries();
        assert_eq!(lease.task().unwrap().status, TaskStatus::Pending);
        queue.close(lease).await.unwrap();

        assert_eq!(queue.len().await, 1);
        let lease = queue.lease().await;
        assert_eq!(lease.task().unwrap().num_retries, 1);
    }

    #[async_std::test]
    async fn crash_restart_replays_unacked_tasks_with_latest_content() {
        let dir = TempDir::new("persistent_queue").unwrap();
        {
            let queue = PersistentQueue::create(dir.path()).unwrap();
            queue.add(task(1)).await.unwrap();
            queue.add(task(2)).await.unwrap();
            let mut lease = queue.lease().await;
            lease.task_mut().unwrap().inc_retries();
            queue.close(lease).await.unwrap();
            // Simulate a crash: queue is dropped without acking task 2.
        }

        let reopened = PersistentQueue::load(dir.path()).unwrap();
        assert_eq!(reopened.len().await, 2);
        let lease = reopened.lease().await;
        let head = lease.task().unwrap();
        assert_eq!(head.id, 1);
        assert_eq!(head.num_retries, 1);
    }

    #[async_std::test]
    async fn ack_failed_is_not_replayed_after_restart() {
        let dir = TempDir::new("persistent_queue").unwrap();
        {
            let queue = PersistentQueue::create(dir.path()).unwrap();
            queue.add(task(1)).await.unwrap();
            let mut lease = queue.lease().await;
            lease.task_mut().unwrap().mark_failed().unwrap();
            queue.close(lease).await.unwrap();
        }
        let reopened = PersistentQueue::load(dir.path()).unwrap();
        assert_eq!(reopened.len().await, 0);
    }
}
