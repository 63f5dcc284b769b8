// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Volatile, in-process implementation of [`Queue`].
//!
//! Acceptable only because the persistent queue is the intended
//! production configuration: a crash loses anything still in here,
//! including tasks that were already `ack_failed` (see Design Notes).

use super::{close_action, CloseAction, Lease, Queue, QueueError};
use crate::task::Task;
use async_std::sync::Mutex;
use async_trait::async_trait;
use std::collections::VecDeque;

#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn add(&self, task: Task) -> Result<(), QueueError> {
        self.inner.lock().await.push_back(task);
        Ok(())
    }

    async fn lease(&self) -> Lease {
        match self.inner.lock().await.front().cloned() {
            Some(task) => Lease::Active(task),
            None => Lease::Empty,
        }
    }

    async fn close(&self, lease: Lease) -> Result<(), QueueError> {
        let task = match lease {
            Lease::Active(task) => task,
            Lease::Empty => return Ok(()),
        };
        match close_action(task.status) {
            CloseAction::Ack | CloseAction::AckFailed => {
                self.inner.lock().await.pop_front();
            }
            CloseAction::Nack => {
                // Leave the task in place; the head is unchanged because
                // `lease()` only peeked, it never popped.
                let mut guard = self.inner.lock().await;
                if let Some(front) = guard.front_mut() {
                    *front = task;
                }
            }
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::task::TaskStatus;

    fn task(id: u128) -> Task {
        Task::new(b"msg".to_vec(), String::new(), id)
    }

    #[async_std::test]
    async fn fifo_order() {
        let queue = MemoryQueue::new();
        queue.add(task(1)).await.unwrap();
        queue.add(task(2)).await.unwrap();
        let lease = queue.lease().await;
        assert_eq!(lease.task().unwrap().id, 1);
    }

    #[async_std::test]
    async fn nack_leaves_task_at_head() {
        let queue = MemoryQueue::new();
        queue.add(task(1)).await.unwrap();
        queue.add(task(2)).await.unwrap();
        let lease = queue.lease().await;
        queue.close(lease).await.unwrap();
        assert_eq!(queue.len().await, 2);
        let lease = queue.lease().await;
        assert_eq!(lease.task().unwrap().id, 1);
    }

    #[async_std::test]
    async fn ack_removes_head() {
        let queue = MemoryQueue::new();
        queue.add(task(1)).await.unwrap();
        queue.add(task(2)).await.unwrap();
        let mut lease = queue.lease().await;
        lease.task_mut().unwrap().mark_done(b"sig").unwrap();
        queue.close(lease).await.unwrap();
        assert_eq!(queue.len().await, 1);
        let lease = queue.lease().await;
        assert_eq!(lease.task().unwrap().id, 2);
    }

    #[async_std::test]
    async fn ack_failed_removes_head() {
        let queue = MemoryQueue::new();
        queue.add(task(1)).await.unwrap();
        let mut lease = queue.lease().await;
        lease.task_mut().unwrap().mark_failed().unwrap();
        assert_eq!(lease.task().unwrap().status, TaskStatus::Fail);
        queue.close(lease).await.unwrap();
        assert_eq!(queue.len().await, 0);
    }

    #[async_std::test]
    async fn lease_on_empty_queue_is_empty_and_closes_as_noop() {
        let queue = MemoryQueue::new();
        let lease = queue.lease().await;
        assert!(lease.is_empty());
        queue.close(lease).await.unwrap();
        assert_eq!(queue.len().await, 0);
    }
}
