// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The queue abstraction: a FIFO of [`Task`]s with leased processing.
//!
//! There are two implementations, [`memory::MemoryQueue`] and
//! [`persistent::PersistentQueue`]; both satisfy the same [`Queue`] trait,
//! and the choice between them is a matter of configuration, not code.

pub mod memory;
pub mod persistent;

use crate::task::{Task, TaskStatus};
use async_trait::async_trait;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum QueueError {
    #[snafu(display("failed to write to the durable queue store: {}", msg))]
    WriteFailed { msg: String },
}

/// A scoped handle on the head-of-queue task.
///
/// Rust has no context-manager equivalent, so the lease is an owned value
/// that must be handed back to [`Queue::close`] exactly once. There is no
/// destructor-based auto-nack: a dropped lease without a matching `close`
/// is a programmer error, not part of the crash-safety contract (crash
/// safety is the persistent queue's job, handled on restart instead).
pub enum Lease {
    Active(Task),
    Empty,
}

impl Lease {
    pub fn task(&self) -> Option<&Task> {
        match self {
            Lease::Active(task) => Some(task),
            Lease::Empty => None,
        }
    }

    pub fn task_mut(&mut self) -> Option<&mut Task> {
        match self {
            Lease::Active(task) => Some(task),
            Lease::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Lease::Empty)
    }
}

/// A FIFO of tasks with leased processing. At most one outstanding lease
/// exists at a time, because at most one worker ever calls `lease()`.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Append `task` to the tail. Returns once the task is durably
    /// recorded (persistent variant) or in-memory enqueued.
    async fn add(&self, task: Task) -> Result<(), QueueError>;

    /// Begin a scoped lease on the head task. Never blocks: an empty
    /// queue yields `Lease::Empty`.
    async fn lease(&self) -> Lease;

    /// Close a lease opened by [`Queue::lease`]. The task's `status` at
    /// the time of `close` decides the outcome:
    /// SUCCESS -> ack (remove), FAIL -> ack_failed (remove), PENDING ->
    /// nack (return to head-of-queue, unchanged order).
    async fn close(&self, lease: Lease) -> Result<(), QueueError>;

    /// Number of unacked tasks currently in the queue.
    async fn len(&self) -> usize;
}

/// Shared helper: decide what a lease's close should do, given the final
/// task status. Both queue implementations call this so the ack/nack/
/// ack_failed mapping lives in exactly one place.
pub(crate) fn close_action(status: TaskStatus) -> CloseAction {
    match status {
        TaskStatus::Success => CloseAction::Ack,
        TaskStatus::Fail => CloseAction::AckFailed,
        TaskStatus::Pending => CloseAction::Nack,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseAction {
    Ack,
    AckFailed,
    Nack,
}
