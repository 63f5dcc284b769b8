// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The signing task and its state machine.

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Status of a signing task. PENDING is the only non-terminal state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Success,
    Fail,
}

#[derive(Debug, Snafu)]
pub enum TaskError {
    #[snafu(display("mark_done/mark_failed called on a task in state {:?}, expected PENDING", status))]
    NotPending { status: TaskStatus },
}

/// A signing task as tracked internally by the queue and worker.
///
/// `id` never changes after construction. `num_retries` is
/// monotonically non-decreasing and is dropped from the externally
/// visible [`ExternalTask`] by [`Task::sanitize`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u128,
    pub message: Vec<u8>,
    pub webhook_url: String,
    pub status: TaskStatus,
    /// base64-encoded signature bytes; non-empty iff `status == Success`.
    pub signature: String,
    pub num_retries: u32,
}

/// The externally visible projection of a [`Task`]: everything except
/// `num_retries`, which is an implementation detail of the retry policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalTask {
    pub id: u128,
    pub message: Vec<u8>,
    pub webhook_url: String,
    pub status: TaskStatus,
    pub signature: String,
}

impl Task {
    /// Construct a new PENDING task with zero retries.
    pub fn new(message: Vec<u8>, webhook_url: String, id: u128) -> Self {
        Self {
            id,
            message,
            webhook_url,
            status: TaskStatus::Pending,
            signature: String::new(),
            num_retries: 0,
        }
    }

    pub fn inc_retries(&mut self) {
        self.num_retries += 1;
    }

    /// Transition PENDING -> SUCCESS, recording the base64-encoded signature.
    pub fn mark_done(&mut self, signature_bytes: &[u8]) -> Result<(), TaskError> {
        if self.status != TaskStatus::Pending {
            return Err(TaskError::NotPending {
                status: self.status,
            });
        }
        self.signature = base64::encode(signature_bytes);
        self.status = TaskStatus::Success;
        Ok(())
    }

    /// Transition PENDING -> FAIL.
    pub fn mark_failed(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Pending {
            return Err(TaskError::NotPending {
                status: self.status,
            });
        }
        self.status = TaskStatus::Fail;
        Ok(())
    }

    /// Project this task to its externally visible view, dropping `num_retries`.
    pub fn sanitize(&self) -> ExternalTask {
        ExternalTask {
            id: self.id,
            message: self.message.clone(),
            webhook_url: self.webhook_url.clone(),
            status: self.status,
            signature: self.signature.clone(),
        }
    }
}
