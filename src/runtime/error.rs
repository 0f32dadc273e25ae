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

use thiserror::Error;

/// errno-compatible codes the control service can report. Values match
/// POSIX so that `errno()` lines up with what the original C control
/// plane returned.
pub const EINVAL: i32 = 22;
pub const ENOENT: i32 = 2;
pub const EEXIST: i32 = 17;
pub const EBUSY: i32 = 16;

/// Domain errors raised by the runtime. Never surfaced as a non-OK
/// `tonic::Status` — every RPC handler folds this into the response's
/// `Error{err, errmsg}` field instead (see spec §7).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Busy(String),
    /// A driver-reported negated errno, from module/port construction or
    /// teardown.
    #[error("{message}")]
    Driver { errno: i32, message: String },
}

impl RuntimeError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn driver(errno: i32, msg: impl Into<String>) -> Self {
        Self::Driver {
            errno,
            message: msg.into(),
        }
    }

    pub fn errno(&self) -> i32 {
        match self {
            RuntimeError::Invalid(_) => EINVAL,
            RuntimeError::NotFound(_) => ENOENT,
            RuntimeError::Conflict(_) => EEXIST,
            RuntimeError::Busy(_) => EBUSY,
            RuntimeError::Driver { errno, .. } => *errno,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
