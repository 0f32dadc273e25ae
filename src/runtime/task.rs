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

//! Per-module task slots (spec §4.5). A task may be attached to exactly
//! one TC at a time.

pub const MAX_TASKS_PER_MODULE: u32 = 32;

/// A single task slot. `None` means the module never declared this slot;
/// `Some(Task)` means the slot exists (declared by the module's driver at
/// construction time) whether or not it is currently attached.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub attached_tc: Option<String>,
}

impl Task {
    pub fn is_attached(&self) -> bool {
        self.attached_tc.is_some()
    }
}
