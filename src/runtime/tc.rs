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

//! Per-worker hierarchical scheduler tree (spec §4.4). The scheduling
//! algorithm itself is out of scope; this module only guarantees the
//! tree's shape and parameters reach a (simulated) scheduler.

use std::collections::HashMap;

use super::error::{RuntimeError, RuntimeResult};
use super::namespace::{NameKind, Namespace};
use super::worker::WorkerSet;

/// Reserved priority for internally-materialized default TCs. Rejected for
/// any client-supplied TC (spec invariant I5).
pub const DEFAULT_PRIORITY: i32 = i32::MIN;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub schedules: u64,
    pub cycles: u64,
    pub packets: u64,
    pub bits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Schedules,
    Cycles,
    Packets,
    Bits,
}

pub struct Tc {
    pub name: String,
    pub wid: u32,
    pub priority: i32,
    pub share: u32,
    pub share_resource: ResourceKind,
    pub limit: ResourceCounts,
    pub max_burst: ResourceCounts,
    pub parent: Option<String>,
    pub auto_free: bool,
    pub task_count: u32,
    refcount: u32,
    pub usage: ResourceCounts,
}

pub struct TcCreateParams {
    pub name: String,
    pub wid: u32,
    pub priority: i32,
    pub limit: Option<ResourceCounts>,
    pub max_burst: Option<ResourceCounts>,
}

pub struct TcStatus {
    pub name: String,
    pub parent: String,
    pub tasks: u32,
    pub priority: i32,
    pub wid: Option<u32>,
    pub limit: ResourceCounts,
    pub max_burst: ResourceCounts,
}

#[derive(Default)]
pub struct TcTable {
    tcs: HashMap<String, Tc>,
}

impl TcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tc> {
        self.tcs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tc> {
        self.tcs.get_mut(name)
    }

    /// Materializes the internal default TC for a freshly launched worker.
    /// Not reachable through `add_tc` (reserved priority); owned by the
    /// worker, so `auto_free` — `reset_tcs` skips it.
    pub fn install_default(&mut self, namespace: &mut Namespace, wid: u32, name: &str) {
        namespace.insert(name, NameKind::Tc);
        self.tcs.insert(
            name.to_string(),
            Tc {
                name: name.to_string(),
                wid,
                priority: DEFAULT_PRIORITY,
                share: 1,
                share_resource: ResourceKind::Schedules,
                limit: ResourceCounts::default(),
                max_burst: ResourceCounts::default(),
                parent: None,
                auto_free: true,
                task_count: 0,
                refcount: 1,
                usage: ResourceCounts::default(),
            },
        );
    }

    pub fn remove_worker_tcs(&mut self, namespace: &mut Namespace, wid: u32) {
        let names: Vec<String> = self
            .tcs
            .values()
            .filter(|c| c.wid == wid)
            .map(|c| c.name.clone())
            .collect();
        for name in names {
            self.tcs.remove(&name);
            namespace.remove(&name);
        }
    }

    pub fn add_tc(
        &mut self,
        namespace: &mut Namespace,
        workers: &WorkerSet,
        params: TcCreateParams,
    ) -> RuntimeResult<()> {
        if params.name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'name' field"));
        }
        if !Namespace::is_valid_name(&params.name) {
            return Err(RuntimeError::invalid(format!(
                "'{}' is an invalid name",
                params.name
            )));
        }
        if namespace.exists(&params.name) {
            return Err(RuntimeError::invalid(format!(
                "Name '{}' already exists",
                params.name
            )));
        }
        if params.wid >= super::worker::MAX_WORKERS {
            return Err(RuntimeError::invalid(format!(
                "'wid' must be between 0 and {}",
                super::worker::MAX_WORKERS - 1
            )));
        }
        if !workers.is_active(params.wid) {
            return Err(RuntimeError::invalid(format!(
                "worker:{} does not exist",
                params.wid
            )));
        }
        if params.priority == DEFAULT_PRIORITY {
            return Err(RuntimeError::invalid(format!(
                "Priority {DEFAULT_PRIORITY} is reserved"
            )));
        }

        let worker = workers.get(params.wid).expect("checked active above");
        let parent = worker.default_tc.clone();

        namespace.insert(&params.name, NameKind::Tc);
        self.tcs.insert(
            params.name.clone(),
            Tc {
                name: params.name,
                wid: params.wid,
                priority: params.priority,
                share: 1,
                share_resource: ResourceKind::Schedules,
                limit: params.limit.unwrap_or_default(),
                max_burst: params.max_burst.unwrap_or_default(),
                parent: Some(parent),
                auto_free: false,
                task_count: 0,
                refcount: 1,
                usage: ResourceCounts::default(),
            },
        );

        Ok(())
    }

    pub fn list(&self, wid_filter: Option<u32>, workers: &WorkerSet) -> RuntimeResult<Vec<TcStatus>> {
        if let Some(wid) = wid_filter {
            if wid >= super::worker::MAX_WORKERS {
                return Err(RuntimeError::invalid(format!(
                    "'wid' must be between 0 and {}",
                    super::worker::MAX_WORKERS - 1
                )));
            }
            if !workers.is_active(wid) {
                return Err(RuntimeError::invalid(format!(
                    "worker:{wid} does not exist"
                )));
            }
        }

        let mut out = Vec::new();
        for c in self.tcs.values() {
            let hosting_wid = if workers.is_active(c.wid) {
                Some(c.wid)
            } else {
                None
            };

            if let Some(wid) = wid_filter {
                if hosting_wid != Some(wid) {
                    continue;
                }
            }

            out.push(TcStatus {
                name: c.name.clone(),
                parent: c.parent.clone().unwrap_or_default(),
                tasks: c.task_count,
                priority: c.priority,
                wid: hosting_wid,
                limit: c.limit,
                max_burst: c.max_burst,
            });
        }
        Ok(out)
    }

    pub fn count_for_wid(&self, wid: u32) -> u32 {
        self.tcs.values().filter(|c| c.wid == wid).count() as u32
    }

    pub fn get_stats(&self, name: &str) -> RuntimeResult<(ResourceCounts, u64)> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Argument must be a name in str"));
        }
        let c = self
            .tcs
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(format!("No TC '{name}' found")))?;
        Ok((c.usage, 0))
    }

    /// Refuses with `EBUSY` on the first TC that still has tasks attached;
    /// otherwise destroys everything except `auto_free` TCs, which the
    /// owning worker releases on `ResetWorkers`. Partial progress is kept:
    /// TCs destroyed before the offending one stay destroyed.
    pub fn reset(&mut self, namespace: &mut Namespace) -> RuntimeResult<()> {
        let names: Vec<String> = self.tcs.keys().cloned().collect();
        for name in names {
            let c = match self.tcs.get(&name) {
                Some(c) => c,
                None => continue,
            };
            if c.task_count > 0 {
                return Err(RuntimeError::busy(format!(
                    "TC {} still has {} tasks",
                    c.name, c.task_count
                )));
            }
            if c.auto_free {
                continue;
            }
            self.dec_refcount(&name, namespace);
        }
        Ok(())
    }

    fn dec_refcount(&mut self, name: &str, namespace: &mut Namespace) {
        if let Some(c) = self.tcs.get_mut(name) {
            c.refcount = c.refcount.saturating_sub(1);
            if c.refcount == 0 {
                self.tcs.remove(name);
                namespace.remove(name);
            }
        }
    }

    pub fn attach_task(&mut self, tc_name: &str) -> RuntimeResult<()> {
        let c = self
            .tcs
            .get_mut(tc_name)
            .ok_or_else(|| RuntimeError::not_found(format!("No TC '{tc_name}' found")))?;
        c.task_count += 1;
        Ok(())
    }

    pub fn detach_task(&mut self, tc_name: &str) {
        if let Some(c) = self.tcs.get_mut(tc_name) {
            c.task_count = c.task_count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Namespace, WorkerSet, TcTable) {
        let mut namespace = Namespace::new();
        let mut workers = WorkerSet::new();
        let barrier = super::super::pause::PauseBarrier::new();
        let default_tc = workers.add(0, 0, barrier).unwrap();
        let mut tcs = TcTable::new();
        tcs.install_default(&mut namespace, 0, &default_tc);
        (namespace, workers, tcs)
    }

    #[test]
    fn add_tc_rejects_reserved_priority() {
        let (mut namespace, workers, mut tcs) = setup();
        let err = tcs
            .add_tc(
                &mut namespace,
                &workers,
                TcCreateParams {
                    name: "bulk".into(),
                    wid: 0,
                    priority: DEFAULT_PRIORITY,
                    limit: None,
                    max_burst: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.errno(), super::super::error::EINVAL);
    }

    #[test]
    fn add_tc_then_duplicate_name_fails() {
        let (mut namespace, workers, mut tcs) = setup();
        tcs.add_tc(
            &mut namespace,
            &workers,
            TcCreateParams {
                name: "bulk".into(),
                wid: 0,
                priority: 5,
                limit: None,
                max_burst: None,
            },
        )
        .unwrap();

        let err = tcs
            .add_tc(
                &mut namespace,
                &workers,
                TcCreateParams {
                    name: "bulk".into(),
                    wid: 0,
                    priority: 5,
                    limit: None,
                    max_burst: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.errno(), super::super::error::EINVAL);
    }

    #[test]
    fn reset_refuses_while_tasks_attached() {
        let (mut namespace, workers, mut tcs) = setup();
        tcs.add_tc(
            &mut namespace,
            &workers,
            TcCreateParams {
                name: "bulk".into(),
                wid: 0,
                priority: 5,
                limit: None,
                max_burst: None,
            },
        )
        .unwrap();
        tcs.attach_task("bulk").unwrap();

        let err = tcs.reset(&mut namespace).unwrap_err();
        assert_eq!(err.errno(), super::super::error::EBUSY);

        tcs.detach_task("bulk");
        tcs.reset(&mut namespace).unwrap();
        assert!(tcs.get("bulk").is_none());
        assert!(!namespace.exists("bulk"));
    }
}
