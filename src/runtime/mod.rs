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

//! Top-level runtime: the single `Runtime` value threaded through every
//! handler (spec §9, "process-wide registries"). Mutating operations pause
//! all workers, take the service-wide lock, mutate, release, and resume
//! (spec §5).

pub mod driver;
pub mod error;
pub mod module;
pub mod namespace;
pub mod pause;
pub mod port;
pub mod task;
pub mod tc;
pub mod worker;

use std::sync::Arc;

use driver::{DriverRegistry, ModuleArg, PortArg};
use error::{RuntimeError, RuntimeResult};
use module::{ModuleBrief, ModuleGraph, ModuleInfo};
use namespace::Namespace;
use pause::PauseBarrier;
use port::{DirectionStats, PortBrief, PortTable};
use task::MAX_TASKS_PER_MODULE;
use tc::{ResourceCounts, TcCreateParams, TcStatus, TcTable};
use worker::{WorkerSet, WorkerStatus, MAX_WORKERS};

struct State {
    namespace: Namespace,
    workers: WorkerSet,
    tcs: TcTable,
    modules: ModuleGraph,
    ports: PortTable,
}

impl State {
    fn new() -> Self {
        Self {
            namespace: Namespace::new(),
            workers: WorkerSet::new(),
            tcs: TcTable::new(),
            modules: ModuleGraph::new(),
            ports: PortTable::new(),
        }
    }
}

/// Process-wide control state. Cheaply clonable (`Arc`); every gRPC handler
/// holds one and calls its async methods, the way `cloud-service`'s handlers
/// hold a cloned `Services`.
pub struct Runtime {
    drivers: DriverRegistry,
    pause: Arc<PauseBarrier>,
    state: tokio::sync::Mutex<State>,
}

impl Runtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            drivers: DriverRegistry::with_builtins(),
            pause: PauseBarrier::new(),
            state: tokio::sync::Mutex::new(State::new()),
        })
    }

    /// Quiesces all workers, takes the service-wide lock, and runs `f`
    /// against the mutable state before releasing both. Every mutating RPC
    /// that touches worker-visible state goes through this (spec §4.2, §5).
    async fn mutate<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut State) -> T,
    {
        self.pause.pause_all().await;
        let mut state = self.state.lock().await;
        let result = f(&mut state);
        drop(state);
        self.pause.resume_all();
        result
    }

    async fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&State) -> T,
    {
        let state = self.state.lock().await;
        f(&state)
    }

    // --- Lifecycle ---

    /// Runs `ResetModules -> ResetPorts -> ResetTcs -> ResetWorkers`,
    /// stopping at the first non-`Ok` step (spec §4.9).
    pub async fn reset_all(&self) -> RuntimeResult<()> {
        self.reset_modules().await?;
        self.reset_ports().await?;
        self.reset_tcs().await?;
        self.reset_workers().await?;
        Ok(())
    }

    pub async fn pause_all(&self) {
        self.pause.pause_all().await;
    }

    pub fn resume_all(&self) {
        self.pause.resume_all();
    }

    /// Schedules process termination shortly after returning, so the
    /// in-flight response has a chance to flush (spec §4.10: "no graceful
    /// drain is promised").
    pub fn kill_bess(&self) {
        tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            std::process::exit(0);
        });
    }

    // --- Workers ---

    pub async fn add_worker(&self, wid: u32, core: u32) -> RuntimeResult<()> {
        let pause = self.pause.clone();
        self.mutate(move |state| {
            let default_tc = state.workers.add(wid, core, pause)?;
            state.tcs.install_default(&mut state.namespace, wid, &default_tc);
            Ok(())
        })
        .await
    }

    pub async fn list_workers(&self) -> Vec<WorkerStatus> {
        self.read(|state| {
            let tcs = &state.tcs;
            state.workers.list(|wid| tcs.count_for_wid(wid))
        })
        .await
    }

    /// Tears down every worker and the TCs it hosted, including its
    /// auto-installed default TC (spec §4.3).
    pub async fn reset_workers(&self) -> RuntimeResult<()> {
        self.pause.pause_all().await;
        let mut state = self.state.lock().await;
        let wids: Vec<u32> = (0..MAX_WORKERS).filter(|&w| state.workers.is_active(w)).collect();
        state.workers.reset().await;
        for wid in wids {
            state.tcs.remove_worker_tcs(&mut state.namespace, wid);
        }
        drop(state);
        self.pause.resume_all();
        Ok(())
    }

    // --- Traffic classes ---

    /// `AddTc` with the convenience auto-launch of worker 0 when `wid == 0`
    /// and no workers exist yet (spec §4.4).
    pub async fn add_tc(&self, params: TcCreateParams) -> RuntimeResult<()> {
        let pause = self.pause.clone();
        self.mutate(move |state| {
            if params.wid == 0 && state.workers.count() == 0 {
                if let Ok(default_tc) = state.workers.add(0, 0, pause.clone()) {
                    state.tcs.install_default(&mut state.namespace, 0, &default_tc);
                }
            }
            state.tcs.add_tc(&mut state.namespace, &state.workers, params)
        })
        .await
    }

    pub async fn list_tcs(&self, wid: Option<u32>) -> RuntimeResult<Vec<TcStatus>> {
        self.read(|state| state.tcs.list(wid, &state.workers)).await
    }

    pub async fn get_tc_stats(&self, name: &str) -> RuntimeResult<(ResourceCounts, u64)> {
        self.read(|state| state.tcs.get_stats(name)).await
    }

    pub async fn reset_tcs(&self) -> RuntimeResult<()> {
        self.mutate(|state| state.tcs.reset(&mut state.namespace)).await
    }

    // --- Drivers ---

    pub fn list_drivers(&self) -> Vec<String> {
        self.drivers.list_drivers()
    }

    pub fn get_driver_info(&self, name: &str) -> RuntimeResult<(String, String)> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'driver_name' field"));
        }
        let driver = self
            .drivers
            .find_driver(name)
            .ok_or_else(|| RuntimeError::not_found(format!("No driver '{name}' found")))?;
        Ok((driver.name().to_string(), driver.help().to_string()))
    }

    // --- Ports ---

    #[allow(clippy::too_many_arguments)]
    pub async fn create_port(
        &self,
        name: &str,
        driver_name: &str,
        num_inc_q: u32,
        num_out_q: u32,
        size_inc_q: u32,
        size_out_q: u32,
        mac_addr: &str,
        arg: PortArg,
    ) -> RuntimeResult<()> {
        let drivers = &self.drivers;
        self.mutate(move |state| {
            state.ports.create(
                &mut state.namespace,
                drivers,
                name,
                driver_name,
                num_inc_q,
                num_out_q,
                size_inc_q,
                size_out_q,
                mac_addr,
                &arg,
            )
        })
        .await
    }

    pub async fn destroy_port(&self, name: &str) -> RuntimeResult<()> {
        self.mutate(|state| state.ports.destroy(&mut state.namespace, name)).await
    }

    pub async fn list_ports(&self) -> Vec<PortBrief> {
        self.read(|state| state.ports.list()).await
    }

    pub async fn get_port_stats(&self, name: &str) -> RuntimeResult<(DirectionStats, DirectionStats)> {
        self.read(|state| state.ports.get_stats(name)).await
    }

    pub async fn reset_ports(&self) -> RuntimeResult<()> {
        self.mutate(|state| {
            state.ports.reset(&mut state.namespace);
            Ok(())
        })
        .await
    }

    // --- Modules ---

    pub async fn create_module(&self, name: &str, mclass: &str, arg: ModuleArg) -> RuntimeResult<()> {
        let drivers = &self.drivers;
        self.mutate(move |state| state.modules.create(&mut state.namespace, drivers, name, mclass, &arg))
            .await
    }

    pub async fn destroy_module(&self, name: &str) -> RuntimeResult<()> {
        self.mutate(|state| state.modules.destroy(&mut state.namespace, &mut state.tcs, name))
            .await
    }

    pub async fn get_module_info(&self, name: &str) -> RuntimeResult<ModuleInfo> {
        self.read(|state| state.modules.info(name)).await
    }

    pub async fn list_modules(&self) -> Vec<ModuleBrief> {
        self.read(|state| state.modules.list()).await
    }

    pub async fn reset_modules(&self) -> RuntimeResult<()> {
        self.mutate(|state| {
            state.modules.reset(&mut state.namespace, &mut state.tcs);
            Ok(())
        })
        .await
    }

    // --- Graph ---

    pub async fn connect_modules(&self, m1: &str, ogate: u32, m2: &str, igate: u32) -> RuntimeResult<()> {
        self.mutate(|state| state.modules.connect(m1, ogate, m2, igate)).await
    }

    pub async fn disconnect_modules(&self, name: &str, ogate: u32) -> RuntimeResult<()> {
        self.mutate(|state| state.modules.disconnect(name, ogate)).await
    }

    // --- Tasks ---

    /// Attaching while already attached is refused with `EBUSY` regardless
    /// of whether the target TC differs from the current one: a stricter,
    /// invariant-preserving rule that subsumes the narrower "same-TC
    /// reattach is disallowed" case.
    pub async fn attach_task(&self, name: &str, taskid: u32, tc: &str, wid: u32) -> RuntimeResult<()> {
        self.mutate(|state| {
            if taskid >= MAX_TASKS_PER_MODULE {
                return Err(RuntimeError::invalid(format!(
                    "'taskid' must be between 0 and {}",
                    MAX_TASKS_PER_MODULE - 1
                )));
            }
            let m = state
                .modules
                .get_mut(name)
                .ok_or_else(|| RuntimeError::not_found(format!("No module '{name}' found")))?;
            let task = m
                .tasks
                .get_mut(taskid as usize)
                .and_then(|slot| slot.as_mut())
                .ok_or_else(|| {
                    RuntimeError::not_found(format!("Task {taskid} of module '{name}' does not exist"))
                })?;

            if task.is_attached() {
                return Err(RuntimeError::busy(format!(
                    "Task {taskid} of module '{name}' is already attached"
                )));
            }

            if !tc.is_empty() {
                state.tcs.attach_task(tc)?;
                task.attached_tc = Some(tc.to_string());
            } else {
                if wid >= MAX_WORKERS {
                    return Err(RuntimeError::invalid(format!(
                        "'wid' must be between 0 and {}",
                        MAX_WORKERS - 1
                    )));
                }
                if !state.workers.is_active(wid) {
                    return Err(RuntimeError::invalid(format!("worker:{wid} does not exist")));
                }
                let default_tc = state.workers.get(wid).expect("checked active above").default_tc.clone();
                state.tcs.attach_task(&default_tc)?;
                task.attached_tc = Some(default_tc);
            }
            Ok(())
        })
        .await
    }

    // --- Debug ---

    pub async fn enable_tcpdump(&self, name: &str, ogate: u32, fifo: &str) -> RuntimeResult<()> {
        self.mutate(|state| state.modules.enable_tcpdump(name, ogate, fifo)).await
    }

    pub async fn disable_tcpdump(&self, name: &str, ogate: u32) -> RuntimeResult<()> {
        self.mutate(|state| state.modules.disable_tcpdump(name, ogate)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn worker_then_tc_scenario() {
        let rt = Runtime::new();
        rt.add_worker(0, 0).await.unwrap();
        let workers = rt.list_workers().await;
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].wid, 0);
        assert_eq!(workers[0].num_tcs, 1);

        rt.add_tc(TcCreateParams {
            name: "bulk".into(),
            wid: 0,
            priority: 5,
            limit: Some(ResourceCounts {
                packets: 1_000_000,
                ..Default::default()
            }),
            max_burst: None,
        })
        .await
        .unwrap();

        let tcs = rt.list_tcs(Some(0)).await.unwrap();
        assert!(tcs.iter().any(|t| t.name == "bulk"));

        let err = rt
            .add_tc(TcCreateParams {
                name: "bulk".into(),
                wid: 0,
                priority: 5,
                limit: None,
                max_burst: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.errno(), error::EINVAL);
    }

    #[tokio::test]
    async fn module_create_connect_destroy_scenario() {
        let rt = Runtime::new();
        rt.create_module("src", "Source", ModuleArg::Source).await.unwrap();
        rt.create_module("snk", "Sink", ModuleArg::Sink).await.unwrap();
        rt.connect_modules("src", 0, "snk", 0).await.unwrap();

        let info = rt.get_module_info("src").await.unwrap();
        assert_eq!(info.ogates[0].peer_module, "snk");

        rt.destroy_module("src").await.unwrap();
        let snk_info = rt.get_module_info("snk").await.unwrap();
        assert!(snk_info.igates.is_empty());
    }

    #[tokio::test]
    async fn reset_all_empties_everything() {
        let rt = Runtime::new();
        rt.add_worker(0, 0).await.unwrap();
        rt.create_module("src", "Source", ModuleArg::Source).await.unwrap();
        rt.create_port("p0", "Dummy", 1, 1, 64, 64, "", PortArg::Dummy)
            .await
            .unwrap();

        rt.reset_all().await.unwrap();

        assert!(rt.list_modules().await.is_empty());
        assert!(rt.list_ports().await.is_empty());
        assert!(rt.list_workers().await.is_empty());
    }
}
