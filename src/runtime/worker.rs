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

//! Fixed-capacity array of worker slots (spec §4.3). Each slot optionally
//! holds a worker pinned to one CPU core.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::error::{RuntimeError, RuntimeResult};
use super::pause::{run_worker_loop, PauseBarrier};

pub const MAX_WORKERS: u32 = 64;

pub fn is_cpu_present(core: u32) -> bool {
    let available = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    core < available
}

pub struct Worker {
    pub wid: u32,
    pub core: u32,
    pub default_tc: String,
    running: Arc<AtomicBool>,
    silent_drops: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn silent_drops(&self) -> u64 {
        self.silent_drops.load(Ordering::Relaxed)
    }
}

pub struct WorkerStatus {
    pub wid: u32,
    pub running: bool,
    pub core: u32,
    pub num_tcs: u32,
    pub silent_drops: u64,
}

#[derive(Default)]
pub struct WorkerSet {
    slots: Vec<Option<Worker>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_WORKERS).map(|_| None).collect(),
        }
    }

    pub fn is_active(&self, wid: u32) -> bool {
        self.slots
            .get(wid as usize)
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, wid: u32) -> Option<&Worker> {
        self.slots.get(wid as usize).and_then(|s| s.as_ref())
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Spawns a worker pinned to `core`, with a default TC name the TC
    /// tree's new TCs fall back to as parent (spec §4.4).
    pub fn add(
        &mut self,
        wid: u32,
        core: u32,
        barrier: Arc<PauseBarrier>,
    ) -> RuntimeResult<String> {
        if wid >= MAX_WORKERS {
            return Err(RuntimeError::invalid("Missing 'wid' field"));
        }
        if !is_cpu_present(core) {
            return Err(RuntimeError::invalid(format!("Invalid core {core}")));
        }
        if self.is_active(wid) {
            return Err(RuntimeError::conflict(format!(
                "worker:{wid} is already active"
            )));
        }

        let running = Arc::new(AtomicBool::new(true));
        let silent_drops = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(run_worker_loop(barrier));
        let default_tc = format!("__worker{wid}_default__");

        self.slots[wid as usize] = Some(Worker {
            wid,
            core,
            default_tc: default_tc.clone(),
            running,
            silent_drops,
            handle,
        });

        Ok(default_tc)
    }

    /// Tears down every worker unconditionally. Returns once all are
    /// joined: running packet processing ceases before this returns.
    pub async fn reset(&mut self) {
        let workers: Vec<Worker> = self.slots.iter_mut().filter_map(|s| s.take()).collect();
        for worker in workers {
            worker.running.store(false, Ordering::Relaxed);
            worker.handle.abort();
            let _ = worker.handle.await;
        }
    }

    pub fn list(&self, num_tcs_by_wid: impl Fn(u32) -> u32) -> Vec<WorkerStatus> {
        self.slots
            .iter()
            .flatten()
            .map(|w| WorkerStatus {
                wid: w.wid,
                running: w.running(),
                core: w.core,
                num_tcs: num_tcs_by_wid(w.wid),
                silent_drops: w.silent_drops(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_rejects_out_of_range_wid() {
        let mut set = WorkerSet::new();
        let barrier = PauseBarrier::new();
        let err = set.add(MAX_WORKERS, 0, barrier).unwrap_err();
        assert_eq!(err.errno(), super::super::error::EINVAL);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_slot() {
        let mut set = WorkerSet::new();
        let barrier = PauseBarrier::new();
        set.add(0, 0, barrier.clone()).unwrap();
        let err = set.add(0, 0, barrier).unwrap_err();
        assert_eq!(err.errno(), super::super::error::EEXIST);
        set.reset().await;
    }

    #[tokio::test]
    async fn reset_clears_all_slots() {
        let mut set = WorkerSet::new();
        let barrier = PauseBarrier::new();
        set.add(0, 0, barrier.clone()).unwrap();
        set.add(1, 0, barrier).unwrap();
        assert_eq!(set.count(), 2);
        set.reset().await;
        assert_eq!(set.count(), 0);
    }
}
