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

//! Quiesces all workers so the control thread can mutate the graph safely,
//! without stopping the process (spec §4.2, design note §9).
//!
//! Modeled as a read-write discipline: each worker loop takes a "read-side"
//! token once per simulated dispatch batch, via [`PauseBarrier::checkpoint`].
//! `pause_all` flips a flag and waits until every registered worker has
//! observed it and backed off; `resume_all` clears the flag and wakes them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
pub struct PauseBarrier {
    paused: AtomicBool,
    registered: AtomicUsize,
    quiesced: AtomicUsize,
    notify_workers: Notify,
    notify_control: Notify,
}

impl PauseBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register_worker(&self) {
        self.registered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn deregister_worker(&self) {
        self.registered.fetch_sub(1, Ordering::SeqCst);
        self.notify_control.notify_one();
    }

    /// Blocks the caller until every registered worker has reached a
    /// quiescent point. After this returns, the caller has exclusive
    /// control-plane access until `resume_all` is called.
    pub async fn pause_all(&self) {
        self.paused.store(true, Ordering::SeqCst);
        loop {
            if self.quiesced.load(Ordering::SeqCst) >= self.registered.load(Ordering::SeqCst) {
                return;
            }
            self.notify_control.notified().await;
        }
    }

    pub fn resume_all(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify_workers.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Called once per simulated dispatch batch by a worker's run loop.
    /// Parks the worker while paused; otherwise returns immediately.
    pub async fn checkpoint(&self) {
        if !self.paused.load(Ordering::SeqCst) {
            return;
        }
        self.quiesced.fetch_add(1, Ordering::SeqCst);
        self.notify_control.notify_one();
        while self.paused.load(Ordering::SeqCst) {
            self.notify_workers.notified().await;
        }
        self.quiesced.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The worker's simulated dispatch loop. Real packet processing is out of
/// scope (spec §1); this loop exists only to give `pause_all`/`resume_all`
/// something real to quiesce.
pub async fn run_worker_loop(barrier: Arc<PauseBarrier>) {
    barrier.register_worker();
    loop {
        barrier.checkpoint().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn pause_all_waits_for_registered_workers() {
        let barrier = PauseBarrier::new();
        let handle = tokio::spawn(run_worker_loop(barrier.clone()));

        // Give the worker a chance to register and run at least once.
        tokio::time::sleep(Duration::from_millis(20)).await;

        barrier.pause_all().await;
        assert!(barrier.is_paused());

        barrier.resume_all();
        handle.abort();
    }

    #[tokio::test]
    async fn pause_all_with_no_workers_returns_immediately() {
        let barrier = PauseBarrier::new();
        barrier.pause_all().await;
        assert!(barrier.is_paused());
        barrier.resume_all();
    }
}
