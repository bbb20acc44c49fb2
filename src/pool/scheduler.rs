//! # Process pool scheduler.
//!
//! Maps workloads onto a fixed array of worker-process slots.
//!
//! ```text
//! allocate(w)
//!   list OS processes ── unavailable ──► None
//!   pick max priority (ties: oldest last_modified, then lowest index)
//!   already hosting w and claimed? ──► return index
//!   occupant alive? ──► kill, poll list until gone (bounded)
//!   reset slot to Allocated(w) ──► return index
//! ```
//!
//! ## Rules
//! - `allocate`, `attach` and the idle reaper are serialized end to end by one
//!   async lock, so a worker never binds to a slot that is mid-eviction.
//! - `adjust_load` and `on_death` only take the slot's own lock.
//! - No slot lock is held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::control::{ProcessControl, pool_index};
use super::reaper::IdleReaper;
use super::slot::{LoadKind, PRIORITY_MAX, ProcessSlot, ProcessSlotSnapshot, ProcessState};
use crate::core::HostConfig;
use crate::events::{Bus, Event, EventKind};

/// Scheduler over a fixed pool of worker-process slots.
pub struct ProcessPoolScheduler {
    slots: Vec<Mutex<ProcessSlot>>,
    serial: tokio::sync::Mutex<()>,
    control: Arc<dyn ProcessControl>,
    bus: Bus,
    stale_threshold: Duration,
    kill_wait_attempts: u32,
    kill_wait_interval: Duration,
    tag: String,
    reaper: IdleReaper,
}

impl ProcessPoolScheduler {
    /// Creates `cfg.pool_size` unused slots.
    ///
    /// The idle reaper runs on the current tokio runtime, if any, and stops
    /// when `runtime_token` is cancelled.
    pub fn new(
        cfg: &HostConfig,
        control: Arc<dyn ProcessControl>,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Arc<Self> {
        let now = Instant::now();
        Arc::new_cyclic(|me| Self {
            slots: (0..cfg.pool_size)
                .map(|i| Mutex::new(ProcessSlot::new(i, now)))
                .collect(),
            serial: tokio::sync::Mutex::new(()),
            control,
            bus,
            stale_threshold: cfg.stale_threshold,
            kill_wait_attempts: cfg.kill_wait_attempts,
            kill_wait_interval: cfg.kill_wait_interval,
            tag: cfg.pool_process_tag.clone(),
            reaper: IdleReaper::new(me.clone(), cfg.reaper_delays(), runtime_token),
        })
    }

    fn slot(&self, index: usize) -> Option<MutexGuard<'_, ProcessSlot>> {
        self.slots
            .get(index)
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn reaper(&self) -> &IdleReaper {
        &self.reaper
    }

    /// Number of pool slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Chooses a slot for `workload`, evicting its occupant if needed.
    ///
    /// Returns `None` when the OS process list is unavailable or the pool is
    /// empty. Never fails because of load: some slot is always chosen.
    pub async fn allocate(&self, workload: &str) -> Option<usize> {
        let _serial = self.serial.lock().await;

        let procs = match self.control.list().await {
            Ok(p) if !p.is_empty() => p,
            Ok(_) => return self.list_unavailable(workload, "empty process list"),
            Err(e) => return self.list_unavailable(workload, &e.to_string()),
        };

        let (index, reuse) = self.select(workload, Instant::now())?;
        if reuse {
            self.bus.publish(
                Event::new(EventKind::ProcessReused)
                    .with_index(index)
                    .with_workload(workload),
            );
            return Some(index);
        }

        let occupant = procs
            .iter()
            .find(|p| pool_index(&p.name, &self.tag) == Some(index))
            .map(|p| p.pid);
        if let Some(pid) = occupant {
            let previous = self.slot(index)?.workload().map(str::to_string);
            self.terminate(index, pid, previous).await;
        }

        self.slot(index)?.reset(workload, Instant::now());
        self.bus.publish(
            Event::new(EventKind::ProcessAllocated)
                .with_index(index)
                .with_workload(workload),
        );
        Some(index)
    }

    fn list_unavailable(&self, workload: &str, reason: &str) -> Option<usize> {
        self.bus.publish(
            Event::new(EventKind::ProcessListUnavailable)
                .with_workload(workload)
                .with_reason(reason),
        );
        None
    }

    /// Highest-priority slot and whether it can be returned as is.
    fn select(&self, workload: &str, now: Instant) -> Option<(usize, bool)> {
        let mut best: Option<(usize, u32, Instant, bool)> = None;
        for (i, m) in self.slots.iter().enumerate() {
            let s = m.lock().unwrap_or_else(PoisonError::into_inner);
            let p = s.priority(workload, now, self.stale_threshold);
            let better = match best {
                None => true,
                Some((_, bp, bt, _)) => p > bp || (p == bp && s.last_modified() < bt),
            };
            if better {
                best = Some((i, p, s.last_modified(), p == PRIORITY_MAX && s.is_claimed()));
            }
        }
        best.map(|(i, _, _, reuse)| (i, reuse))
    }

    /// Kills `pid` and waits (bounded) until the process list drops it.
    async fn terminate(&self, index: usize, pid: u32, previous: Option<String>) {
        let mut ev = Event::new(EventKind::ProcessKilled)
            .with_index(index)
            .with_pid(pid);
        if let Some(previous) = previous {
            ev = ev.with_workload(previous);
        }
        if let Err(e) = self.control.kill(pid).await {
            ev = ev.with_reason(e.to_string());
        }
        self.bus.publish(ev);

        for _ in 0..self.kill_wait_attempts {
            match self.control.list().await {
                Ok(procs) if !procs.iter().any(|p| p.pid == pid) => return,
                _ => tokio::time::sleep(self.kill_wait_interval).await,
            }
        }
        if self.kill_wait_attempts > 0 {
            self.bus.publish(
                Event::new(EventKind::KillWaitTimeout)
                    .with_index(index)
                    .with_pid(pid),
            );
        }
    }

    /// Binds a worker process to its slot (`Allocated` → `Running`).
    ///
    /// With `default_workload`, the slot is first re-claimed for that
    /// workload. Returns the workload the worker must host. Waits for any
    /// in-flight `allocate` to finish first.
    pub async fn attach(
        &self,
        index: usize,
        pid: u32,
        liveness: CancellationToken,
        default_workload: Option<&str>,
    ) -> Option<String> {
        let _serial = self.serial.lock().await;
        let rejected = |reason: String| {
            self.bus.publish(
                Event::new(EventKind::AttachRejected)
                    .with_index(index)
                    .with_pid(pid)
                    .with_reason(reason),
            );
            None
        };
        if pid == 0 {
            return rejected("pid 0".to_string());
        }
        let Some(mut slot) = self.slot(index) else {
            return rejected("no such slot".to_string());
        };

        let now = Instant::now();
        if let Some(w) = default_workload {
            slot.reset(w, now);
        }
        if slot.state() != ProcessState::Allocated {
            let state = slot.state();
            drop(slot);
            return rejected(format!("slot is {state:?}"));
        }
        slot.attach(pid, liveness, now);
        let workload = slot.workload().map(str::to_string);
        drop(slot);

        let mut ev = Event::new(EventKind::ProcessAttached)
            .with_index(index)
            .with_pid(pid);
        if let Some(w) = &workload {
            ev = ev.with_workload(w.as_str());
        }
        self.bus.publish(ev);
        self.reaper.after_attach();
        workload
    }

    /// Changes one load counter of a slot and refreshes its `last_modified`.
    ///
    /// A raise cancels the pending idle check; a drop reschedules it.
    pub fn adjust_load(&self, index: usize, kind: LoadKind, delta: i32) -> bool {
        let Some(mut slot) = self.slot(index) else {
            return false;
        };
        slot.adjust(kind, delta, Instant::now());
        drop(slot);

        if delta > 0 {
            self.reaper.cancel();
        } else if delta < 0 {
            self.reaper.after_release();
        }
        true
    }

    /// Adjusts the binding counter of the slot running `pid`.
    pub fn adjust_binders_by_pid(&self, pid: u32, delta: i32) -> bool {
        match self.index_of_pid(pid) {
            Some(i) => self.adjust_load(i, LoadKind::Binder, delta),
            None => false,
        }
    }

    fn index_of_pid(&self, pid: u32) -> Option<usize> {
        if pid == 0 {
            return None;
        }
        (0..self.slots.len()).find(|&i| {
            self.slot(i)
                .is_some_and(|s| s.state() == ProcessState::Running && s.pid() == pid)
        })
    }

    /// A worker died: its slot becomes `Stopped`, keeping the workload.
    pub fn on_death(&self, pid: u32) -> Option<usize> {
        let index = self.index_of_pid(pid)?;
        let mut slot = self.slot(index)?;
        if slot.pid() != pid {
            return None;
        }
        slot.stop(Instant::now());
        let workload = slot.workload().map(str::to_string);
        drop(slot);

        let mut ev = Event::new(EventKind::ProcessStopped)
            .with_index(index)
            .with_pid(pid);
        if let Some(w) = workload {
            ev = ev.with_workload(w);
        }
        self.bus.publish(ev);
        Some(index)
    }

    /// Kills one running worker with no load. Returns `true` if it did.
    pub(crate) async fn reap_idle(&self) -> bool {
        let _serial = self.serial.lock().await;

        let candidate = (0..self.slots.len()).find_map(|i| {
            let s = self.slot(i)?;
            (s.state() == ProcessState::Running && s.is_idle())
                .then(|| (i, s.pid(), s.workload().map(str::to_string)))
        });
        let Some((index, pid, workload)) = candidate else {
            return false;
        };

        self.terminate(index, pid, workload.clone()).await;

        if let Some(mut slot) = self.slot(index) {
            if slot.pid() == pid {
                slot.stop(Instant::now());
            }
        }
        let mut ev = Event::new(EventKind::IdleReaped)
            .with_index(index)
            .with_pid(pid);
        if let Some(w) = workload {
            ev = ev.with_workload(w);
        }
        self.bus.publish(ev);
        true
    }

    /// Snapshot of one slot.
    pub fn get(&self, index: usize) -> Option<ProcessSlotSnapshot> {
        Some(self.slot(index)?.snapshot(Instant::now()))
    }

    /// Snapshots of every slot, by index.
    pub fn dump(&self) -> Vec<ProcessSlotSnapshot> {
        let now = Instant::now();
        (0..self.slots.len())
            .filter_map(|i| self.slot(i).map(|s| s.snapshot(now)))
            .collect()
    }
}
