//! # Idle reaper.
//!
//! Keeps at most one pending idle check. Every (re)schedule cancels the
//! previous one; a load increase cancels it outright. When the check fires it
//! reaps one idle running worker and, if it did, schedules a follow-up.

use std::sync::{Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::scheduler::ProcessPoolScheduler;
use crate::core::ReaperDelays;

pub(crate) struct IdleReaper {
    sched: Weak<ProcessPoolScheduler>,
    delays: Option<ReaperDelays>,
    pending: Mutex<Option<CancellationToken>>,
    runtime_token: CancellationToken,
    handle: Option<Handle>,
}

impl IdleReaper {
    /// Inert when `delays` is `None` or no tokio runtime is available.
    pub(crate) fn new(
        sched: Weak<ProcessPoolScheduler>,
        delays: Option<ReaperDelays>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            sched,
            delays,
            pending: Mutex::new(None),
            runtime_token,
            handle: Handle::try_current().ok(),
        }
    }

    pub(crate) fn after_attach(&self) {
        if let Some(d) = self.delays {
            self.schedule(d.initial);
        }
    }

    pub(crate) fn after_release(&self) {
        if let Some(d) = self.delays {
            self.schedule(d.release);
        }
    }

    fn after_reap(&self) {
        if let Some(d) = self.delays {
            self.schedule(d.followup);
        }
    }

    pub(crate) fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = pending.take() {
            token.cancel();
        }
    }

    fn schedule(&self, delay: Duration) {
        let Some(handle) = &self.handle else {
            return;
        };
        let token = self.runtime_token.child_token();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(old) = pending.replace(token.clone()) {
                old.cancel();
            }
        }

        let sched = self.sched.clone();
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(sched) = sched.upgrade() else {
                return;
            };
            if sched.reap_idle().await {
                sched.reaper().after_reap();
            }
        });
    }
}
