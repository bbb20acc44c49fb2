//! # Host configuration.
//!
//! Provides [`HostConfig`], centralized settings for the slot allocator, the
//! process pool and the event system.
//!
//! ## Sentinel values
//! - `reaper_enabled = false` → idle workers are never reaped
//! - `kill_wait_attempts = 0` → the pool does not wait for a killed worker to vanish
//! - `max_forward_hops = 0` → the redirect flow accepts only first-hand requests

use std::time::Duration;

use crate::slots::{DEFAULT_MAX_FORWARD_HOPS, SlotLayout};

/// Delays used by the idle reaper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaperDelays {
    /// First check after a worker attaches.
    pub initial: Duration,
    /// Check after a load counter drops.
    pub release: Duration,
    /// Next check after a reap.
    pub followup: Duration,
}

/// Configuration of the host process.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `pool_size`: number of process slots, fixed for the host's lifetime
/// - `stale_threshold`: a worker untouched for longer ranks as evictable
/// - `kill_wait_attempts` × `kill_wait_interval`: bounded wait for a killed worker
/// - `reaper_*`: idle reaper switch and delays
/// - `pool_process_tag`: pool workers are named `...:<tag><index>`
/// - `max_forward_hops`: redirect flow retry bound
/// - `layout`: slot table shape
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Number of process slots in the pool.
    pub pool_size: usize,

    /// Age after which an untouched pool slot is considered stale.
    pub stale_threshold: Duration,

    /// How many times to poll the process list after a kill.
    pub kill_wait_attempts: u32,

    /// Pause between two polls of the process list.
    pub kill_wait_interval: Duration,

    /// Reap running workers that carry no load.
    pub reaper_enabled: bool,

    /// Delay of the first idle check after attach.
    pub reaper_initial_delay: Duration,

    /// Delay of the idle check after a counter decrement.
    pub reaper_release_delay: Duration,

    /// Delay of the next idle check after a reap.
    pub reaper_followup_delay: Duration,

    /// Process-name tag identifying pool workers.
    pub pool_process_tag: String,

    /// Maximum redirect hops accepted by `SlotAllocator::retarget`.
    pub max_forward_hops: u32,

    /// Shape of the slot table.
    pub layout: SlotLayout,
}

impl HostConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Reaper delays, or `None` when reaping is disabled.
    #[inline]
    pub fn reaper_delays(&self) -> Option<ReaperDelays> {
        self.reaper_enabled.then_some(ReaperDelays {
            initial: self.reaper_initial_delay,
            release: self.reaper_release_delay,
            followup: self.reaper_followup_delay,
        })
    }

    /// Upper bound of the post-kill wait.
    #[inline]
    pub fn kill_wait_budget(&self) -> Duration {
        self.kill_wait_interval * self.kill_wait_attempts
    }
}

impl Default for HostConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `pool_size = 2`
    /// - `stale_threshold = 10s`
    /// - `kill_wait = 10 × 100ms`
    /// - reaper enabled, delays `17s` / `11s` / `3s`
    /// - `pool_process_tag = "loader"`
    /// - `max_forward_hops = 3`
    /// - `layout = SlotLayout::default()`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            pool_size: 2,
            stale_threshold: Duration::from_secs(10),
            kill_wait_attempts: 10,
            kill_wait_interval: Duration::from_millis(100),
            reaper_enabled: true,
            reaper_initial_delay: Duration::from_secs(17),
            reaper_release_delay: Duration::from_secs(11),
            reaper_followup_delay: Duration::from_secs(3),
            pool_process_tag: "loader".to_string(),
            max_forward_hops: DEFAULT_MAX_FORWARD_HOPS,
            layout: SlotLayout::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_hide_sentinels() {
        let mut cfg = HostConfig::default();
        assert_eq!(cfg.kill_wait_budget(), Duration::from_secs(1));
        assert!(cfg.reaper_delays().is_some());

        cfg.reaper_enabled = false;
        cfg.bus_capacity = 0;
        assert_eq!(cfg.reaper_delays(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
