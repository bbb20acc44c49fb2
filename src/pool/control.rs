//! # OS process control.
//!
//! The scheduler never signals processes itself; it goes through a
//! [`ProcessControl`] implementation supplied by the host.

use async_trait::async_trait;

use crate::error::ProcessError;

/// One entry of the OS process list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsProcess {
    pub pid: u32,
    pub name: String,
}

impl OsProcess {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

/// Access to the processes of this installation.
#[async_trait]
pub trait ProcessControl: Send + Sync + 'static {
    /// Live processes that belong to this installation.
    ///
    /// An empty list is treated like an error by the scheduler.
    async fn list(&self) -> Result<Vec<OsProcess>, ProcessError>;

    /// Sends a termination signal; does not wait for the process to exit.
    async fn kill(&self, pid: u32) -> Result<(), ProcessError>;
}

/// Placeholder used when the host has no process control configured.
///
/// Listing always fails, so pool allocation never succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProcessControl;

#[async_trait]
impl ProcessControl for NoProcessControl {
    async fn list(&self) -> Result<Vec<OsProcess>, ProcessError> {
        Err(ProcessError::ListUnavailable {
            reason: "no process control configured".to_string(),
        })
    }

    async fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        Err(ProcessError::KillFailed {
            pid,
            reason: "no process control configured".to_string(),
        })
    }
}

/// Pool index encoded in a worker process name.
///
/// Pool workers are named `<anything>:<tag><index>`, e.g. `app:loader1`.
///
/// # Example
/// ```
/// use slotvisor::pool_index;
///
/// assert_eq!(pool_index("com.app:loader1", "loader"), Some(1));
/// assert_eq!(pool_index("com.app", "loader"), None);
/// assert_eq!(pool_index("com.app:loaderx", "loader"), None);
/// ```
pub fn pool_index(name: &str, tag: &str) -> Option<usize> {
    let (_, tail) = name.rsplit_once(':')?;
    tail.strip_prefix(tag)?.parse().ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Scriptable process table.
    pub(crate) struct FakeControl {
        procs: Mutex<Vec<OsProcess>>,
        kills: Mutex<Vec<u32>>,
        linger: bool,
        broken: bool,
    }

    impl FakeControl {
        /// Table holding only the host process.
        pub(crate) fn new() -> Self {
            Self {
                procs: Mutex::new(vec![OsProcess::new(1, "app")]),
                kills: Mutex::new(Vec::new()),
                linger: false,
                broken: false,
            }
        }

        /// Killed processes stay listed.
        pub(crate) fn lingering() -> Self {
            Self {
                linger: true,
                ..Self::new()
            }
        }

        /// Listing always fails.
        pub(crate) fn broken() -> Self {
            Self {
                broken: true,
                ..Self::new()
            }
        }

        pub(crate) fn spawn_worker(&self, index: usize, pid: u32) {
            self.procs
                .lock()
                .unwrap()
                .push(OsProcess::new(pid, format!("app:loader{index}")));
        }

        pub(crate) fn exit(&self, pid: u32) {
            self.procs.lock().unwrap().retain(|p| p.pid != pid);
        }

        pub(crate) fn kills(&self) -> Vec<u32> {
            self.kills.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessControl for FakeControl {
        async fn list(&self) -> Result<Vec<OsProcess>, ProcessError> {
            if self.broken {
                return Err(ProcessError::ListUnavailable {
                    reason: "permission denied".into(),
                });
            }
            Ok(self.procs.lock().unwrap().clone())
        }

        async fn kill(&self, pid: u32) -> Result<(), ProcessError> {
            self.kills.lock().unwrap().push(pid);
            if !self.linger {
                self.exit(pid);
            }
            Ok(())
        }
    }
}
