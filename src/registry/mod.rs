//! # Process registry
//!
//! Unbounded map of live worker processes with liveness tracking. Pool
//! workers and ad hoc workers are registered alike.

mod process;
mod session;

pub use process::ProcessRegistry;
pub use session::{NoopSession, ProcessInfo, Session};
