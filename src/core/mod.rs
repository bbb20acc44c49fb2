//! # Host runtime
//!
//! - [`HostConfig`]: centralized settings
//! - [`HostBuilder`]: wires bus, subscribers, store and process control
//! - [`Host`]: the owner process object

mod builder;
mod config;
mod host;

pub use builder::HostBuilder;
pub use config::{HostConfig, ReaperDelays};
pub use host::{Host, WorkerAttach, WorkerKind};
