//! # RPC surface of the owner process.
//!
//! One process owns the allocator, the pool and the registry; every other
//! process reaches them through a [`HostClient`] over a [`Transport`].
//!
//! ```text
//! HostClient ──Request──► Transport ──► Host::handle ──► SlotAllocator / ProcessPoolScheduler / ProcessRegistry
//!            ◄─Response──
//! ```

mod client;
mod message;
mod transport;

pub use client::HostClient;
pub use message::{Request, Response};
pub use transport::{LocalTransport, Transport};
