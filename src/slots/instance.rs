//! # Live instances hosted by a slot.
//!
//! The allocator never owns the components it places; it only keeps
//! non-owning handles to them so it can tell whether a slot is still in use
//! and ask the occupants to finish when the slot is forcibly reassigned.
//!
//! A handle stops counting as live once [`Instance::is_alive`] returns
//! `false`; dead handles are dropped lazily whenever a slot is inspected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Opaque, process-unique instance identifier.
pub type InstanceId = u64;

/// A component instance running on a slot.
pub trait Instance: Send + Sync + 'static {
    /// Stable id; used by `destroy_ref` and for equality.
    fn id(&self) -> InstanceId;

    /// Returns `false` once the instance has ended.
    fn is_alive(&self) -> bool;

    /// Asks the instance to end. Must not block; the allocator does not wait.
    fn finish(&self);
}

/// Shared handle to an instance.
pub type InstanceRef = Arc<dyn Instance>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// [`Instance`] backed by a [`CancellationToken`].
///
/// The instance body awaits [`TokenInstance::token`] and exits when it fires;
/// [`Instance::finish`] cancels it and the handle reads as dead from then on.
#[derive(Debug)]
pub struct TokenInstance {
    id: InstanceId,
    token: CancellationToken,
}

impl TokenInstance {
    /// New live instance with a fresh id.
    pub fn new() -> Arc<Self> {
        Self::with_token(CancellationToken::new())
    }

    /// New live instance tied to an existing token (for example a child of a
    /// runtime-wide token).
    pub fn with_token(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            token,
        })
    }

    /// Token the instance body should observe.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Instance for TokenInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn is_alive(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn finish(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_marks_dead() {
        let inst = TokenInstance::new();
        let token = inst.token();
        assert!(inst.is_alive());
        inst.finish();
        assert!(!inst.is_alive());
        assert!(token.is_cancelled());
    }

    #[test]
    fn ids_are_unique() {
        let a = TokenInstance::new();
        let b = TokenInstance::new();
        assert_ne!(a.id(), b.id());
    }
}
