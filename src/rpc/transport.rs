use std::sync::{Arc, Weak};

use async_trait::async_trait;

use super::message::{Request, Response};
use crate::core::Host;
use crate::error::TransportError;

/// Request/response channel to the owner process.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, request: Request) -> Result<Response, TransportError>;
}

/// In-process transport.
///
/// Every request and response goes through the JSON codec, so it behaves
/// like a remote channel apart from latency.
#[derive(Clone)]
pub struct LocalTransport {
    host: Weak<Host>,
}

impl LocalTransport {
    pub fn new(host: &Arc<Host>) -> Self {
        Self {
            host: Arc::downgrade(host),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn call(&self, request: Request) -> Result<Response, TransportError> {
        let wire = serde_json::to_vec(&request)?;
        let host = self.host.upgrade().ok_or(TransportError::Closed)?;
        if host.is_shut_down() {
            return Err(TransportError::Closed);
        }
        let request: Request = serde_json::from_slice(&wire)?;
        let response = host.handle(request).await;
        let wire = serde_json::to_vec(&response)?;
        Ok(serde_json::from_slice(&wire)?)
    }
}
