use super::message::{Request, Response};
use super::transport::Transport;
use crate::error::TransportError;
use crate::pool::{LoadKind, ProcessSlotSnapshot};
use crate::registry::ProcessInfo;
use crate::slots::{ComponentShape, LogicalIdentity, PartitionKey, SlotSnapshot};

/// Client-side stub of the owner process.
///
/// Mirrors the owner's allocator, pool and registry methods; only the
/// transport differs.
pub struct HostClient<T> {
    transport: T,
}

fn unexpected(response: Response) -> TransportError {
    TransportError::Unexpected(format!("{response:?}"))
}

impl<T: Transport> HostClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn key_for(
        &self,
        shape: &ComponentShape,
    ) -> Result<Option<PartitionKey>, TransportError> {
        match self.transport.call(Request::KeyFor { shape: shape.clone() }).await? {
            Response::Key(k) => Ok(k),
            other => Err(unexpected(other)),
        }
    }

    pub async fn alloc(
        &self,
        key: &PartitionKey,
        identity: &LogicalIdentity,
    ) -> Result<Option<String>, TransportError> {
        let req = Request::Alloc {
            key: *key,
            identity: identity.clone(),
        };
        match self.transport.call(req).await? {
            Response::Slot(s) => Ok(s),
            other => Err(unexpected(other)),
        }
    }

    pub async fn lookup(&self, slot: &str) -> Result<Option<SlotSnapshot>, TransportError> {
        let req = Request::Lookup {
            slot: slot.to_string(),
        };
        match self.transport.call(req).await? {
            Response::Snapshot(s) => Ok(s),
            other => Err(unexpected(other)),
        }
    }

    pub async fn retarget(
        &self,
        origin: &str,
        target: &str,
        identity: &LogicalIdentity,
        hops: u32,
    ) -> Result<bool, TransportError> {
        let req = Request::Retarget {
            origin: origin.to_string(),
            target: target.to_string(),
            identity: identity.clone(),
            hops,
        };
        self.accepted(req).await
    }

    pub async fn dump_slots(&self) -> Result<Vec<SlotSnapshot>, TransportError> {
        match self.transport.call(Request::DumpSlots).await? {
            Response::Slots(s) => Ok(s),
            other => Err(unexpected(other)),
        }
    }

    pub async fn allocate_process(&self, workload: &str) -> Result<Option<usize>, TransportError> {
        let req = Request::AllocateProcess {
            workload: workload.to_string(),
        };
        match self.transport.call(req).await? {
            Response::ProcessIndex(i) => Ok(i),
            other => Err(unexpected(other)),
        }
    }

    pub async fn adjust_load(
        &self,
        index: usize,
        kind: LoadKind,
        delta: i32,
    ) -> Result<bool, TransportError> {
        self.accepted(Request::AdjustLoad { index, kind, delta }).await
    }

    pub async fn adjust_binders_by_pid(
        &self,
        pid: u32,
        delta: i32,
    ) -> Result<bool, TransportError> {
        self.accepted(Request::AdjustBindersByPid { pid, delta }).await
    }

    pub async fn dump_pool(&self) -> Result<Vec<ProcessSlotSnapshot>, TransportError> {
        match self.transport.call(Request::DumpPool).await? {
            Response::Pool(p) => Ok(p),
            other => Err(unexpected(other)),
        }
    }

    pub async fn lookup_by_workload(
        &self,
        workload: &str,
    ) -> Result<Option<ProcessInfo>, TransportError> {
        let req = Request::LookupByWorkload {
            workload: workload.to_string(),
        };
        self.process(req).await
    }

    pub async fn lookup_by_pid(&self, pid: u32) -> Result<Option<ProcessInfo>, TransportError> {
        self.process(Request::LookupByPid { pid }).await
    }

    async fn accepted(&self, req: Request) -> Result<bool, TransportError> {
        match self.transport.call(req).await? {
            Response::Accepted(b) => Ok(b),
            other => Err(unexpected(other)),
        }
    }

    async fn process(&self, req: Request) -> Result<Option<ProcessInfo>, TransportError> {
        match self.transport.call(req).await? {
            Response::Process(p) => Ok(p),
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Fixed(Response);

    #[async_trait]
    impl Transport for Fixed {
        async fn call(&self, _request: Request) -> Result<Response, TransportError> {
            Ok(self.0.clone())
        }
    }

    struct Down;

    #[async_trait]
    impl Transport for Down {
        async fn call(&self, _request: Request) -> Result<Response, TransportError> {
            Err(TransportError::Closed)
        }
    }

    #[tokio::test]
    async fn mismatched_response_is_unexpected() {
        let client = HostClient::new(Fixed(Response::Accepted(true)));
        let err = client.allocate_process("mail").await.unwrap_err();
        assert_eq!(err.as_label(), "transport_unexpected");
        assert!(!err.is_retryable());
        assert!(client.adjust_load(0, LoadKind::Activity, 1).await.unwrap());
    }

    #[tokio::test]
    async fn closed_transport_is_retryable() {
        let client = HostClient::new(Down);
        let err = client.lookup_by_pid(1).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
