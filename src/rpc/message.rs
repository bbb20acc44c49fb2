use serde::{Deserialize, Serialize};

use crate::pool::{LoadKind, ProcessSlotSnapshot};
use crate::registry::ProcessInfo;
use crate::slots::{ComponentShape, LogicalIdentity, PartitionKey, SlotSnapshot};

/// Call into the owner process.
///
/// Operations that carry in-process handles (instance registration, worker
/// attach) are not part of the wire surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    KeyFor {
        shape: ComponentShape,
    },
    Alloc {
        key: PartitionKey,
        identity: LogicalIdentity,
    },
    Lookup {
        slot: String,
    },
    Retarget {
        origin: String,
        target: String,
        identity: LogicalIdentity,
        hops: u32,
    },
    DumpSlots,
    AllocateProcess {
        workload: String,
    },
    AdjustLoad {
        index: usize,
        kind: LoadKind,
        delta: i32,
    },
    AdjustBindersByPid {
        pid: u32,
        delta: i32,
    },
    DumpPool,
    LookupByWorkload {
        workload: String,
    },
    LookupByPid {
        pid: u32,
    },
}

/// Answer from the owner process; one variant per result shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Response {
    Key(Option<PartitionKey>),
    Slot(Option<String>),
    Snapshot(Option<SlotSnapshot>),
    Accepted(bool),
    Slots(Vec<SlotSnapshot>),
    ProcessIndex(Option<usize>),
    Pool(Vec<ProcessSlotSnapshot>),
    Process(Option<ProcessInfo>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_tagged() {
        let req = Request::AllocateProcess {
            workload: "mail".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "allocate_process");
        assert_eq!(json["workload"], "mail");

        let json = serde_json::to_value(Response::ProcessIndex(Some(1))).unwrap();
        assert_eq!(json["type"], "process_index");
        assert_eq!(json["value"], 1);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let raw = r#"{"op":"lookup_by_pid","pid":7,"trace":"abc"}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(req, Request::LookupByPid { pid: 7 });
    }
}
