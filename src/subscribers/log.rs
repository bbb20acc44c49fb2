//! # LogWriter: plain-text event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stderr, one line
//! each, prefixed with the severity.
//!
//! ## Example output
//! ```text
//! [info] slot-occupied slot=slot.N1NRNTS0 identity=mail/Inbox
//! [warn] forced-eviction slot=slot.N1NRNTS1 identity=mail/Compose count=1 reason=mail/Draft
//! [info] process-allocated workload=mail index=0
//! [warn] kill-wait-timeout index=1 pid=4242
//! ```

use std::fmt::Write as _;

use async_trait::async_trait;

use crate::events::{Event, EventKind, Level};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter {
    min_level: Option<Level>,
}

impl LogWriter {
    /// Construct a new [`LogWriter`] printing every event.
    #[must_use]
    pub fn new() -> Self {
        Self { min_level: None }
    }

    /// Only print events at `level` or above.
    #[must_use]
    pub fn with_min_level(level: Level) -> Self {
        Self {
            min_level: Some(level),
        }
    }

    fn render(e: &Event) -> String {
        let mut line = format!("[{}] {}", e.kind.level().as_str(), e.kind.as_label());
        if let Some(slot) = &e.slot {
            let _ = write!(line, " slot={slot}");
        }
        if let Some(identity) = &e.identity {
            let _ = write!(line, " identity={identity}");
        }
        if let Some(workload) = &e.workload {
            let _ = write!(line, " workload={workload}");
        }
        if let Some(index) = e.index {
            let _ = write!(line, " index={index}");
        }
        if let Some(pid) = e.pid {
            let _ = write!(line, " pid={pid}");
        }
        if let Some(count) = e.count {
            let _ = write!(line, " count={count}");
        }
        if let Some(reason) = &e.reason {
            let _ = write!(line, " reason={reason}");
        }
        line
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        eprintln!("{}", Self::render(e));
    }

    fn accepts(&self, kind: EventKind) -> bool {
        self.min_level.is_none_or(|min| kind.level() >= min)
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_present_fields_only() {
        let ev = Event::new(EventKind::ProcessKilled)
            .with_index(1)
            .with_pid(77)
            .with_workload("mail");
        assert_eq!(
            LogWriter::render(&ev),
            "[info] process-killed workload=mail index=1 pid=77"
        );
    }

    #[test]
    fn min_level_filters_by_kind() {
        let w = LogWriter::with_min_level(Level::Warn);
        assert!(w.accepts(EventKind::ForcedEviction));
        assert!(!w.accepts(EventKind::SlotOccupied));
        assert!(LogWriter::new().accepts(EventKind::SlotOccupied));
    }
}
