use crate::slots::LogicalIdentity;
use crate::slots::identity::FIELD_SEPARATOR;

/// Persisted slot assignment.
///
/// Encoded as `workload:component:timestamp`. Decoding accepts trailing
/// fields so later writers may append data older readers ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub identity: LogicalIdentity,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Assignment {
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.identity.workload(),
            self.identity.component(),
            self.timestamp,
            sep = FIELD_SEPARATOR
        )
    }

    /// Returns `None` for anything that is not a well-formed record.
    pub fn decode(raw: &str) -> Option<Self> {
        let mut fields = raw.split(FIELD_SEPARATOR);
        let workload = fields.next()?;
        let component = fields.next()?;
        let timestamp = fields.next()?.trim().parse::<i64>().ok()?;
        let identity = LogicalIdentity::new(workload, component);
        identity.is_well_formed().then_some(Self {
            identity,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_encoded_value() {
        let a = Assignment {
            identity: LogicalIdentity::new("mail", "Inbox"),
            timestamp: 1_700_000_000_123,
        };
        assert_eq!(a.encode(), "mail:Inbox:1700000000123");
        assert_eq!(Assignment::decode(&a.encode()), Some(a));
    }

    #[test]
    fn decode_ignores_trailing_fields() {
        let a = Assignment::decode("mail:Inbox:42:extra:more").unwrap();
        assert_eq!(a.identity, LogicalIdentity::new("mail", "Inbox"));
        assert_eq!(a.timestamp, 42);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(Assignment::decode(""), None);
        assert_eq!(Assignment::decode("mail:Inbox"), None);
        assert_eq!(Assignment::decode("mail:Inbox:soon"), None);
        assert_eq!(Assignment::decode(":Inbox:1"), None);
    }
}
