//! Handler identifiers.

use std::fmt;

/// Opaque identifier of a registered handler.
///
/// Ids come from a per-registry monotonic counter, so two registrations on
/// the same registry never share an id. Keep the id to remove the handler
/// later; losing it leaves the handler registered until the registry is
/// cleared or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(HandlerId::from_raw(7).to_string(), "handler-7");
    }
}
