//! Dispatch results.

use crate::id::HandlerId;

/// What happened during one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The handler that consumed the event, if any.
    pub consumed_by: Option<HandlerId>,
    /// Number of handlers invoked, including the consuming one.
    pub invoked: usize,
    /// Handlers that panicked and were skipped under
    /// [`FailurePolicy::Isolate`](crate::FailurePolicy::Isolate).
    pub failures: Vec<HandlerId>,
}

impl DispatchOutcome {
    /// Returns true if some handler consumed the event.
    pub fn is_consumed(&self) -> bool {
        self.consumed_by.is_some()
    }
}
