//! What a registry does when a handler panics mid-dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Panic handling during dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// The panic unwinds out of dispatch. Lower-priority handlers do not run
    /// for that event. The registry itself is left untouched.
    #[default]
    Propagate,
    /// The panic is caught and logged, the handler counts as not having
    /// consumed the event and dispatch moves on to the next handler.
    Isolate,
}

impl FailurePolicy {
    /// Returns the policy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propagate => "propagate",
            Self::Isolate => "isolate",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
