//! # Backstack Core
//!
//! The handler chain behind a single "back" navigation signal.
//!
//! Components that want a say in what the back button does (a modal that
//! should close itself, a drawer that should collapse, a navigation stack
//! that should pop) register a handler with a priority. When the signal
//! fires, handlers run from highest to lowest priority until one of them
//! reports that it consumed the event.
//!
//! ## Building Blocks
//!
//! - **Registry**: [`HandlerRegistry`] owns the ordered handler list
//! - **Handlers**: [`BackHandler`] is implemented for any `Fn() -> bool`
//! - **Ordering**: [`Priority`] gives every real number a total order
//! - **Results**: [`DispatchOutcome`] reports who consumed an event
//! - **Sources**: [`BackEventSource`] and [`Subscription`] connect a registry
//!   to whatever produces the signal
//!
//! ```rust
//! use backstack_core::HandlerRegistry;
//!
//! let registry = HandlerRegistry::new();
//! let modal = registry.add(|| true, 10);
//! let _stack = registry.add(|| false, 0);
//!
//! let outcome = registry.dispatch_outcome();
//! assert_eq!(outcome.consumed_by, Some(modal));
//! ```

pub mod error;
pub mod handler;
pub mod id;
pub mod outcome;
pub mod policy;
pub mod priority;
pub mod registry;
pub mod source;

pub use error::{SourceError, SourceResult};
pub use handler::{BackHandler, BoxedHandler};
pub use id::HandlerId;
pub use outcome::DispatchOutcome;
pub use policy::FailurePolicy;
pub use priority::Priority;
pub use registry::{HandlerGuard, HandlerRegistry};
pub use source::{BackEventSource, BackListener, Subscription};
