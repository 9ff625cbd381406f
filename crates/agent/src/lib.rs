//! The DevPilot agent: turns one user message into a reply.
//!
//! Each message runs through a small state machine:
//!
//! 1. **Append** the message to the session's history
//! 2. **Reason**: render a bounded context and ask the model for one decision
//! 3. **Invoke** the chosen tool, record its outcome, and go back to step 2
//! 4. **Reply** once the model answers or asks a question, or when the step
//!    budget or deadline runs out
//!
//! [`Assistant`] adds per-session locking, the session store and the
//! optional on-disk archive on top of the loop.

pub mod archive;
pub mod assistant;
pub mod bootstrap;
pub mod context;
pub mod dispatch;
pub mod parse;
pub mod prompt;
pub mod reasoning;
pub mod reply;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use archive::{JsonFileArchive, SessionArchive};
pub use assistant::Assistant;
pub use bootstrap::{build_assistant, build_assistant_with};
pub use context::{ContextWindow, RenderedHistory};
pub use dispatch::{DispatchLoop, Limit};
pub use parse::DecisionParser;
pub use reasoning::{ModelReasoner, ReasoningStep};
pub use reply::{Conclusion, Reply, ReplyStatus, ResponseAssembler, ToolExchange};
pub use store::{EvictionPolicy, NoEviction, SessionHandle, SessionStore, TtlEviction};
