//! # DevPilot Core
//!
//! Domain types, traits, and error definitions for the DevPilot assistant.
//! Everything here is framework-free: the session model, the decisions the
//! reasoning step can produce, the tool catalogue abstraction and the
//! provider seam that the model sits behind.
//!
//! ## Layout
//!
//! - [`session`]: append-only conversation history plus carried entities
//! - [`decision`]: the single output of one reasoning step
//! - [`schema`]: typed tool input schemas and argument validation
//! - [`tool`]: the `Tool` trait and the `ToolRegistry`
//! - [`provider`]: the `Provider` trait over language-model backends
//! - [`event`]: domain events broadcast by the dispatch loop

pub mod error;
pub mod message;
pub mod provider;
pub mod schema;
pub mod session;
pub mod decision;
pub mod tool;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, ProviderError, ToolError, SessionError};
pub use message::{Message, Role, MessageToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use schema::{FieldKind, FieldSpec, SchemaViolation, ToolSchema};
pub use session::{Session, SessionId, Turn, TurnRecord};
pub use decision::{Decision, DecisionKind, ModelFault, ToolRequest};
pub use tool::{FailureKind, Tool, ToolOutcome, ToolRegistry};
pub use event::{DomainEvent, EventBus};
