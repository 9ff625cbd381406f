//! Bounded conversation context for the reasoning step.
//!
//! The model only ever sees the most recent part of a session. The window
//! picks that suffix under a turn and token budget, renders it into chat
//! messages and replaces the omitted prefix with a short digest.

pub mod token;
pub mod window;

pub use window::{ContextWindow, RenderedHistory};
