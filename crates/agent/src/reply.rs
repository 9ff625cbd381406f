//! Turns the loop's conclusion and tool results into the reply text.

use devpilot_core::decision::ModelFault;
use devpilot_core::tool::ToolOutcome;
use serde::{Deserialize, Serialize};

use crate::context::window::clip;
use crate::reasoning::RETRY_TEXT;

const DETAIL_CLIP: usize = 200;

/// How the dispatch loop ended for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Conclusion {
    Answer(String),
    Clarify(String),
    ModelFault(ModelFault),
    StepLimit { max: usize },
    Deadline,
}

/// One tool call made while handling the current message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExchange {
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Answered,
    NeedsClarification,
    ModelUnavailable,
    StepLimitReached,
    DeadlineExceeded,
}

/// What the caller gets back for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub status: ReplyStatus,
    /// Tool calls made while handling this message
    pub tool_invocations: usize,
}

pub struct ResponseAssembler;

impl ResponseAssembler {
    /// Build the reply text. Pure: same input, same output.
    pub fn assemble(conclusion: &Conclusion, exchanges: &[ToolExchange]) -> String {
        match conclusion {
            Conclusion::Answer(text) if !text.trim().is_empty() => text.clone(),
            Conclusion::Answer(_) => {
                if exchanges.is_empty() {
                    "Done.".to_string()
                } else {
                    format!("Here is what I did:\n{}", progress(exchanges))
                }
            }
            Conclusion::Clarify(question) => question.clone(),
            Conclusion::ModelFault(_) => with_progress(RETRY_TEXT, exchanges),
            Conclusion::StepLimit { max } => with_progress(
                &format!(
                    "I stopped after {max} operation(s) for this message without finishing. \
                     You can ask me to continue."
                ),
                exchanges,
            ),
            Conclusion::Deadline => with_progress(
                "Sorry, this took longer than allowed and I had to stop.",
                exchanges,
            ),
        }
    }

    pub fn status(conclusion: &Conclusion) -> ReplyStatus {
        match conclusion {
            Conclusion::Answer(_) => ReplyStatus::Answered,
            Conclusion::Clarify(_) => ReplyStatus::NeedsClarification,
            Conclusion::ModelFault(_) => ReplyStatus::ModelUnavailable,
            Conclusion::StepLimit { .. } => ReplyStatus::StepLimitReached,
            Conclusion::Deadline => ReplyStatus::DeadlineExceeded,
        }
    }
}

fn with_progress(lead: &str, exchanges: &[ToolExchange]) -> String {
    if exchanges.is_empty() {
        return lead.to_string();
    }
    format!("{lead}\nProgress so far:\n{}", progress(exchanges))
}

fn progress(exchanges: &[ToolExchange]) -> String {
    exchanges
        .iter()
        .map(|e| format!("- {}", describe_exchange(e)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per exchange; failures explain the kind before the raw detail.
pub fn describe_exchange(exchange: &ToolExchange) -> String {
    let action = exchange.tool_name.replace('_', " ");
    match &exchange.outcome {
        ToolOutcome::Success { .. } => format!("{action}: done"),
        ToolOutcome::Failure {
            kind,
            message,
            http_status,
        } => {
            let mut line = format!("{action}: failed because {}", kind.describe());
            if let Some(meaning) = http_status.and_then(status_meaning) {
                line.push_str(&format!(" ({meaning})"));
            }
            if !message.is_empty() {
                line.push_str(&format!(". Detail: {}", clip(message, DETAIL_CLIP)));
            }
            line
        }
    }
}

fn status_meaning(status: u16) -> Option<&'static str> {
    match status {
        400 | 422 => Some("the request was rejected as invalid"),
        401 | 403 => Some("access was denied"),
        404 => Some("the item was not found"),
        409 => Some("it conflicts with existing data"),
        429 => Some("too many requests, try again shortly"),
        500..=599 => Some("the service had an internal problem"),
        _ => None,
    }
}
