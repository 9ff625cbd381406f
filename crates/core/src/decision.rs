//! The single output of one reasoning step.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated request to invoke one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Call id, echoed back in the matching tool result
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Why an answer was produced without the model's help.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ModelFault {
    /// The provider returned an error.
    Unavailable(String),
    /// The provider did not answer in time.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    /// Reply now with `text`. `fault` is set when the model failed and the
    /// text is a degraded fallback.
    Answer {
        text: String,
        fault: Option<ModelFault>,
    },
    Invoke(ToolRequest),
    Clarify {
        question: String,
    },
}

impl Decision {
    pub fn answer(text: impl Into<String>) -> Self {
        Decision::Answer {
            text: text.into(),
            fault: None,
        }
    }

    pub fn clarify(question: impl Into<String>) -> Self {
        Decision::Clarify {
            question: question.into(),
        }
    }

    pub fn invoke(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Decision::Invoke(ToolRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        })
    }

    pub fn degraded(text: impl Into<String>, fault: ModelFault) -> Self {
        Decision::Answer {
            text: text.into(),
            fault: Some(fault),
        }
    }

    /// Whether this decision ends the dispatch loop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Invoke(_))
    }
}

/// The kind of text a terminal decision produced, as recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Answer,
    Clarify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invoke_is_non_terminal() {
        assert!(Decision::answer("done").is_terminal());
        assert!(Decision::clarify("which project?").is_terminal());
        assert!(Decision::degraded("retry", ModelFault::TimedOut).is_terminal());
        assert!(!Decision::invoke("c1", "list_projects", serde_json::json!({})).is_terminal());
    }

    #[test]
    fn degraded_answer_keeps_fault() {
        let d = Decision::degraded("retry", ModelFault::Unavailable("502".into()));
        assert!(matches!(
            d,
            Decision::Answer { fault: Some(ModelFault::Unavailable(_)), .. }
        ));
    }
}
