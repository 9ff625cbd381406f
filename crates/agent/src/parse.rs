//! Turns a raw model response into exactly one [`Decision`].

use devpilot_core::decision::Decision;
use devpilot_core::message::Message;
use devpilot_core::schema::SchemaViolation;
use devpilot_core::tool::{Tool, ToolRegistry};
use serde_json::Value;
use tracing::{debug, warn};

use crate::prompt::CLARIFY_TOOL;

const AMBIGUOUS: &str = "I'm not sure what you'd like me to do. Could you describe it in a bit more detail?";

/// Interprets model output against the tool catalogue.
///
/// The model is never allowed to push malformed arguments to the backend:
/// anything that does not name a known tool with valid arguments becomes a
/// clarifying question.
pub struct DecisionParser<'a> {
    registry: &'a ToolRegistry,
    /// A tool already ran for the current message
    after_tools: bool,
}

impl<'a> DecisionParser<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self {
            registry,
            after_tools: false,
        }
    }

    /// Once a tool has run, a text reply ending in '?' is a closing remark
    /// ("Anything else?"), not a clarification.
    pub fn after_tools(mut self, ran: bool) -> Self {
        self.after_tools = ran;
        self
    }

    /// Parse one assistant message. `fallback_id` is used when the model
    /// omitted a call id.
    pub fn parse(&self, message: &Message, fallback_id: &str) -> Decision {
        if let Some((first, rest)) = message.tool_calls.split_first() {
            if !rest.is_empty() {
                let dropped: Vec<&str> = rest.iter().map(|c| c.name.as_str()).collect();
                warn!(kept = %first.name, ?dropped, "Model requested several tools; running only the first");
            }

            let id = if first.id.is_empty() {
                fallback_id.to_string()
            } else {
                first.id.clone()
            };
            return self.parse_call(&id, &first.name, &first.arguments);
        }

        let text = message.content.trim();
        if text.is_empty() {
            debug!("Empty model reply treated as ambiguous intent");
            return Decision::clarify(AMBIGUOUS);
        }
        if text.ends_with('?') && !self.after_tools {
            return Decision::clarify(text);
        }
        Decision::answer(text)
    }

    fn parse_call(&self, id: &str, name: &str, raw_arguments: &str) -> Decision {
        let arguments: Value = if raw_arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(raw_arguments) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = name, error = %e, "Model sent unparseable tool arguments");
                    return Decision::clarify(AMBIGUOUS);
                }
            }
        };

        if name == CLARIFY_TOOL {
            let question = arguments
                .get("question")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .unwrap_or(AMBIGUOUS);
            return Decision::clarify(question);
        }

        let tool = match self.registry.lookup(name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = name, "Model requested an unknown tool");
                return Decision::clarify(
                    "I can't do that directly. Could you rephrase what you'd like to change about your projects or tasks?",
                );
            }
        };

        match tool.schema().validate(&arguments) {
            Ok(()) => Decision::invoke(id, name, arguments),
            Err(violation) => {
                debug!(tool = name, %violation, "Model arguments failed validation");
                Decision::clarify(question_for(tool, &violation))
            }
        }
    }
}

/// Phrase a schema violation as a question for the user.
fn question_for(tool: &dyn Tool, violation: &SchemaViolation) -> String {
    if !violation.missing.is_empty() {
        let wanted: Vec<String> = violation
            .missing
            .iter()
            .map(|field| match tool.schema().field_spec(field) {
                Some(spec) if !spec.description.is_empty() => spec.description.to_lowercase(),
                _ => field.replace('_', " "),
            })
            .collect();
        return format!(
            "To do that I still need the following: {}. Could you provide {}?",
            wanted.join(", "),
            if wanted.len() == 1 { "it" } else { "them" }
        );
    }
    format!(
        "Some of the details don't look right ({}). Could you check them?",
        violation.issues.join("; ")
    )
}
