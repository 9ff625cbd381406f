//! System prompt and the built-in clarification pseudo-tool.

use std::collections::BTreeMap;

use devpilot_core::provider::ToolDefinition;
use serde_json::{Value, json};

/// Name of the pseudo-tool the model calls to ask the user a question.
pub const CLARIFY_TOOL: &str = "ask_clarification";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are DevPilot, a friendly assistant that helps the user manage software projects and tasks.

Use the available tools to create, inspect, update and delete projects and tasks on the user's behalf.

Rules:
- Never call a tool when the request is ambiguous or a required detail is missing. \
Ask one specific question instead, using the ask_clarification tool.
  Example: \"create a new project\" -> ask \"What is the new project's name?\"
  Example: \"change this task's status\" -> ask \"Which task, and to what status?\"
- Priority is an integer from 1 (highest) to 5 (lowest).
- Dates use the YYYY-MM-DD format.
- Project status is one of ACTIVE, ARCHIVED, COMPLETED. Task status is one of TODO, IN_PROGRESS, DONE, BLOCKED.
- After a tool succeeds, confirm what changed in one or two sentences.
- If a tool fails, explain the problem plainly and suggest what the user can do next.";

/// Definition of the clarification pseudo-tool sent alongside the real ones.
pub fn clarify_definition() -> ToolDefinition {
    ToolDefinition {
        name: CLARIFY_TOOL.into(),
        description: "Ask the user one specific question when the request is ambiguous or a required detail is missing.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                }
            },
            "required": ["question"],
            "additionalProperties": false
        }),
    }
}

/// Note describing entities carried over from earlier turns, if any.
pub fn entities_note(entities: &BTreeMap<String, Value>) -> Option<String> {
    if entities.is_empty() {
        return None;
    }
    let items: Vec<String> = entities
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key} = {s}"),
            other => format!("{key} = {other}"),
        })
        .collect();
    Some(format!(
        "Recently referenced in this conversation: {}. Use these when the user says \"this project\" or \"that task\".",
        items.join(", ")
    ))
}
