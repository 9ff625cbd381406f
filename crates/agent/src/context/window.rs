use devpilot_core::message::{Message, MessageToolCall};
use devpilot_core::session::{Session, Turn, TurnRecord};
use devpilot_core::tool::ToolOutcome;

use super::token::estimate_message_tokens;

/// Longest tool result (in chars) rendered verbatim into the context.
const MAX_RESULT_CHARS: usize = 4_000;

const DIGEST_REQUESTS: usize = 3;
const DIGEST_ACTIONS: usize = 8;
const DIGEST_CLIP: usize = 80;

/// Picks the most recent turns of a session under a turn and token budget.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    max_turns: usize,
    max_tokens: usize,
}

/// History ready to send to the model.
#[derive(Debug, Clone)]
pub struct RenderedHistory {
    pub messages: Vec<Message>,
    /// Number of leading turns replaced by the digest note
    pub omitted: usize,
    pub estimated_tokens: usize,
}

impl ContextWindow {
    pub fn new(max_turns: usize, max_tokens: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            max_tokens: max_tokens.max(1),
        }
    }

    /// Index of the first turn to keep.
    ///
    /// The kept suffix is built from whole units: a tool result is never
    /// kept without the invocation right before it. The newest unit is
    /// always kept, even when it alone exceeds the budget.
    pub fn cut_point(&self, turns: &[TurnRecord]) -> usize {
        let mut start = turns.len();
        let mut count = 0;
        let mut tokens = 0;

        while start > 0 {
            let unit_start = unit_start(turns, start - 1);
            let unit = &turns[unit_start..start];
            let unit_tokens: usize = unit
                .iter()
                .map(|r| estimate_message_tokens(&render_turn(&r.turn)))
                .sum();

            let newest = start == turns.len();
            if !newest && (count + unit.len() > self.max_turns || tokens + unit_tokens > self.max_tokens) {
                break;
            }

            count += unit.len();
            tokens += unit_tokens;
            start = unit_start;
        }

        start
    }

    /// Render the session's history into chat messages.
    pub fn render(&self, session: &Session) -> RenderedHistory {
        let turns = session.turns();
        let cut = self.cut_point(turns);

        let mut messages = Vec::with_capacity(turns.len() - cut + 1);
        if cut > 0 {
            messages.push(Message::system(digest(&turns[..cut])));
        }
        messages.extend(turns[cut..].iter().map(|r| render_turn(&r.turn)));

        let estimated_tokens = messages.iter().map(estimate_message_tokens).sum();
        RenderedHistory {
            messages,
            omitted: cut,
            estimated_tokens,
        }
    }
}

/// Start index of the unit ending at `end`.
fn unit_start(turns: &[TurnRecord], end: usize) -> usize {
    if let Turn::ToolResult { call_id, .. } = &turns[end].turn {
        if end > 0 {
            if let Turn::ToolInvocation { call_id: inv, .. } = &turns[end - 1].turn {
                if inv == call_id {
                    return end - 1;
                }
            }
        }
    }
    end
}

/// Render one turn as the chat message the model expects.
pub fn render_turn(turn: &Turn) -> Message {
    match turn {
        Turn::UserMessage { text } => Message::user(text.clone()),
        Turn::AgentDecision { text, .. } => Message::assistant(text.clone()),
        Turn::ToolInvocation {
            call_id,
            tool_name,
            arguments,
        } => Message::tool_request(MessageToolCall {
            id: call_id.clone(),
            name: tool_name.clone(),
            arguments: arguments.to_string(),
        }),
        Turn::ToolResult { call_id, outcome, .. } => {
            let body = serde_json::to_string(outcome).unwrap_or_default();
            Message::tool_result(call_id.clone(), clip(&body, MAX_RESULT_CHARS))
        }
    }
}

/// Deterministic summary of turns that fell out of the window.
fn digest(omitted: &[TurnRecord]) -> String {
    let requests: Vec<String> = omitted
        .iter()
        .filter_map(|r| match &r.turn {
            Turn::UserMessage { text } => Some(format!("\"{}\"", clip(text, DIGEST_CLIP))),
            _ => None,
        })
        .collect();

    let actions: Vec<String> = omitted
        .iter()
        .filter_map(|r| match &r.turn {
            Turn::ToolResult { tool_name, outcome, .. } => Some(match outcome {
                ToolOutcome::Success { .. } => format!("{tool_name} (succeeded)"),
                ToolOutcome::Failure { kind, .. } => format!("{tool_name} (failed: {})", kind.describe()),
            }),
            _ => None,
        })
        .collect();

    let mut lines = vec![format!(
        "Summary of {} earlier turn(s) no longer shown:",
        omitted.len()
    )];
    if !requests.is_empty() {
        let recent = &requests[requests.len().saturating_sub(DIGEST_REQUESTS)..];
        lines.push(format!("- Earlier requests: {}", recent.join("; ")));
    }
    if !actions.is_empty() {
        let recent = &actions[actions.len().saturating_sub(DIGEST_ACTIONS)..];
        lines.push(format!("- Actions taken: {}", recent.join(", ")));
    }
    lines.join("\n")
}

/// Truncate to at most `max` chars on a char boundary.
pub(crate) fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}
