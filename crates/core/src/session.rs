//! Session and Turn domain types.
//!
//! A session is the durable conversational context for one user. Its history
//! is an append-only sequence of turns; nothing outside this module can edit
//! or reorder a turn once it has been appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::decision::DecisionKind;
use crate::error::SessionError;
use crate::tool::ToolOutcome;

/// Opaque identifier chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One atomic event in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    UserMessage {
        text: String,
    },
    AgentDecision {
        kind: DecisionKind,
        text: String,
    },
    ToolInvocation {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        outcome: ToolOutcome,
    },
}

/// A turn plus its position and time of append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub turn: Turn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    turns: Vec<TurnRecord>,
    #[serde(default)]
    entities: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            entities: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Append a turn and return its sequence number.
    pub fn append(&mut self, turn: Turn) -> u64 {
        let seq = self.turns.last().map_or(1, |r| r.seq + 1);
        let now = Utc::now();
        self.turns.push(TurnRecord { seq, at: now, turn });
        self.updated_at = now;
        seq
    }

    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    /// Turns appended after `seq` (exclusive).
    pub fn turns_after(&self, seq: u64) -> &[TurnRecord] {
        let start = self.turns.partition_point(|r| r.seq <= seq);
        &self.turns[start..]
    }

    pub fn last_seq(&self) -> u64 {
        self.turns.last().map_or(0, |r| r.seq)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn entities(&self) -> &BTreeMap<String, Value> {
        &self.entities
    }

    pub fn entity(&self, key: &str) -> Option<&Value> {
        self.entities.get(key)
    }

    /// Remember an entity (e.g. the project currently being discussed).
    pub fn set_entity(&mut self, key: impl Into<String>, value: Value) {
        self.entities.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn forget_entity(&mut self, key: &str) -> Option<Value> {
        let removed = self.entities.remove(key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Verify the history invariants.
    ///
    /// Sequence numbers must strictly increase, and every tool invocation
    /// must be immediately followed by the result carrying the same call id.
    pub fn check_integrity(&self) -> Result<(), SessionError> {
        let corrupted = |reason: String| SessionError::Corrupted {
            id: self.id.to_string(),
            reason,
        };

        for pair in self.turns.windows(2) {
            if pair[1].seq <= pair[0].seq {
                return Err(corrupted(format!("turn {} is out of order", pair[1].seq)));
            }
        }

        let mut open: Option<(&str, u64)> = None;
        for record in &self.turns {
            match (&record.turn, open) {
                (Turn::ToolResult { call_id, .. }, Some((pending, _))) if call_id == pending => {
                    open = None;
                }
                (Turn::ToolResult { call_id, .. }, _) => {
                    return Err(corrupted(format!(
                        "tool result {call_id} at turn {} has no matching invocation",
                        record.seq
                    )));
                }
                (_, Some((pending, seq))) => {
                    return Err(corrupted(format!(
                        "tool invocation {pending} at turn {seq} has no result"
                    )));
                }
                (Turn::ToolInvocation { call_id, .. }, None) => {
                    open = Some((call_id.as_str(), record.seq));
                }
                _ => {}
            }
        }

        match open {
            Some((pending, seq)) => Err(corrupted(format!(
                "tool invocation {pending} at turn {seq} has no result"
            ))),
            None => Ok(()),
        }
    }
}
