//! Shared test doubles: scripted model, scripted reasoner and spy tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use devpilot_core::decision::Decision;
use devpilot_core::error::{ProviderError, ToolError};
use devpilot_core::message::{Message, MessageToolCall};
use devpilot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use devpilot_core::schema::{FieldKind, ToolSchema};
use devpilot_core::session::{Session, TurnRecord};
use devpilot_core::tool::{Tool, ToolRegistry};
use serde_json::{Value, json};

use crate::reasoning::ReasoningStep;

/// A provider that replays scripted assistant messages in order.
///
/// Once the script runs out it answers "Done.".
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Message>>,
    failure: Option<ProviderError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            failure: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(vec![])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// An assistant message requesting one tool call.
    pub fn call(name: &str, arguments: Value) -> Message {
        Message::tool_request(MessageToolCall {
            id: String::new(),
            name: name.into(),
            arguments: arguments.to_string(),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let message = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Message::assistant("Done."));
        Ok(ProviderResponse {
            message,
            usage: None,
            model,
        })
    }
}

/// A reasoning step that replays decisions and records every session it saw.
pub struct ScriptedReasoner {
    decisions: Mutex<VecDeque<Decision>>,
    seen: Mutex<Vec<Vec<TurnRecord>>>,
}

impl ScriptedReasoner {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Vec<TurnRecord>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningStep for ScriptedReasoner {
    async fn decide(&self, session: &Session) -> Decision {
        self.seen.lock().unwrap().push(session.turns().to_vec());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Decision::answer("Done."))
    }
}

/// Counts real executions; `task_id` is required.
pub struct SpyTool {
    schema: ToolSchema,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for SpyTool {
    fn name(&self) -> &str {
        "spy_task"
    }

    fn description(&self) -> &str {
        "Fetch a task (test double)"
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "task_id": arguments["task_id"], "task": { "title": "Spy" } }))
    }
}

/// A registry holding only [`SpyTool`], plus its call counter.
pub fn registry_with_spy() -> (ToolRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry
        .register(Box::new(SpyTool {
            schema: ToolSchema::new().required("task_id", FieldKind::integer(), "Task id"),
            calls: calls.clone(),
        }))
        .unwrap();
    (registry, calls)
}

/// Always reports a backend timeout.
pub struct TimeoutTool;

#[async_trait]
impl Tool for TimeoutTool {
    fn name(&self) -> &str {
        "timeout_task"
    }

    fn description(&self) -> &str {
        "Always times out (test double)"
    }

    fn schema(&self) -> &ToolSchema {
        static EMPTY: std::sync::OnceLock<ToolSchema> = std::sync::OnceLock::new();
        EMPTY.get_or_init(ToolSchema::new)
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::Timeout { timeout_secs: 15 })
    }
}

/// Slow read-modify-write on a plain counter.
///
/// Overlapping executions lose updates, so the final count shows whether
/// calls were serialized.
pub struct SlowCounterTool {
    schema: ToolSchema,
    delay: Duration,
    counter: Arc<Mutex<u64>>,
}

impl SlowCounterTool {
    pub fn new(delay: Duration) -> (Self, Arc<Mutex<u64>>) {
        let counter = Arc::new(Mutex::new(0));
        let tool = Self {
            schema: ToolSchema::new(),
            delay,
            counter: counter.clone(),
        };
        (tool, counter)
    }
}

#[async_trait]
impl Tool for SlowCounterTool {
    fn name(&self) -> &str {
        "slow_task"
    }

    fn description(&self) -> &str {
        "Slowly increments a counter (test double)"
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        let current = *self.counter.lock().unwrap();
        tokio::time::sleep(self.delay).await;
        *self.counter.lock().unwrap() = current + 1;
        Ok(json!({ "count": current + 1 }))
    }
}
