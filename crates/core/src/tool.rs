//! Tool trait, the abstraction over backend operations.
//!
//! Tools are what let the assistant act: create projects, move tasks,
//! reschedule work. Each tool declares a typed [`ToolSchema`]; the
//! [`ToolRegistry`] validates arguments against it and turns every possible
//! failure into a [`ToolOutcome`] so the dispatch loop never sees an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::ToolSchema;

/// Category of a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidArguments,
    RemoteError,
    Timeout,
    UnknownTool,
}

impl FailureKind {
    /// Plain-language explanation suitable for a user-facing reply.
    pub fn describe(&self) -> &'static str {
        match self {
            FailureKind::InvalidArguments => "some details were missing or invalid",
            FailureKind::RemoteError => "the project service reported an error",
            FailureKind::Timeout => "the project service did not respond in time",
            FailureKind::UnknownTool => "that operation is not available",
        }
    }
}

/// The result of one tool invocation, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success {
        data: Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
        /// HTTP status reported by the backend, when there was one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
    },
}

impl ToolOutcome {
    pub fn success(data: Value) -> Self {
        ToolOutcome::Success { data }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ToolOutcome::Failure {
            kind,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ToolOutcome::Failure { kind, .. } => Some(*kind),
            ToolOutcome::Success { .. } => None,
        }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(err: ToolError) -> Self {
        let message = err.to_string();
        match err {
            ToolError::NotFound(_) | ToolError::DuplicateName(_) => {
                ToolOutcome::failure(FailureKind::UnknownTool, message)
            }
            ToolError::InvalidArguments(_) => ToolOutcome::failure(FailureKind::InvalidArguments, message),
            ToolError::Remote { status, .. } => ToolOutcome::Failure {
                kind: FailureKind::RemoteError,
                message,
                http_status: status,
            },
            ToolError::Timeout { .. } => ToolOutcome::failure(FailureKind::Timeout, message),
        }
    }
}

/// The core Tool trait.
///
/// Implementations perform at most one remote call per `execute` and never
/// retry on their own.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_task").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Typed input schema.
    fn schema(&self) -> &ToolSchema;

    /// Execute the tool with arguments that already passed `schema()`.
    async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json_schema(),
        }
    }
}

/// The fixed catalogue of tools the assistant may call.
///
/// Built once at startup and shared read-only afterwards.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
    call_timeout: Duration,
}

impl ToolRegistry {
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> std::result::Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All tools, ordered by name.
    pub fn list(&self) -> Vec<&dyn Tool> {
        self.tools.values().map(|t| t.as_ref()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Validate and run one tool call.
    ///
    /// Arguments that fail the schema never reach the tool. The call is
    /// bounded by the registry's timeout and is never retried.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> ToolOutcome {
        let tool = match self.lookup(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = name, "Unknown tool requested");
                return e.into();
            }
        };

        if let Err(violation) = tool.schema().validate(arguments) {
            debug!(tool = name, %violation, "Rejected tool arguments");
            return ToolOutcome::failure(FailureKind::InvalidArguments, violation.to_string());
        }

        let started = Instant::now();
        let result = tokio::time::timeout(self.call_timeout, tool.execute(arguments.clone())).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(data)) => {
                debug!(tool = name, duration_ms, "Tool succeeded");
                ToolOutcome::success(data)
            }
            Ok(Err(e)) => {
                warn!(tool = name, duration_ms, error = %e, "Tool failed");
                e.into()
            }
            Err(_) => {
                warn!(tool = name, duration_ms, "Tool timed out");
                ToolError::Timeout {
                    timeout_secs: self.call_timeout.as_secs(),
                }
                .into()
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
