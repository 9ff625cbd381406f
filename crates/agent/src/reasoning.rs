//! The reasoning step: one model round-trip producing one [`Decision`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devpilot_core::decision::{Decision, ModelFault};
use devpilot_core::message::Message;
use devpilot_core::provider::{Provider, ProviderRequest};
use devpilot_core::session::{Session, Turn};
use devpilot_core::tool::ToolRegistry;
use tracing::{debug, warn};

use crate::context::ContextWindow;
use crate::context::token::{estimate_messages_tokens, estimate_tools_tokens};
use crate::parse::DecisionParser;
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, clarify_definition, entities_note};

/// Text of the degraded answer given when the model cannot be reached.
pub const RETRY_TEXT: &str = "I could not process that, please retry.";

/// Produces the next decision for a session.
#[async_trait]
pub trait ReasoningStep: Send + Sync {
    async fn decide(&self, session: &Session) -> Decision;
}

/// Reasoning step backed by a chat-completions model.
pub struct ModelReasoner {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Tool catalogue offered to the model
    tools: Arc<ToolRegistry>,

    /// History budget
    window: ContextWindow,

    system_prompt: String,

    /// Upper bound on one model call
    model_timeout: Duration,
}

impl ModelReasoner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tools,
            window: ContextWindow::new(40, 6_000),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_window(mut self, window: ContextWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Build the full request for the current session state.
    pub fn build_request(&self, session: &Session) -> ProviderRequest {
        let history = self.window.render(session);
        if history.omitted > 0 {
            debug!(
                session_id = %session.id(),
                omitted = history.omitted,
                estimated_tokens = history.estimated_tokens,
                "History truncated for context window"
            );
        }

        let mut messages = Vec::with_capacity(history.messages.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        if let Some(note) = entities_note(session.entities()) {
            messages.push(Message::system(note));
        }
        messages.extend(history.messages);

        let mut tools = self.tools.definitions();
        tools.push(clarify_definition());

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        }
    }
}

#[async_trait]
impl ReasoningStep for ModelReasoner {
    async fn decide(&self, session: &Session) -> Decision {
        let request = self.build_request(session);
        debug!(
            session_id = %session.id(),
            provider = self.provider.name(),
            messages = request.messages.len(),
            estimated_tokens = estimate_messages_tokens(&request.messages) + estimate_tools_tokens(&request.tools),
            "Calling model"
        );

        let response = match tokio::time::timeout(self.model_timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(session_id = %session.id(), error = %e, "Model call failed");
                return Decision::degraded(RETRY_TEXT, ModelFault::Unavailable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    session_id = %session.id(),
                    timeout_secs = self.model_timeout.as_secs(),
                    "Model call timed out"
                );
                return Decision::degraded(RETRY_TEXT, ModelFault::TimedOut);
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Model usage"
            );
        }

        let fallback_id = format!("call_{}", session.last_seq() + 1);
        DecisionParser::new(&self.tools)
            .after_tools(tools_ran_for_current_message(session))
            .parse(&response.message, &fallback_id)
    }
}

/// Whether a tool result was recorded since the latest user message.
fn tools_ran_for_current_message(session: &Session) -> bool {
    session
        .turns()
        .iter()
        .rev()
        .take_while(|r| !matches!(r.turn, Turn::UserMessage { .. }))
        .any(|r| matches!(r.turn, Turn::ToolResult { .. }))
}
