//! The dispatch loop: alternates reasoning steps and tool calls until the
//! message is answered or a limit is hit.

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use chrono::Utc;
use devpilot_core::decision::{Decision, DecisionKind, ModelFault, ToolRequest};
use devpilot_core::error::SessionError;
use devpilot_core::event::{DomainEvent, EventBus};
use devpilot_core::session::{Session, Turn};
use devpilot_core::tool::{FailureKind, ToolOutcome, ToolRegistry};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::window::clip;
use crate::reasoning::ReasoningStep;
use crate::reply::{Conclusion, Reply, ResponseAssembler, ToolExchange};

/// Entities carried between messages.
const CARRIED_ENTITIES: &[&str] = &["project_id", "task_id"];

/// Which limit stopped the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    StepBudget,
    Deadline,
}

#[derive(Debug)]
enum LoopState {
    AwaitingDecision,
    Invoking(ToolRequest),
    Answering { text: String, fault: Option<ModelFault> },
    Clarifying(String),
    Exhausted(Limit),
    Terminal(Reply),
}

/// Bookkeeping for one incoming message.
struct Run {
    deadline: Instant,
    step: usize,
    exchanges: Vec<ToolExchange>,
}

/// Orchestrates reasoning and tool execution for one message at a time.
pub struct DispatchLoop {
    /// Decides what to do next
    reasoner: Arc<dyn ReasoningStep>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Maximum tool invocations per message
    max_steps: usize,

    /// Outer bound on handling one message
    deadline: Duration,
}

impl DispatchLoop {
    pub fn new(reasoner: Arc<dyn ReasoningStep>, tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            reasoner,
            tools,
            event_bus,
            max_steps: 5,
            deadline: Duration::from_secs(120),
        }
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one user message against `session`.
    ///
    /// Only a corrupted session is an error; every other path ends in a
    /// reply and exactly one appended `AgentDecision`.
    pub async fn handle(&self, session: &mut Session, user_text: &str) -> Result<Reply, SessionError> {
        session.check_integrity()?;

        let session_id = session.id().to_string();
        info!(session_id = %session_id, "Handling message");
        self.event_bus.publish(DomainEvent::MessageReceived {
            session_id: session_id.clone(),
            content_preview: clip(user_text, 100),
            timestamp: Utc::now(),
        });

        session.append(Turn::UserMessage {
            text: user_text.to_string(),
        });

        let mut run = Run {
            deadline: Instant::now() + self.deadline,
            step: 0,
            exchanges: Vec::new(),
        };
        let mut state = LoopState::AwaitingDecision;

        loop {
            state = match state {
                LoopState::Terminal(reply) => {
                    info!(
                        session_id = %session_id,
                        status = ?reply.status,
                        tool_invocations = reply.tool_invocations,
                        "Reply ready"
                    );
                    self.event_bus.publish(DomainEvent::ReplySent {
                        session_id,
                        status: format!("{:?}", reply.status),
                        tool_invocations: reply.tool_invocations,
                        timestamp: Utc::now(),
                    });
                    return Ok(reply);
                }
                other => self.transition(other, session, &mut run).await,
            };
        }
    }

    async fn transition(&self, state: LoopState, session: &mut Session, run: &mut Run) -> LoopState {
        match state {
            LoopState::AwaitingDecision => self.await_decision(session, run).await,
            LoopState::Invoking(request) => self.invoke(request, session, run).await,
            LoopState::Answering { text, fault } => {
                let conclusion = match fault {
                    Some(fault) => Conclusion::ModelFault(fault),
                    None => Conclusion::Answer(text),
                };
                self.conclude(conclusion, session, run)
            }
            LoopState::Clarifying(question) => self.conclude(Conclusion::Clarify(question), session, run),
            LoopState::Exhausted(Limit::StepBudget) => {
                self.conclude(Conclusion::StepLimit { max: self.max_steps }, session, run)
            }
            LoopState::Exhausted(Limit::Deadline) => self.conclude(Conclusion::Deadline, session, run),
            LoopState::Terminal(reply) => LoopState::Terminal(reply),
        }
    }

    async fn await_decision(&self, session: &Session, run: &mut Run) -> LoopState {
        if Instant::now() >= run.deadline {
            warn!(session_id = %session.id(), step = run.step, "Deadline passed; not reasoning further");
            return LoopState::Exhausted(Limit::Deadline);
        }
        run.step += 1;
        let decision = match tokio::time::timeout_at(run.deadline, self.reasoner.decide(session)).await {
            Ok(decision) => decision,
            Err(_) => {
                warn!(session_id = %session.id(), step = run.step, "Deadline reached while reasoning");
                return LoopState::Exhausted(Limit::Deadline);
            }
        };

        let label = match &decision {
            Decision::Answer { fault: None, .. } => "answer".to_string(),
            Decision::Answer { fault: Some(_), .. } => "degraded_answer".to_string(),
            Decision::Invoke(request) => format!("invoke:{}", request.name),
            Decision::Clarify { .. } => "clarify".to_string(),
        };
        debug!(session_id = %session.id(), step = run.step, decision = %label, "Decision made");
        self.event_bus.publish(DomainEvent::DecisionMade {
            session_id: session.id().to_string(),
            step: run.step,
            decision: label,
            timestamp: Utc::now(),
        });

        match decision {
            Decision::Invoke(request) => LoopState::Invoking(request),
            Decision::Answer { text, fault } => LoopState::Answering { text, fault },
            Decision::Clarify { question } => LoopState::Clarifying(question),
        }
    }

    async fn invoke(&self, request: ToolRequest, session: &mut Session, run: &mut Run) -> LoopState {
        if run.exchanges.len() >= self.max_steps {
            warn!(
                session_id = %session.id(),
                tool = %request.name,
                max_steps = self.max_steps,
                "Step budget exhausted; not running further tools"
            );
            return LoopState::Exhausted(Limit::StepBudget);
        }
        if Instant::now() >= run.deadline {
            warn!(session_id = %session.id(), tool = %request.name, "Deadline passed; not running tool");
            return LoopState::Exhausted(Limit::Deadline);
        }

        let started = StdInstant::now();
        let outcome =
            match tokio::time::timeout_at(run.deadline, self.tools.invoke(&request.name, &request.arguments)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(session_id = %session.id(), tool = %request.name, "Deadline reached during tool call");
                    ToolOutcome::failure(
                        FailureKind::Timeout,
                        "the request deadline passed before the operation finished",
                    )
                }
            };
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            session_id = %session.id(),
            step = run.step,
            tool = %request.name,
            success = outcome.is_success(),
            duration_ms,
            "Tool executed"
        );
        self.event_bus.publish(DomainEvent::ToolExecuted {
            session_id: session.id().to_string(),
            tool_name: request.name.clone(),
            success: outcome.is_success(),
            duration_ms,
            timestamp: Utc::now(),
        });

        // Appended as a pair: a dropped future never leaves a dangling invocation.
        session.append(Turn::ToolInvocation {
            call_id: request.id.clone(),
            tool_name: request.name.clone(),
            arguments: request.arguments.clone(),
        });
        session.append(Turn::ToolResult {
            call_id: request.id.clone(),
            tool_name: request.name.clone(),
            outcome: outcome.clone(),
        });
        remember_entities(session, &request, &outcome);

        run.exchanges.push(ToolExchange {
            tool_name: request.name,
            outcome,
        });
        LoopState::AwaitingDecision
    }

    fn conclude(&self, conclusion: Conclusion, session: &mut Session, run: &Run) -> LoopState {
        let text = ResponseAssembler::assemble(&conclusion, &run.exchanges);
        let status = ResponseAssembler::status(&conclusion);
        let kind = match conclusion {
            Conclusion::Clarify(_) => DecisionKind::Clarify,
            _ => DecisionKind::Answer,
        };

        session.append(Turn::AgentDecision {
            kind,
            text: text.clone(),
        });

        LoopState::Terminal(Reply {
            text,
            status,
            tool_invocations: run.exchanges.len(),
        })
    }
}

/// Track the project and task the conversation is about.
fn remember_entities(session: &mut Session, request: &ToolRequest, outcome: &ToolOutcome) {
    for key in CARRIED_ENTITIES {
        if let Some(value) = request.arguments.get(*key).filter(|v| !v.is_null()) {
            session.set_entity(*key, value.clone());
        }
    }

    let ToolOutcome::Success { data } = outcome else {
        return;
    };
    for key in CARRIED_ENTITIES {
        if data.get(format!("deleted_{key}")).is_some() {
            session.forget_entity(key);
        } else if let Some(value) = data.get(*key).filter(|v| !v.is_null()) {
            session.set_entity(*key, value.clone());
        }
    }
}
