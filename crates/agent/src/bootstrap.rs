//! Wires configuration into a ready [`Assistant`].

use std::sync::Arc;
use std::time::Duration;

use devpilot_config::AppConfig;
use devpilot_core::error::Error;
use devpilot_core::event::EventBus;
use devpilot_core::provider::Provider;
use devpilot_providers::build_from_config;
use devpilot_tools::{BackendClient, default_registry};
use tracing::info;

use crate::archive::JsonFileArchive;
use crate::assistant::Assistant;
use crate::context::ContextWindow;
use crate::dispatch::DispatchLoop;
use crate::reasoning::ModelReasoner;
use crate::store::{EvictionPolicy, NoEviction, SessionStore, TtlEviction};

/// Build the assistant using the configured default provider.
pub fn build_assistant(config: &AppConfig) -> Result<Assistant, Error> {
    let router = build_from_config(config);
    let provider = router.default().ok_or_else(|| Error::Config {
        message: format!("provider '{}' is not configured", config.default_provider),
    })?;
    build_assistant_with(config, provider)
}

/// Build the assistant around an explicit provider.
pub fn build_assistant_with(config: &AppConfig, provider: Arc<dyn Provider>) -> Result<Assistant, Error> {
    let client = BackendClient::from_config(&config.backend);
    let tools = Arc::new(default_registry(client)?);

    let model = config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());

    let agent = &config.agent;
    let mut reasoner = ModelReasoner::new(provider, model.clone(), tools.clone())
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_window(ContextWindow::new(agent.max_context_turns, agent.max_context_tokens))
        .with_model_timeout(Duration::from_secs(agent.model_timeout_secs));
    if let Some(prompt) = &agent.system_prompt_override {
        reasoner = reasoner.with_system_prompt(prompt.clone());
    }

    let event_bus = Arc::new(EventBus::default());
    let dispatch = DispatchLoop::new(Arc::new(reasoner), tools.clone(), event_bus.clone())
        .with_max_steps(agent.max_steps)
        .with_deadline(Duration::from_secs(agent.request_deadline_secs));

    let policy: Box<dyn EvictionPolicy> = match config.sessions.ttl_minutes {
        0 => Box::new(NoEviction),
        minutes => Box::new(TtlEviction::new(Duration::from_secs(minutes * 60))),
    };
    let store = SessionStore::new(policy, config.sessions.max_sessions);

    let mut assistant = Assistant::new(dispatch, store, event_bus).with_busy_policy(agent.busy_policy);
    if let Some(dir) = &config.sessions.persist_dir {
        assistant = assistant.with_archive(Arc::new(JsonFileArchive::new(dir)));
    }

    info!(
        provider = %config.default_provider,
        model = %model,
        tools = tools.len(),
        backend = %config.backend.base_url,
        max_steps = agent.max_steps,
        "Assistant ready"
    );
    Ok(assistant)
}
