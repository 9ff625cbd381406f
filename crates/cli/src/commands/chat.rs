//! `devpilot chat`: interactive or single-message chat.

use std::io::Write;

use devpilot_agent::{Assistant, ReplyStatus};
use devpilot_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(session: Option<String>, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'");
        eprintln!("    DEVPILOT_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let assistant = devpilot_agent::build_assistant(&config)?;
    let session_id = session.unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));

    if let Some(msg) = message {
        let reply = assistant.respond(&session_id, &msg).await?;
        println!("{}", reply.text);
        return Ok(());
    }

    println!();
    println!("  DevPilot, interactive mode");
    println!();
    println!("  Session:   {session_id}");
    println!("  Model:     {} ({})", config.default_model, config.default_provider);
    println!("  Backend:   {}", config.backend.base_url);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if !line.is_empty() {
            exchange(&assistant, &session_id, line).await;
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn exchange(assistant: &Assistant, session_id: &str, line: &str) {
    eprint!("  ...");
    let result = assistant.respond(session_id, line).await;
    eprint!("\r     \r");

    match result {
        Ok(reply) => {
            println!();
            for text in reply.text.lines() {
                println!("  DevPilot > {text}");
            }
            if reply.status == ReplyStatus::StepLimitReached {
                println!("  (stopped after {} tool calls)", reply.tool_invocations);
            }
            println!();
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
            println!();
        }
    }
}
