//! DevPilot CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP API
//! - `chat`    Interactive or single-message chat
//! - `tools`   List the project/task tools
//! - `config`  Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "devpilot",
    about = "DevPilot, a conversational assistant for projects and tasks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long, env = "DEVPILOT_PORT")]
        port: Option<u16>,
    },

    /// Chat with the assistant
    Chat {
        /// Session to continue; a new one is started when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List the available tools
    Tools,

    /// Show the effective configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { session, message } => commands::chat::run(session, message).await?,
        Commands::Tools => commands::tools::run()?,
        Commands::Config { default } => commands::config_cmd::run(default)?,
    }

    Ok(())
}
