//! `devpilot tools`: list the tool catalogue offered to the model.

use devpilot_config::AppConfig;
use devpilot_core::tool::Tool;
use devpilot_tools::{BackendClient, default_registry};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = default_registry(BackendClient::from_config(&config.backend))?;

    println!("{} tools against {}", registry.len(), config.backend.base_url);
    println!();
    for tool in registry.list() {
        let fields: Vec<String> = tool
            .schema()
            .fields()
            .iter()
            .map(|f| if f.required { f.name.clone() } else { format!("{}?", f.name) })
            .collect();
        println!("  {:<22} ({})", tool.name(), fields.join(", "));
        println!("  {:<22} {}", "", tool.description());
    }

    Ok(())
}
