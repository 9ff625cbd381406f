//! `devpilot config`: print the effective or default configuration.

use devpilot_config::AppConfig;

const MASK: &str = "********";

pub fn run(show_default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show_default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", toml::to_string_pretty(&masked(config))?);
    Ok(())
}

/// Replace secrets so the output is safe to paste.
fn masked(mut config: AppConfig) -> AppConfig {
    let mask = |secret: &mut Option<String>| {
        if secret.is_some() {
            *secret = Some(MASK.to_string());
        }
    };
    mask(&mut config.api_key);
    mask(&mut config.backend.auth_token);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    for token in &mut config.gateway.api_tokens {
        *token = MASK.to_string();
    }
    config
}
