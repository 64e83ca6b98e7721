//! Subcommand implementations for the `delve` binary.

pub mod chat;
pub mod example;
pub mod onboard;
pub mod serve;

use delve_agent::{AgentSettings, ResearchAgent};
use delve_config::AppConfig;
use tracing::info;

/// Load the configuration, refusing to continue without an API key.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        let key_var = delve_config::provider_key_var(&config.default_provider).unwrap_or("DELVE_API_KEY");
        eprintln!();
        eprintln!("  ERROR: No API key configured for provider '{}'!", config.default_provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    {key_var}");
        eprintln!("    DELVE_API_KEY   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}

/// Build a research agent for an interactive session.
pub(crate) async fn build_agent(
    config: &AppConfig,
    verbose: bool,
) -> Result<ResearchAgent, Box<dyn std::error::Error>> {
    let provider = delve_providers::build_from_config(config)
        .default()
        .ok_or("No default provider configured")?;

    let mut settings = AgentSettings::from_config(config);
    settings.verbose |= verbose;

    let agent = ResearchAgent::new(provider, settings);
    agent.ensure_directories().await?;
    info!(provider = %config.default_provider, model = %config.default_model, "Research agent ready");
    Ok(agent)
}
