pub mod ask;
pub mod chat;
pub mod doctor;
pub mod ingest;
pub mod onboard;
pub mod serve;

use pitchscout_config::AppConfig;

/// Load config, failing early with setup hints when no API key is present.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.providers.is_empty() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PITCHSCOUT_API_KEY=...   (generic)");
        eprintln!("    GOOGLE_API_KEY=...       (Gemini, the default provider)");
        eprintln!("    OPENAI_API_KEY=...       (OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}
