//! `pitchscout doctor`: Diagnose config, provider and vector store.

use pitchscout_agent::build_connector;
use pitchscout_config::AppConfig;
use pitchscout_providers::router::build_from_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 PitchScout Doctor — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults — run `pitchscout onboard`");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid ({} pitchers on the roster)", config.roster.len());
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() || !config.providers.is_empty() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key — set GOOGLE_API_KEY or api_key in config.toml");
        issues += 1;
    }

    let router = build_from_config(&config);
    match router.get(&config.default_provider) {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", config.default_provider),
            Ok(false) => {
                println!("  ⚠️  Provider '{}' responded unhealthy", config.default_provider);
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", config.default_provider);
                issues += 1;
            }
        },
        None => {
            println!("  ❌ Provider '{}' is not configured", config.default_provider);
            issues += 1;
        }
    }

    match build_connector(&config, &router) {
        Ok(connector) => match connector.connect().await {
            Ok(store) => match store.count().await {
                Ok(0) => {
                    println!("  ⚠️  Vector store reachable but empty — run `pitchscout ingest`");
                    issues += 1;
                }
                Ok(n) => println!("  ✅ Vector store holds {n} documents ({})", connector.describe()),
                Err(e) => {
                    println!("  ❌ Vector store count failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Vector store unreachable ({}): {e}", connector.describe());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Vector store misconfigured: {e}");
            issues += 1;
        }
    }

    if config.gateway.channel_access_token.is_none() {
        println!("  ℹ️  No channel access token — webhook replies disabled");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
