//! Config commands

use anyhow::bail;

use crate::config::{mask, Config};
use crate::ConfigCommands;

const KEYS: [&str; 5] = ["api_url", "api_key", "user_id", "timeout_secs", "log_level"];

pub fn handle(action: ConfigCommands, profile: Option<&str>) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Init => {
            let path = Config::default().save(profile)?;
            println!("Configuration initialized at {}", path.display());
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load(profile)?;
            match key.as_str() {
                "api_url" => config.api_url = Some(value),
                "api_key" => config.api_key = Some(value),
                "user_id" => config.user_id = Some(value),
                "timeout_secs" => config.timeout_secs = Some(value.parse()?),
                "log_level" => config.log_level = Some(value),
                _ => bail!("unknown config key: {} (expected one of {})", key, KEYS.join(", ")),
            }
            config.save(profile)?;
            println!("Set {} successfully", key);
        }
        ConfigCommands::Get { key } => {
            let config = Config::load(profile)?;
            let value = lookup(&config, &key)?;
            println!("{}: {}", key, value.unwrap_or_else(|| "(not set)".into()));
        }
        ConfigCommands::List => {
            let config = Config::load(profile)?;
            for key in KEYS {
                let value = lookup(&config, key)?;
                println!("{}: {}", key, value.unwrap_or_else(|| "(not set)".into()));
            }
        }
    }
    Ok(())
}

/// Drop the stored user so later commands run signed out
pub fn logout(profile: Option<&str>) -> anyhow::Result<()> {
    let mut config = Config::load(profile)?;
    match config.user_id.take() {
        Some(user) => {
            config.save(profile)?;
            println!("Signed out {}", user);
        }
        None => println!("No user signed in"),
    }
    Ok(())
}

fn lookup(config: &Config, key: &str) -> anyhow::Result<Option<String>> {
    Ok(match key {
        "api_url" => config.api_url.clone(),
        "api_key" => config.api_key.as_deref().map(mask),
        "user_id" => config.user_id.clone(),
        "timeout_secs" => config.timeout_secs.map(|t| t.to_string()),
        "log_level" => config.log_level.clone(),
        _ => bail!("unknown config key: {}", key),
    })
}
