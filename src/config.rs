use std::collections::HashSet;

use crate::utils::errors::ConfigError;

const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REFRESH_COMMAND: &str = "$history";
const DEFAULT_CHART_WIDTH: u32 = 1024;
const DEFAULT_CHART_HEIGHT: u32 = 768;

/// Runtime settings, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord_token: String,
    /// Base URL of the historical price backend
    pub api_base_url: String,
    /// Channels that act as history views; `None` means every channel
    pub history_channels: Option<HashSet<u64>>,
    /// `None` when the refresh command is explicitly disabled
    pub refresh_command: Option<String>,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let api_base_url = lookup("HISTORY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let history_channels = match lookup("HISTORY_CHANNEL_IDS") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_channel_ids(&raw)?),
            _ => None,
        };

        let refresh_command = match lookup("HISTORY_COMMAND") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_string()),
            None => Some(DEFAULT_REFRESH_COMMAND.to_string()),
        };

        Ok(Self {
            discord_token,
            api_base_url,
            history_channels,
            refresh_command,
            chart_width: parse_dimension(&lookup, "CHART_WIDTH", DEFAULT_CHART_WIDTH)?,
            chart_height: parse_dimension(&lookup, "CHART_HEIGHT", DEFAULT_CHART_HEIGHT)?,
        })
    }
}

fn parse_channel_ids(raw: &str) -> Result<HashSet<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "HISTORY_CHANNEL_IDS",
                value: s.to_string(),
            })
        })
        .collect()
}

fn parse_dimension<F>(lookup: &F, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or(ConfigError::Invalid { key, value: raw }),
    }
}
