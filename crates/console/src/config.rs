use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Client configuration, loaded from the user config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the agent backend.
    pub backend_url: String,
    /// Thread opened when none is given on the command line.
    pub default_thread: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8920".to_string(),
            default_thread: None,
        }
    }
}

/// Path of the configuration file.
pub fn config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dir.join("agent-console").join("config.json"))
}

/// Load the configuration, falling back to defaults when the file is
/// missing or unreadable. `AGENT_CONSOLE_BACKEND_URL` overrides the URL.
pub fn load() -> Config {
    let mut config = config_path()
        .and_then(|path| Ok(std::fs::read_to_string(path)?))
        .map(|contents| {
            serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring invalid config file: {e}");
                Config::default()
            })
        })
        .unwrap_or_default();

    if let Ok(url) = std::env::var("AGENT_CONSOLE_BACKEND_URL") {
        config.backend_url = url;
    }
    config
}
