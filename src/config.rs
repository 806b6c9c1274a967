use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Optional settings read from config.toml in the platform config dir
/// (e.g. ~/.config/chatterm/config.toml). CLI flags override all of these.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Where the persisted JSON state lives.
    pub data_dir: Option<PathBuf>,
    /// UI tick interval in milliseconds.
    pub tick_ms: Option<u64>,
    /// Skip the startup logo.
    #[serde(default)]
    pub no_logo: bool,
}

impl Config {
    pub const DEFAULT_TICK_MS: u64 = 250;

    /// Load the config file if present; a missing file is the default
    /// config, a malformed one is an error worth surfacing.
    pub fn load() -> Result<Self> {
        let path = Self::path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("chatterm")
            .join("config.toml")
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms.unwrap_or(Self::DEFAULT_TICK_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let config: Config = toml::from_str("tick_ms = 100\n").unwrap();
        assert_eq!(config.tick_ms(), 100);
        assert!(config.data_dir.is_none());
        assert!(!config.no_logo);
    }

    #[test]
    fn defaults_apply() {
        let config = Config::default();
        assert_eq!(config.tick_ms(), Config::DEFAULT_TICK_MS);
    }
}
