//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Crosslink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub linking: LinkingConfig,
    pub retry: RetryConfig,
}

/// Per-article link budgets and scoring thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkingConfig {
    /// Maximum outgoing internal links per article
    pub max_internal_links: u32,
    /// Maximum outgoing external links per article
    pub max_external_links: u32,
    /// Budget for the generic external fallback when nothing qualifies
    pub fallback_external_links: u32,
    /// Minimum additive score for an external candidate to qualify
    pub min_external_score: f64,
    /// Bonus added per matched topical keyword group
    pub group_bonus: f64,
}

/// Timeout and retry budget for storage calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per storage operation before the article is skipped
    pub max_attempts: u32,
    /// Timeout per attempt, in seconds
    pub op_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            linking: LinkingConfig {
                max_internal_links: 5,
                max_external_links: 5,
                fallback_external_links: 3,
                min_external_score: 5.0,
                group_bonus: 10.0,
            },
            retry: RetryConfig {
                max_attempts: 3,
                op_timeout_secs: 10,
            },
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CROSSLINK_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("crosslink")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.linking.max_internal_links == 0 {
            return Err(anyhow!("linking.max_internal_links must be at least 1"));
        }
        if self.linking.max_external_links == 0 {
            return Err(anyhow!("linking.max_external_links must be at least 1"));
        }
        if self.linking.fallback_external_links > self.linking.max_external_links {
            return Err(anyhow!(
                "linking.fallback_external_links ({}) cannot exceed linking.max_external_links ({})",
                self.linking.fallback_external_links,
                self.linking.max_external_links
            ));
        }
        if self.linking.min_external_score < 0.0 {
            return Err(anyhow!("linking.min_external_score cannot be negative"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.retry.op_timeout_secs == 0 {
            return Err(anyhow!("retry.op_timeout_secs must be at least 1"));
        }
        Ok(())
    }
}
