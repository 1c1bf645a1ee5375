use anyhow::bail;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::recommend::ScoringWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Per-source request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
    pub sources: Vec<Source>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "TechDaily/1.0 (RSS Aggregator)".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// TTL for feed listings and single-article entries, in seconds
    #[serde(default = "default_ttl")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
    /// How often expired entries are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_ttl() -> u64 {
    900
}

fn default_search_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    120
}

fn default_max_entries() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl(),
            search_ttl_secs: default_search_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// One RSS-publishing outlet.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub language: String,
    pub category: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Durations of zero would panic the sweep timer or fail every fetch.
    fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("cache.default_ttl_secs", self.cache.default_ttl_secs),
            ("cache.search_ttl_secs", self.cache.search_ttl_secs),
            ("cache.sweep_interval_secs", self.cache.sweep_interval_secs),
            ("cache.max_entries", self.cache.max_entries),
        ];
        for (name, value) in durations {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        if self.scoring.freshness_decay_hours <= 0.0 {
            bail!("scoring.freshness_decay_hours must be positive");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
