use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::paginate::PaginationConfig;

pub const ENV_TARGET_WORDS: &str = "BOOKPAGER_TARGET_WORDS";
pub const ENV_MIN_WORDS: &str = "BOOKPAGER_MIN_WORDS";
pub const ENV_MAX_WORDS: &str = "BOOKPAGER_MAX_WORDS";
pub const ENV_WORDS_PER_MINUTE: &str = "BOOKPAGER_WORDS_PER_MINUTE";
pub const ENV_AUTOSAVE_SECS: &str = "BOOKPAGER_AUTOSAVE_SECS";
pub const ENV_TRANSITION_MS: &str = "BOOKPAGER_TRANSITION_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub pagination: PaginationConfig,
    pub autosave_secs: u64,
    pub transition_ms: u64,
    pub cache_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            autosave_secs: Self::default_autosave_secs(),
            transition_ms: 0,
            cache_capacity: Self::default_cache_capacity(),
        }
    }
}

impl ReaderConfig {
    pub fn default_autosave_secs() -> u64 {
        30
    }

    pub fn default_cache_capacity() -> usize {
        8
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_secs)
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&yaml).with_context(|| format!("parse config: {}", path.display()))
    }

    /// File values first (when given), then `BOOKPAGER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        tracing::debug!(?config, "loaded reader config");
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, ENV_TARGET_WORDS)? {
            self.pagination.target_words = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MIN_WORDS)? {
            self.pagination.min_words = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_WORDS)? {
            self.pagination.max_words = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_WORDS_PER_MINUTE)? {
            self.pagination.words_per_minute = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_AUTOSAVE_SECS)? {
            self.autosave_secs = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TRANSITION_MS)? {
            self.transition_ms = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        PaginationConfig::new(
            self.pagination.target_words,
            self.pagination.min_words,
            self.pagination.max_words,
            self.pagination.words_per_minute,
        )
        .context("invalid pagination config")?;
        if self.autosave_secs == 0 {
            anyhow::bail!("autosave_secs must be at least 1");
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|err| anyhow::anyhow!("invalid {name}={raw:?}: {err}"))
}
