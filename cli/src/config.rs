//! Configuration management for the sproochmaschinn CLI.
//!
//! Configuration is stored in ~/.sproochmaschinn/config.yaml as named
//! contexts, one of which is current.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use sproochmaschinn::{ClientBuilder, PollPolicy};

/// Default configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".sproochmaschinn";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Name of the currently active context.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,

    /// Map of context name to context configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, Context>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// Endpoints and timings for one environment (e.g. direct vs. relayed).
///
/// Durations are whole seconds; zero or absent means the SDK default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// HTTP base URL; may point at a relay.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,

    /// Live channel URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ws_url: String,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub session_expiry: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub keepalive_interval: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub ping_interval: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub reconnect_delay: u64,

    /// Disables the live channel when false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_channel: Option<bool>,

    /// TTS poll interval in milliseconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tts_poll_interval_ms: u64,

    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub tts_max_attempts: u32,

    /// STT poll interval in milliseconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub stt_poll_interval_ms: u64,

    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub stt_max_attempts: u32,

    /// Voice model used when `tts` gets no `-V`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_voice: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn is_zero_u32(n: &u32) -> bool {
    *n == 0
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Adds or replaces a context.
    pub fn add_context(&mut self, name: &str, mut ctx: Context) -> anyhow::Result<()> {
        if name.trim().is_empty() {
            anyhow::bail!("context name must not be empty");
        }
        ctx.name = name.to_string();
        self.contexts.insert(name.to_string(), ctx);
        self.save()
    }

    /// Deletes a context.
    pub fn delete_context(&mut self, name: &str) -> anyhow::Result<()> {
        if self.contexts.remove(name).is_none() {
            anyhow::bail!("context '{}' not found", name);
        }
        if self.current_context == name {
            self.current_context.clear();
        }
        self.save()
    }

    /// Sets the current context.
    pub fn use_context(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.contexts.contains_key(name) {
            anyhow::bail!("context '{}' not found", name);
        }
        self.current_context = name.to_string();
        self.save()
    }

    /// Gets a specific context.
    pub fn get_context(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    /// Gets the current context.
    pub fn get_current_context(&self) -> Option<&Context> {
        if self.current_context.is_empty() {
            return None;
        }
        self.contexts.get(&self.current_context)
    }

    /// Resolves the context by name, or the current context if no name is given.
    pub fn resolve_context(&self, name: Option<&str>) -> Option<&Context> {
        match name {
            Some(n) if !n.is_empty() => self.get_context(n),
            _ => self.get_current_context(),
        }
    }

    /// Lists all context names in order.
    pub fn list_contexts(&self) -> Vec<&str> {
        self.contexts.keys().map(|s| s.as_str()).collect()
    }
}

impl Context {
    /// Applies the non-default settings of this context to a client builder.
    pub fn apply(&self, mut builder: ClientBuilder) -> ClientBuilder {
        if !self.base_url.is_empty() {
            builder = builder.base_url(&self.base_url);
        }
        if !self.ws_url.is_empty() {
            builder = builder.ws_url(&self.ws_url);
        }
        if self.timeout > 0 {
            builder = builder.timeout(Duration::from_secs(self.timeout));
        }
        if self.session_expiry > 0 {
            builder = builder.session_expiry(Duration::from_secs(self.session_expiry));
        }
        if self.keepalive_interval > 0 {
            builder = builder.keepalive_interval(Duration::from_secs(self.keepalive_interval));
        }
        if self.ping_interval > 0 {
            builder = builder.ping_interval(Duration::from_secs(self.ping_interval));
        }
        if self.reconnect_delay > 0 {
            builder = builder.reconnect_delay(Duration::from_secs(self.reconnect_delay));
        }
        if let Some(live) = self.live_channel {
            builder = builder.live_channel(live);
        }
        if let Some(policy) = poll_policy(
            PollPolicy::tts(),
            self.tts_poll_interval_ms,
            self.tts_max_attempts,
        ) {
            builder = builder.tts_poll_policy(policy);
        }
        if let Some(policy) = poll_policy(
            PollPolicy::stt(),
            self.stt_poll_interval_ms,
            self.stt_max_attempts,
        ) {
            builder = builder.stt_poll_policy(policy);
        }
        builder
    }
}

fn poll_policy(mut base: PollPolicy, interval_ms: u64, max_attempts: u32) -> Option<PollPolicy> {
    if interval_ms == 0 && max_attempts == 0 {
        return None;
    }
    if interval_ms > 0 {
        base.interval = Duration::from_millis(interval_ms);
    }
    if max_attempts > 0 {
        base.max_attempts = max_attempts;
    }
    Some(base)
}

/// Loads configuration, creating an empty file if none exists.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => Config::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg: Config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)?
        }
    } else {
        let cfg = Config::default();
        std::fs::write(&config_path, serde_yaml::to_string(&cfg)?)?;
        cfg
    };

    cfg.config_path = config_path;
    Ok(cfg)
}
