//! Application configuration management.
//!
//! Configuration lives at `~/.config/menucache/config.json`; any field that
//! is missing falls back to its default. A handful of settings can be
//! overridden from the environment (or a `.env` file loaded by the binary):
//!
//! - `MENUCACHE_ORIGIN`: base URL of the menu site
//! - `MENUCACHE_CACHE_GENERATION`: cache name for the current deployment
//! - `MENUCACHE_WHATSAPP_PHONE`: destination number for orders
//! - `MENUCACHE_OFFLINE`: `1`/`true` to never touch the network

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::gateway::GatewayOptions;
use crate::order::OrderDestination;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "menucache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cache generation shipped with this build. Bump when core assets change.
pub const DEFAULT_GENERATION: &str = "bytes-spicy-menu-v1";

/// The number that ships in the sample config; orders must never go there.
pub const PLACEHOLDER_PHONE: &str = "919000000000";

/// How many specials the specials bar shows
pub const DEFAULT_SPECIALS_LIMIT: usize = 5;

/// Assets pre-cached at install time
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/menu.json",
    "/js/script.js",
    "/src/style.css",
    "/src/output.css",
    "/src/input.css",
    "/images/logo.png",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("WhatsApp ordering is currently not available")]
    OrderingDisabled,

    #[error("WhatsApp number has not been configured - please contact the restaurant admin")]
    PlaceholderPhone,

    #[error("Invalid WhatsApp number: {0}")]
    InvalidPhone(String),

    #[error("Invalid origin URL {url}: {reason}")]
    InvalidOrigin { url: String, reason: String },
}

/// WhatsApp ordering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrderingConfig {
    pub enabled: bool,
    /// Full international number, digits only (e.g. 919812345678)
    pub phone: String,
    pub country_code: String,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phone: PLACEHOLDER_PHONE.to_string(),
            country_code: "+91".to_string(),
        }
    }
}

impl OrderingConfig {
    /// Validate the ordering settings once, at startup.
    pub fn destination(&self) -> Result<OrderDestination, ConfigError> {
        if !self.enabled {
            return Err(ConfigError::OrderingDisabled);
        }

        let phone: String = self
            .phone
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '+' | '(' | ')'))
            .collect();

        if phone.is_empty() || phone == PLACEHOLDER_PHONE {
            return Err(ConfigError::PlaceholderPhone);
        }
        if !phone.chars().all(|c| c.is_ascii_digit()) || !(7..=15).contains(&phone.len()) {
            return Err(ConfigError::InvalidPhone(self.phone.clone()));
        }

        Ok(OrderDestination::new(phone))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub restaurant_name: String,
    /// Base URL of the menu site
    pub origin: String,
    pub menu_path: String,
    pub cache_generation: String,
    pub assets: Vec<String>,
    /// Activate a freshly installed cache generation immediately
    pub eager_activation: bool,
    pub offline_mode: bool,
    pub specials_limit: usize,
    pub ordering: OrderingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            restaurant_name: "Bytes & Spicy".to_string(),
            origin: "http://localhost:8080/".to_string(),
            menu_path: "/menu.json".to_string(),
            cache_generation: DEFAULT_GENERATION.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            eager_activation: true,
            offline_mode: false,
            specials_limit: DEFAULT_SPECIALS_LIMIT,
            ordering: OrderingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root directory holding every named cache
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `MENUCACHE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = lookup("MENUCACHE_ORIGIN") {
            self.origin = origin;
        }
        if let Some(generation) = lookup("MENUCACHE_CACHE_GENERATION") {
            self.cache_generation = generation;
        }
        if let Some(phone) = lookup("MENUCACHE_WHATSAPP_PHONE") {
            self.ordering.phone = phone;
        }
        if let Some(offline) = lookup("MENUCACHE_OFFLINE") {
            self.offline_mode = matches!(offline.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin).map_err(|e| ConfigError::InvalidOrigin {
            url: self.origin.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidOrigin {
                url: self.origin.clone(),
                reason: "not a base URL".to_string(),
            });
        }
        Ok(url)
    }

    pub fn menu_url(&self) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(&self.menu_path)
            .map_err(|e| ConfigError::InvalidOrigin {
                url: self.origin.clone(),
                reason: e.to_string(),
            })
    }

    pub fn gateway_options(&self) -> Result<GatewayOptions, ConfigError> {
        Ok(GatewayOptions {
            generation: self.cache_generation.clone(),
            origin: self.origin_url()?,
            manifest: self.assets.clone(),
            eager_activation: self.eager_activation,
        })
    }
}
