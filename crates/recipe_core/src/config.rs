//! Runtime configuration for the recipe core.
//!
//! # Responsibility
//! - Describe where the catalog lives and which authority it answers to.
//! - Read overrides from `RECIPE_*` environment variables.
//!
//! # Invariants
//! - A returned `CoreConfig` always carries a valid authority and log level.

use crate::locator::validate_authority;
use crate::logging::{default_log_level, normalize_level};
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_AUTHORITY: &str = "com.example.recipe";
pub const ENV_AUTHORITY: &str = "RECIPE_AUTHORITY";
pub const ENV_DB_PATH: &str = "RECIPE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "RECIPE_LOG_LEVEL";

const MEMORY_DB_MARKER: &str = ":memory:";

/// Configuration error raised before any storage is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAuthority(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAuthority(value) => write!(f, "invalid locator authority: `{value}`"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

/// Where the catalog database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private in-memory database, discarded with the process.
    Memory,
}

impl DatabaseLocation {
    /// Parses a path value; `:memory:` selects an in-memory database.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == MEMORY_DB_MARKER {
            Self::Memory
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }
}

/// Resolved core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub authority: String,
    pub database: DatabaseLocation,
    pub log_level: &'static str,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            database: DatabaseLocation::Memory,
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Builds configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(authority) = lookup(ENV_AUTHORITY) {
            config = config.with_authority(authority.trim())?;
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            config.database = DatabaseLocation::parse(&path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config = config.with_log_level(&level)?;
        }

        Ok(config)
    }

    pub fn with_authority(mut self, authority: &str) -> Result<Self, ConfigError> {
        validate_authority(authority)?;
        self.authority = authority.to_string();
        Ok(self)
    }

    pub fn with_database(mut self, database: DatabaseLocation) -> Self {
        self.database = database;
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Result<Self, ConfigError> {
        self.log_level = normalize_level(level)
            .map_err(|err| ConfigError::InvalidLogLevel(err.to_string()))?;
        Ok(self)
    }
}
