//! Configuration loading and validation.
//!
//! The core consumes a frozen, validated snapshot; parsing/hot-reload
//! orchestration is the caller's job (`main.rs` on boot, the REHASH handler
//! on reload). `validate` collects every problem rather than stopping at
//! the first.

mod types;

pub use types::{
    ChannelsSection, Config, FilesSection, LimitsSection, LogFormat, OperatorBlock, ServerSection,
};

use crate::error::ConfigError;
use ember_proto::Casemap;

impl Config {
    /// Load and parse a TOML config file. Does not validate; call
    /// [`validate`] separately so callers can decide how to report errors.
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{path}: {e}")))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The server's active casemap, parsed from `[server].casemap`.
    /// Falls back to the RFC 1459 default if the token is unrecognized;
    /// `validate` is what should actually reject a bad token at boot.
    pub fn casemap(&self) -> Casemap {
        Casemap::from_token(&self.server.casemap).unwrap_or_default()
    }
}

/// Validate a loaded configuration, returning every problem found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ConfigError::MissingField("server.name".to_string()));
    }
    if config.server.sid.chars().count() != 3 {
        errors.push(ConfigError::InvalidValue {
            field: "server.sid".to_string(),
            reason: "must be exactly 3 characters".to_string(),
        });
    }
    if Casemap::from_token(&config.server.casemap).is_none() {
        errors.push(ConfigError::InvalidValue {
            field: "server.casemap".to_string(),
            reason: format!(
                "unknown casemap {:?}; expected one of rfc1459, strict-rfc1459, ascii, permissive-unicode",
                config.server.casemap
            ),
        });
    }
    if config.server.listen.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ConfigError::InvalidValue {
            field: "server.listen".to_string(),
            reason: "must be a valid host:port".to_string(),
        });
    }

    if config.limits.nick_max == 0 {
        errors.push(ConfigError::InvalidValue {
            field: "limits.nick_max".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.limits.chan_max < 2 {
        errors.push(ConfigError::InvalidValue {
            field: "limits.chan_max".to_string(),
            reason: "must be at least 2 (sigil + one more byte)".to_string(),
        });
    }
    if config.limits.max_modes_per_line == 0 {
        errors.push(ConfigError::InvalidValue {
            field: "limits.max_modes_per_line".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    for (i, op) in config.operators.iter().enumerate() {
        if op.name.trim().is_empty() {
            errors.push(ConfigError::MissingField(format!(
                "operators[{i}].name"
            )));
        }
        if op.password_hash.trim().is_empty() {
            errors.push(ConfigError::MissingField(format!(
                "operators[{i}].password_hash"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
