//! Server Configuration
//!
//! One JSON document configures a hosted match. Every section is optional;
//! missing fields fall back to their defaults.
//!
//! ```json
//! {
//!   "tick_rate": 60,
//!   "session": { "max_players": 4 },
//!   "rules": { "start_lives": 3, "weapon": { "kind": "Projectile" } },
//!   "arena": { "seed": 10, "rows": 10, "cols": 10 }
//! }
//! ```

use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::game::arena::{ArenaConfig, ArenaConfigError};
use crate::game::movement::VehicleTuning;
use crate::game::tick::{MatchConfig, MatchConfigError};
use crate::network::session::SessionConfig;

/// Top-level configuration for the authority process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// Session limits.
    pub session: SessionConfig,
    /// Match rules.
    pub rules: MatchConfig,
    /// Maze generation.
    pub arena: ArenaConfig,
    /// Vehicle handling.
    pub vehicle: VehicleTuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            session: SessionConfig::default(),
            rules: MatchConfig::default(),
            arena: ArenaConfig::default(),
            vehicle: VehicleTuning::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Arena section rejected.
    #[error("Invalid arena: {0}")]
    Arena(#[from] ArenaConfigError),

    /// Rules section rejected.
    #[error("Invalid rules: {0}")]
    Rules(#[from] MatchConfigError),

    /// Tick rate must be positive.
    #[error("Invalid tick rate: {0}")]
    InvalidTickRate(u32),

    /// The match could never start.
    #[error("Match needs {required} players but the session holds {max}")]
    PlayerCount {
        /// Players needed to leave the waiting room
        required: usize,
        /// Session capacity
        max: usize,
    },
}

impl ServerConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section and the constraints between them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::InvalidTickRate(self.tick_rate));
        }
        self.arena.validate()?;
        self.rules.validate()?;
        if self.rules.required_players > self.session.max_players {
            return Err(ConfigError::PlayerCount {
                required: self.rules.required_players,
                max: self.session.max_players,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_rate, 60);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = ServerConfig::from_json_str(r#"{ "arena": { "rows": 6, "cols": 7 } }"#).unwrap();
        assert_eq!(config.arena.rows, 6);
        assert_eq!(config.arena.cols, 7);
        assert_eq!(config.arena.seed, ArenaConfig::default().seed);
        assert_eq!(config.rules, MatchConfig::default());
    }

    #[test]
    fn test_rejects_zero_tick_rate() {
        let err = ServerConfig::from_json_str(r#"{ "tick_rate": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTickRate(0)));
    }

    #[test]
    fn test_rejects_unreachable_player_count() {
        let err = ServerConfig::from_json_str(
            r#"{ "session": { "max_players": 2 }, "rules": { "required_players": 3 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::PlayerCount { required: 3, max: 2 }));
    }

    #[test]
    fn test_rejects_bad_arena() {
        let err = ServerConfig::from_json_str(r#"{ "arena": { "rows": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Arena(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(ServerConfig::from_json_str("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
