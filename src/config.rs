use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Nodo de audio
    pub node_name: String,
    pub playback_speed: f64,

    // Reproducción
    pub default_volume: u16,
    pub max_queue_size: Option<usize>, // None = sin límite

    // Valores por defecto de la consola
    pub default_guild_id: u64,
    pub default_user_id: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            node_name: std::env::var("NODE_NAME").unwrap_or_else(|_| "local".to_string()),
            playback_speed: std::env::var("PLAYBACK_SPEED")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()?,

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "35".to_string())
                .parse()?,
            max_queue_size: match std::env::var("MAX_QUEUE_SIZE") {
                Ok(val) if !val.trim().is_empty() => match val.trim().parse::<usize>()? {
                    0 => None,
                    limit => Some(limit),
                },
                _ => None,
            },

            default_guild_id: std::env::var("DEFAULT_GUILD_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            default_user_id: std::env::var("DEFAULT_USER_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on values that parsed but make no sense.
    ///
    /// - Volume must be between 0 and 1000 (the node's range)
    /// - Playback speed must be finite and not negative; 0 disables the
    ///   playback timer
    /// - Guild and user ids must be non-zero Discord snowflakes
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 1000 {
            anyhow::bail!("Default volume must be between 0 and 1000, got: {}", self.default_volume);
        }

        if !self.playback_speed.is_finite() || self.playback_speed < 0.0 {
            anyhow::bail!("Playback speed must be a non-negative number, got: {}", self.playback_speed);
        }

        if self.default_guild_id == 0 || self.default_user_id == 0 {
            anyhow::bail!("Default guild and user ids must be non-zero");
        }

        if self.node_name.trim().is_empty() {
            anyhow::bail!("Node name must not be empty");
        }

        Ok(())
    }

    /// One-line summary for the startup log.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary: node '{}' ({}x), volume {}, queue limit {}",
            self.node_name,
            self.playback_speed,
            self.default_volume,
            self.max_queue_size
                .map_or("unbounded".to_string(), |limit| limit.to_string()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: "local".to_string(),
            playback_speed: 1.0,
            default_volume: 35,
            max_queue_size: None,
            default_guild_id: 1,
            default_user_id: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid_and_unbounded() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.summary().contains("unbounded"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let loud = Config {
            default_volume: 5000,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let backwards = Config {
            playback_speed: -1.0,
            ..Config::default()
        };
        assert!(backwards.validate().is_err());

        let no_guild = Config {
            default_guild_id: 0,
            ..Config::default()
        };
        assert!(no_guild.validate().is_err());
    }

    #[test]
    fn test_summary_shows_limit() {
        let config = Config {
            max_queue_size: Some(250),
            ..Config::default()
        };
        assert!(config.summary().contains("queue limit 250"));
    }
}
