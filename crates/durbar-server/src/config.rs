use std::time::Duration;

use serde::Deserialize;

use durbar_core::role::RolePoints;
use durbar_core::session::SessionConfig;

/// Top-level server configuration, loaded from `durbar.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub game: GameConfig,
    pub limits: LimitsConfig,
    pub sessions: SessionsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            game: GameConfig::default(),
            limits: LimitsConfig::default(),
            sessions: SessionsConfig::default(),
        }
    }
}

/// Game policy: round count, reveal delay, and the role point table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub total_rounds: u32,
    /// Pause between a round's result reveal and the next deal, so players
    /// can read the scores. Policy, not correctness.
    pub advance_delay_secs: u64,
    pub points: RolePoints,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            advance_delay_secs: 5,
            points: RolePoints::default(),
        }
    }
}

impl GameConfig {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            total_rounds: self.total_rounds,
            advance_delay: Duration::from_secs(self.advance_delay_secs),
            points: self.points,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub player_message_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            player_message_buffer: 256,
            ws_rate_limit_per_sec: 20.0,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on fatal values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.game.total_rounds == 0 {
            tracing::error!("game.total_rounds must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.sessions.idle_timeout_secs == 0 {
            tracing::error!("sessions.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.sessions.idle_check_interval_secs == 0 {
            tracing::error!("sessions.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `durbar.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("durbar.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from durbar.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse durbar.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No durbar.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("DURBAR_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("DURBAR_TOTAL_ROUNDS")
            && let Ok(n) = val.parse::<u32>()
        {
            config.game.total_rounds = n;
        }
        if let Ok(val) = std::env::var("DURBAR_ADVANCE_DELAY_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.game.advance_delay_secs = n;
        }
        if let Ok(val) = std::env::var("DURBAR_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("DURBAR_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }

        config
    }
}
