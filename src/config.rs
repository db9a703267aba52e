//! Server configuration
//!
//! Defaults can be overridden by environment variables and then by
//! positional command-line arguments (`<bind-addr> <data-dir>`).

use std::path::PathBuf;

pub const ADDR_VAR: &str = "PRESSURE_GRAPH_ADDR";
pub const DATA_DIR_VAR: &str = "PRESSURE_GRAPH_DATA_DIR";
pub const SESSION_HOURS_VAR: &str = "PRESSURE_GRAPH_SESSION_HOURS";

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Root directory for the user registry and graph history
    pub data_dir: PathBuf,

    /// Session lifetime in hours
    pub session_hours: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("database"),
            session_hours: 24,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`; unparseable values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup(ADDR_VAR).filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(hours) = lookup(SESSION_HOURS_VAR) {
            match hours.trim().parse::<u64>() {
                Ok(hours) if hours > MAX_SESSION_HOURS => {
                    log::warn!(
                        "Capping {}={} to {} hours",
                        SESSION_HOURS_VAR,
                        hours,
                        MAX_SESSION_HOURS
                    );
                    config.session_hours = MAX_SESSION_HOURS;
                }
                Ok(hours) if hours > 0 => config.session_hours = hours,
                _ => log::warn!("Ignoring invalid {}={}", SESSION_HOURS_VAR, hours),
            }
        }
        config
    }

    /// Applies positional arguments (program name first, as from `env::args`)
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(addr) = args.get(1) {
            self.bind_addr = addr.clone();
        }
        if let Some(dir) = args.get(2) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    /// Session lifetime, never longer than [`MAX_SESSION_HOURS`]
    pub fn session_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_hours.min(MAX_SESSION_HOURS) * 60 * 60)
    }
}
