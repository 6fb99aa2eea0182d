//! Node configuration
//!
//! Values come from an optional JSON file; CLI flags override them.

use crate::error::{DiceError, Result};
use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Label bound into this party's commitment
    pub identity: String,
    /// Address the responder listens on
    pub listen_addr: String,
    /// Responder address the initiator connects to
    pub peer_addr: String,
    /// Bound on every wait for the peer's next message
    pub timeout_secs: u64,
    /// How often the responder sweeps stalled runs
    pub sweep_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: "alice".to_string(),
            listen_addr: "127.0.0.1:8443".to_string(),
            peer_addr: "127.0.0.1:8443".to_string(),
            timeout_secs: 15,
            sweep_interval_ms: 250,
        }
    }
}

impl Config {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// File config if a path is given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        Identity::new(self.identity.as_str())
            .map_err(|e| DiceError::Configuration(e.to_string()))?;

        if self.timeout_secs == 0 {
            return Err(DiceError::Configuration(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(DiceError::Configuration(
                "sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.listen_addr.is_empty() || self.peer_addr.is_empty() {
            return Err(DiceError::Configuration("address is empty".to_string()));
        }
        Ok(())
    }

    pub fn identity(&self) -> Result<Identity> {
        Identity::new(self.identity.as_str())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
