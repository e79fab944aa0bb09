//! Peripheral configuration.

use std::time::Duration;

use crate::hids::{Security, Topology};
use crate::le::TxPower;

/// Peripheral configuration. All fields have defaults, so a configuration file
/// only needs to contain the values that differ.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Advertised local name.
    pub name: String,
    /// Advertising transmission power level.
    pub tx_power: TxPower,
    /// Whether advertisements are connectable.
    pub connectable: bool,
    /// GAP appearance value ([Assigned Numbers] Section 2.6).
    pub appearance: u16,
    /// Report layout declared by the report map.
    pub topology: Topology,
    /// Attribute permission requirements.
    pub security: Security,
    /// Notification retry policy.
    pub retry: RetryPolicy,
    /// Restart advertising after the host disconnects.
    pub readvertise: bool,
    /// Send zeroed reports of each kind when a host connects.
    pub initial_reports: bool,
    /// Open the auxiliary client connection used to read connection
    /// parameters.
    pub client_probe: bool,
}

impl Config {
    /// Generic Human Interface Device appearance.
    pub const GENERIC_HID: u16 = 0x03C0;

    /// Parses a JSON configuration.
    #[cfg(feature = "fs")]
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Loads a JSON configuration file.
    #[cfg(feature = "fs")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        let cfg = Self::from_json(&s)?;
        tracing::debug!("Loaded configuration: {}", path.display());
        Ok(cfg)
    }

    /// Loads the configuration from the current user's config directory or
    /// returns the default configuration if the file does not exist.
    #[cfg(feature = "fs")]
    pub fn per_user(app: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let Some(dir) = dirs::config_dir() else {
            tracing::warn!("User config directory not available");
            return Ok(Self::default());
        };
        match Self::load(dir.join(app).join("config.json")) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            r => r,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "hidpad".to_owned(),
            tx_power: TxPower::default(),
            connectable: true,
            appearance: Self::GENERIC_HID,
            topology: Topology::default(),
            security: Security::default(),
            retry: RetryPolicy::default(),
            readvertise: true,
            initial_reports: true,
            client_probe: true,
        }
    }
}

/// Notification retry policy. A failed notification is retried `attempts`
/// times, waiting `delay_ms` before each retry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Returns the delay before each retry.
    #[inline(always)]
    #[must_use]
    pub const fn delay(self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 10,
        }
    }
}

/// Error type returned when loading the configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "fs")]
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.name, "hidpad");
        assert_eq!(c.appearance, 0x03C0);
        assert_eq!(c.topology, Topology::Separate);
        assert_eq!(c.security, Security::Encrypted);
        assert_eq!(c.retry.attempts, 1);
        assert_eq!(c.retry.delay(), Duration::from_millis(10));
        assert!(c.readvertise && c.initial_reports && c.client_probe && c.connectable);
    }

    #[cfg(feature = "fs")]
    #[test]
    fn from_json() {
        let c = Config::from_json(
            r#"{
                "name": "desk",
                "tx_power": "ultra_low",
                "topology": "combined",
                "security": "open",
                "retry": {"attempts": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(c.name, "desk");
        assert_eq!(c.tx_power, TxPower::UltraLow);
        assert_eq!(c.topology, Topology::Combined);
        assert_eq!(c.security, Security::Open);
        assert_eq!(c.retry, RetryPolicy { attempts: 2, delay_ms: 10 });
        assert!(c.readvertise);

        assert!(matches::matches!(
            Config::from_json(r#"{"nmae": "x"}"#),
            Err(ConfigError::Json(_))
        ));
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[cfg(feature = "fs")]
    #[test]
    fn load() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"readvertise": false}"#).unwrap();
        let c = Config::load(f.path()).unwrap();
        assert!(!c.readvertise);

        let dir = tempfile::tempdir().unwrap();
        let r = Config::load(dir.path().join("missing.json"));
        assert!(matches::matches!(r, Err(ConfigError::Io(_))));
    }
}
