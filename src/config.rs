//! Unified configuration for Sluice.
//!
//! Settings are read from `sluice.toml` and layered: file → environment →
//! CLI flags (applied by the command handlers). Every section has working
//! defaults, so a missing file is not an error.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8787
//! bind = "127.0.0.1"
//! dev_mode = false
//!
//! [database]
//! path = ".sluice/workorders.db"
//!
//! [escalation]
//! enabled = true
//! sweep_interval_secs = 3600
//! deadline_hours = 24
//! default_disposition = "completed"
//! # urgent_deadline_hours = 6
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::workorder::escalation::EscalationConfig;
use crate::workorder::models::InterventionDisposition;

pub const CONFIG_FILE: &str = "sluice.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    /// Permissive CORS for local UI development.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            bind: "127.0.0.1".to_string(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".sluice/workorders.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSection {
    pub enabled: bool,
    pub sweep_interval_secs: u64,
    pub deadline_hours: i64,
    pub urgent_deadline_hours: Option<i64>,
    pub important_deadline_hours: Option<i64>,
    pub normal_deadline_hours: Option<i64>,
    pub default_disposition: InterventionDisposition,
}

impl Default for EscalationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 3600,
            deadline_hours: 24,
            urgent_deadline_hours: None,
            important_deadline_hours: None,
            normal_deadline_hours: None,
            default_disposition: InterventionDisposition::Completed,
        }
    }
}

impl EscalationSection {
    pub fn to_escalation_config(&self) -> EscalationConfig {
        EscalationConfig {
            sweep_interval_secs: self.sweep_interval_secs,
            deadline_hours: self.deadline_hours,
            urgent_deadline_hours: self.urgent_deadline_hours,
            important_deadline_hours: self.important_deadline_hours,
            normal_deadline_hours: self.normal_deadline_hours,
            default_disposition: self.default_disposition,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SluiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub escalation: EscalationSection,
}

impl SluiceConfig {
    /// Load configuration from `dir/sluice.toml`, falling back to defaults
    /// when the file does not exist, then apply environment overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides sit between the file and CLI flags.
    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("SLUICE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("SLUICE_DB") {
            if !path.is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SluiceConfig::load(dir.path()).unwrap();
        assert_eq!(config.server.port, 8787);
        assert!(config.escalation.enabled);
        assert_eq!(config.escalation.deadline_hours, 24);
        assert_eq!(
            config.escalation.default_disposition,
            InterventionDisposition::Completed
        );
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
            [escalation]
            deadline_hours = 12
            default_disposition = "rejected"
            urgent_deadline_hours = 4
            "#,
        )
        .unwrap();

        let config = SluiceConfig::load(dir.path()).unwrap();
        assert_eq!(config.escalation.deadline_hours, 12);
        assert_eq!(config.escalation.urgent_deadline_hours, Some(4));
        assert_eq!(
            config.escalation.default_disposition,
            InterventionDisposition::Rejected
        );
        // Untouched sections keep their defaults
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.database.path, PathBuf::from(".sluice/workorders.db"));
    }

    #[test]
    fn test_invalid_file_is_an_error_not_a_silent_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "deadline_hours = [not toml").unwrap();
        assert!(SluiceConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_escalation_section_converts_to_scheduler_config() {
        let section = EscalationSection {
            deadline_hours: 48,
            urgent_deadline_hours: Some(8),
            ..Default::default()
        };
        let config = section.to_escalation_config();
        assert_eq!(config.deadline_hours, 48);
        assert_eq!(config.urgent_deadline_hours, Some(8));
    }
}
