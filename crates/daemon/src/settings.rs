//! Daemon configuration
//!
//! Layers, later wins: built-in defaults, the TOML file named by
//! `HEALTHPOINT_CONFIG` (default `~/.healthpoint/healthpoint.toml`, optional),
//! then `HEALTHPOINT__*` environment variables (`HEALTHPOINT__RPC__PORT=9700`).

use anyhow::{bail, Context, Result};
use healthpoint_core::domain::{default_departments, default_slots, Department};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "~/.healthpoint/healthpoint.toml";
const DEFAULT_DB_PATH: &str = "~/.healthpoint/healthpoint.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    /// Daily-rotated JSON log files go here when set
    pub log_dir: Option<String>,
    pub rpc: RpcSettings,
    pub queue: QueueSettings,
    pub departments: Vec<Department>,
    pub appointments: AppointmentSettings,
    pub persistence: PersistenceSettings,
    pub maintenance: MaintenanceSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub fixed_overhead_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppointmentSettings {
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// How long RPC mutations wait for their write before answering
    pub ack_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceSettings {
    pub retention_days: i64,
    pub interval_hours: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            log_dir: None,
            rpc: RpcSettings::default(),
            queue: QueueSettings::default(),
            departments: default_departments(),
            appointments: AppointmentSettings::default(),
            persistence: PersistenceSettings::default(),
            maintenance: MaintenanceSettings::default(),
        }
    }
}

impl Default for RpcSettings {
    fn default() -> Self {
        let defaults = healthpoint_api_rpc::RpcServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            fixed_overhead_minutes: healthpoint_core::application::DEFAULT_FIXED_OVERHEAD_MINUTES,
        }
    }
}

impl Default for AppointmentSettings {
    fn default() -> Self {
        Self {
            slots: default_slots(),
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            ack_timeout_ms: 500,
        }
    }
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            retention_days: 7,
            interval_hours: 24,
        }
    }
}

impl Settings {
    /// Load from the standard locations
    pub fn load() -> Result<Self> {
        let path = std::env::var("HEALTHPOINT_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&shellexpand::tilde(&path))
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::from(Path::new(path)).required(false))
            .add_source(
                config::Environment::with_prefix("HEALTHPOINT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let mut settings: Settings = raw
            .try_deserialize()
            .context("Invalid configuration values")?;
        settings.db_path = shellexpand::tilde(&settings.db_path).into_owned();
        settings.log_dir = settings
            .log_dir
            .map(|dir| shellexpand::tilde(&dir).into_owned());

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&mut self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            bail!("db_path must not be empty");
        }

        let mut seen = HashSet::new();
        let mut checked = Vec::with_capacity(self.departments.len());
        for dept in &self.departments {
            if !seen.insert(dept.id.clone()) {
                bail!("Department {} is configured twice", dept.id);
            }
            checked.push(Department::new(
                dept.id.clone(),
                dept.name.clone(),
                dept.baseline_service_minutes,
            )?);
        }
        if checked.is_empty() {
            bail!("At least one department must be configured");
        }
        self.departments = checked;

        let mut slots = HashSet::new();
        for slot in &self.appointments.slots {
            if slot.trim().is_empty() || !slots.insert(slot) {
                bail!("Appointment slot '{}' is empty or duplicated", slot);
            }
        }

        if self.persistence.max_attempts == 0 {
            bail!("persistence.max_attempts must be at least 1");
        }
        if self.maintenance.retention_days < 1 {
            bail!("maintenance.retention_days must be at least 1");
        }
        if self.maintenance.interval_hours == 0 {
            bail!("maintenance.interval_hours must be at least 1");
        }
        Ok(())
    }

    /// sqlx connection URL for `db_path`
    pub fn database_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            self.db_path.clone()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence.ack_timeout_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance.interval_hours * 60 * 60)
    }
}
