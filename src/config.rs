//! Monitor configuration, stored as a plain JSON file.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Name of the external output to switch (as configured in the fleet
    /// portal).
    #[serde(default = "default_output_name")]
    pub buzzer_output_name: String,
    /// How long the buzzer stays on, in seconds.
    #[serde(default = "default_buzzer_duration")]
    pub buzzer_duration: u64,
    /// Seconds between event-feed polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Minimum minutes between two alerts for the same vehicle.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    /// Maximum event ids remembered before the dedup store is compacted.
    #[serde(default = "default_dedup_ceiling")]
    pub dedup_ceiling: usize,
    #[serde(default = "default_alert_log_path")]
    pub alert_log_path: String,
}

fn default_output_name() -> String {
    "Low Bridge".to_string()
}

fn default_buzzer_duration() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    2
}

fn default_cooldown_minutes() -> i64 {
    5
}

fn default_dedup_ceiling() -> usize {
    1000
}

fn default_alert_log_path() -> String {
    "alert_log.csv".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buzzer_output_name: default_output_name(),
            buzzer_duration: default_buzzer_duration(),
            poll_interval: default_poll_interval(),
            cooldown_minutes: default_cooldown_minutes(),
            dedup_ceiling: default_dedup_ceiling(),
            alert_log_path: default_alert_log_path(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads the config, writing a default file first if none exists.
    pub fn load_or_create(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "Config file not found, creating defaults");
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        Self::load(path)
    }
}
