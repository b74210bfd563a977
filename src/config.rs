use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::schedule::SessionSchedule;

/// Runtime knobs. Every field has a default, so the binary runs with no
/// config file at all; a JSON file overrides only the fields it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Channel name on the selected platform.
    pub channel: String,
    /// Delay between capture ticks while the stream is live.
    pub poll_interval_secs: u64,
    /// Delay between status probes while offline but near a session window.
    pub probe_interval_secs: u64,
    /// Settle delay before re-checking a positive online probe.
    pub settle_delay_secs: u64,
    /// Offline distance to the closest session anchor beyond which the
    /// monitor hibernates.
    pub hibernate_threshold_secs: i64,
    /// How long one hibernation nap lasts.
    pub hibernate_sleep_secs: u64,
    /// Fixed delay between resource-acquisition attempts.
    pub retry_delay_secs: u64,
    /// Consecutive acquisition/probe failures tolerated before a fatal abort.
    pub max_setup_attempts: u32,
    /// Window after session start during which a $0 tips total is treated as
    /// a warm-up artifact.
    pub warmup_grace_secs: u64,
    /// Daily session anchors, local time, "HH:MM".
    pub morning_anchor: String,
    pub night_anchor: String,
    /// SQLite database location (sqlite sink).
    pub db_path: PathBuf,
    /// Append-only event log location (jsonl sink).
    pub output_path: PathBuf,
    /// Capture helper argv; the helper owns the browser and the OCR engine.
    pub helper_command: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            poll_interval_secs: 5,
            probe_interval_secs: 120,
            settle_delay_secs: 5,
            hibernate_threshold_secs: 3600,
            hibernate_sleep_secs: 3600,
            retry_delay_secs: 10,
            max_setup_attempts: 3,
            warmup_grace_secs: 120,
            morning_anchor: "10:45".to_string(),
            night_anchor: "18:45".to_string(),
            db_path: PathBuf::from("db/tipwatch.sqlite3"),
            output_path: PathBuf::from("output/tip_events.jsonl"),
            helper_command: vec!["tipwatch-capture-helper".to_string()],
        }
    }
}

impl TrackerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn hibernate_sleep(&self) -> Duration {
        Duration::from_secs(self.hibernate_sleep_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn warmup_grace(&self) -> Duration {
        Duration::from_secs(self.warmup_grace_secs)
    }

    pub fn schedule(&self) -> Result<SessionSchedule> {
        let morning = parse_anchor(&self.morning_anchor).context("invalid morning_anchor")?;
        let night = parse_anchor(&self.night_anchor).context("invalid night_anchor")?;
        Ok(SessionSchedule::new(morning, night))
    }
}

fn parse_anchor(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("expected HH:MM, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = TrackerConfig::load(None).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.probe_interval_secs, 120);
        assert_eq!(config.hibernate_threshold_secs, 3600);
        assert!(config.schedule().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"channel": "somechannel", "poll_interval_secs": 2}"#).unwrap();

        let config = TrackerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.channel, "somechannel");
        assert_eq!(config.poll_interval_secs, 2);
        // Untouched fields keep their defaults.
        assert_eq!(config.probe_interval_secs, 120);
        assert_eq!(config.morning_anchor, "10:45");
    }

    #[test]
    fn bad_anchor_is_rejected() {
        let config = TrackerConfig {
            morning_anchor: "25:99".to_string(),
            ..Default::default()
        };
        assert!(config.schedule().is_err());
    }
}
