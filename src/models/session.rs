use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two daily broadcast windows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionSlot {
    Morning,
    Night,
}

impl SessionSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSlot::Morning => "morning",
            SessionSlot::Night => "night",
        }
    }
}

impl std::fmt::Display for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one (day, slot) broadcast window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Active,
    Ended,
}

/// One row per calendar day per slot. `start_time` is written exactly once
/// when the row is first created; goals are first-non-null-wins and never
/// overwritten afterwards.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    pub id: i64,
    pub day: String,
    pub slot: SessionSlot,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub tips_goal: Option<f64>,
    pub members_goal: Option<i64>,
}
