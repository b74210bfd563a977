use serde::Serialize;

/// Typed view of one frame after normalization. Any field may be null;
/// nulls propagate from absent or malformed extraction and never abort
/// processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedTipRecord {
    pub local_time: String,
    pub utc_time: String,
    pub stream_clock: Option<String>,
    pub tips_total: Option<f64>,
    pub members_total: Option<i64>,
    pub last_tipper: Option<String>,
    pub last_tip_value: Option<f64>,
    pub top_tipper: Option<String>,
    pub top_tip_value: Option<f64>,
    pub tips_goal: Option<f64>,
    pub members_goal: Option<i64>,
    pub tips_met: Option<bool>,
}

/// The subset of a record that is actually written, plus session linkage.
/// Emitted only when the change detector signals novelty.
#[derive(Debug, Clone, Serialize)]
pub struct TipEvent {
    pub session_id: Option<i64>,
    pub local_time: String,
    pub utc_time: String,
    pub stream_clock: Option<String>,
    pub tips_total: Option<f64>,
    pub members_total: Option<i64>,
    pub last_tipper: Option<String>,
    pub last_tipper_value: Option<f64>,
    pub top_tipper: Option<String>,
    pub top_tipper_value: Option<f64>,
}

impl TipEvent {
    pub fn from_record(record: &NormalizedTipRecord, session_id: Option<i64>) -> Self {
        Self {
            session_id,
            local_time: record.local_time.clone(),
            utc_time: record.utc_time.clone(),
            stream_clock: record.stream_clock.clone(),
            tips_total: record.tips_total,
            members_total: record.members_total,
            last_tipper: record.last_tipper.clone(),
            last_tipper_value: record.last_tip_value,
            top_tipper: record.top_tipper.clone(),
            top_tipper_value: record.top_tip_value,
        }
    }
}
