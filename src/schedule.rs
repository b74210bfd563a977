use chrono::{DateTime, Duration, Local, NaiveTime};

use crate::models::SessionSlot;

/// The two fixed daily broadcast anchors. At any instant exactly one slot is
/// "closest" by absolute distance to today's anchors; ties break toward
/// morning.
#[derive(Debug, Clone, Copy)]
pub struct SessionSchedule {
    morning: NaiveTime,
    night: NaiveTime,
}

impl SessionSchedule {
    pub fn new(morning: NaiveTime, night: NaiveTime) -> Self {
        Self { morning, night }
    }

    pub fn closest_slot(&self, now: DateTime<Local>) -> (SessionSlot, Duration) {
        let morning = distance_to_anchor(now, self.morning);
        let night = distance_to_anchor(now, self.night);
        if morning <= night {
            (SessionSlot::Morning, morning)
        } else {
            (SessionSlot::Night, night)
        }
    }

    /// Calendar-day key used for session rows.
    pub fn day_key(now: DateTime<Local>) -> String {
        now.format("%Y-%m-%d").to_string()
    }
}

fn distance_to_anchor(now: DateTime<Local>, anchor: NaiveTime) -> Duration {
    let now = now.naive_local();
    let target = now.date().and_time(anchor);
    let delta = target - now;
    if delta < Duration::zero() {
        -delta
    } else {
        delta
    }
}
