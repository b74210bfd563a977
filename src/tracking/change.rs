use std::time::{Duration, Instant};

use crate::models::NormalizedTipRecord;

/// Decides whether a freshly normalized record is novel enough to write.
///
/// A record persists when at least one of the six mutable fields is non-null
/// and differs from the last accepted snapshot. The rule is deliberately
/// coarse (any-field-changed, not full-record diffing) so partial overlay
/// updates still land.
pub struct ChangeDetector {
    last_accepted: NormalizedTipRecord,
    session_started: Option<Instant>,
    seen_nonzero_total: bool,
    warmup_grace: Duration,
}

impl ChangeDetector {
    pub fn new(warmup_grace: Duration) -> Self {
        Self {
            last_accepted: NormalizedTipRecord::default(),
            session_started: None,
            seen_nonzero_total: false,
            warmup_grace,
        }
    }

    /// Clears the snapshot and restarts the warm-up window. Called once per
    /// online transition.
    pub fn begin_session(&mut self) {
        self.last_accepted = NormalizedTipRecord::default();
        self.session_started = Some(Instant::now());
        self.seen_nonzero_total = false;
    }

    pub fn should_persist(&self, candidate: &NormalizedTipRecord) -> bool {
        if self.is_warmup_zero(candidate) {
            return false;
        }
        let last = &self.last_accepted;
        changed(&candidate.tips_total, &last.tips_total)
            || changed(&candidate.members_total, &last.members_total)
            || changed(&candidate.last_tipper, &last.last_tipper)
            || changed(&candidate.last_tip_value, &last.last_tip_value)
            || changed(&candidate.top_tipper, &last.top_tipper)
            || changed(&candidate.top_tip_value, &last.top_tip_value)
    }

    /// Replaces the retained snapshot. Callers invoke this only after the
    /// record was actually written, so a rejected write stays comparable.
    pub fn accept(&mut self, candidate: &NormalizedTipRecord) {
        if matches!(candidate.tips_total, Some(total) if total != 0.0) {
            self.seen_nonzero_total = true;
        }
        self.last_accepted = candidate.clone();
    }

    /// The overlay renders "$0" while the broadcast warms up. Treat a zero
    /// total as an artifact until a real total has been seen or the grace
    /// window has lapsed; after that, zeros fall through to the normal
    /// novelty rule.
    fn is_warmup_zero(&self, candidate: &NormalizedTipRecord) -> bool {
        candidate.tips_total == Some(0.0)
            && !self.seen_nonzero_total
            && self
                .session_started
                .map(|started| started.elapsed() < self.warmup_grace)
                .unwrap_or(false)
    }
}

fn changed<T: PartialEq>(candidate: &Option<T>, last: &Option<T>) -> bool {
    candidate.is_some() && candidate != last
}
