use log::debug;

use crate::models::{NormalizedTipRecord, SessionMetadata, SessionPhase};

/// Goal fields that are about to be written for the first time this session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalClaims {
    pub tips_goal: Option<f64>,
    pub members_goal: Option<i64>,
}

impl GoalClaims {
    pub fn is_empty(&self) -> bool {
        self.tips_goal.is_none() && self.members_goal.is_none()
    }
}

/// State machine for one broadcast window: NotStarted → Active → Ended.
///
/// The tracker holds a cached copy of the session row; the store owns the
/// durable truth (start_time idempotence across restarts comes from the
/// ensure-row lookup there, not from this struct).
pub struct SessionTracker {
    phase: SessionPhase,
    current: Option<SessionMetadata>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            current: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current(&self) -> Option<&SessionMetadata> {
        self.current.as_ref()
    }

    /// Transition to Active with the store-backed metadata row. Calling this
    /// again while already active leaves the original row in place.
    pub fn activate(&mut self, meta: SessionMetadata) {
        if self.phase == SessionPhase::Active {
            debug!("session {} already active; activation ignored", meta.id);
            return;
        }
        debug!("session {} ({} {}) active", meta.id, meta.day, meta.slot);
        self.current = Some(meta);
        self.phase = SessionPhase::Active;
    }

    /// Goals still unset on the cached row that this record could fill.
    /// First non-null observation wins; later drift is ignored. Does not
    /// mutate; callers persist the claims, then confirm with `mark_goals`.
    pub fn pending_goals(&self, record: &NormalizedTipRecord) -> GoalClaims {
        let mut claims = GoalClaims::default();
        if self.phase != SessionPhase::Active {
            return claims;
        }
        let Some(meta) = self.current.as_ref() else {
            return claims;
        };
        if meta.tips_goal.is_none() {
            claims.tips_goal = record.tips_goal;
        }
        if meta.members_goal.is_none() {
            claims.members_goal = record.members_goal;
        }
        claims
    }

    /// Confirms claims that were successfully persisted.
    pub fn mark_goals(&mut self, claims: &GoalClaims) {
        let Some(meta) = self.current.as_mut() else {
            return;
        };
        if claims.tips_goal.is_some() {
            meta.tips_goal = claims.tips_goal;
        }
        if claims.members_goal.is_some() {
            meta.members_goal = claims.members_goal;
        }
    }

    /// Offline transition. Returns the session row id to stamp with an end
    /// time, or None when there is nothing to end (idempotent).
    pub fn end(&mut self) -> Option<i64> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.phase = SessionPhase::Ended;
        self.current.as_ref().map(|meta| meta.id)
    }

    /// Back to NotStarted for the next broadcast window.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::SessionSlot;

    fn meta() -> SessionMetadata {
        SessionMetadata {
            id: 7,
            day: "2026-08-08".to_string(),
            slot: SessionSlot::Morning,
            start_time: Utc::now(),
            end_time: None,
            tips_goal: None,
            members_goal: None,
        }
    }

    fn record_with_goals(tips: Option<f64>, members: Option<i64>) -> NormalizedTipRecord {
        NormalizedTipRecord {
            tips_goal: tips,
            members_goal: members,
            ..Default::default()
        }
    }

    #[test]
    fn activation_is_idempotent() {
        let mut tracker = SessionTracker::new();
        tracker.activate(meta());
        let mut other = meta();
        other.id = 99;
        tracker.activate(other);
        assert_eq!(tracker.current().unwrap().id, 7);
        assert_eq!(tracker.phase(), SessionPhase::Active);
    }

    #[test]
    fn first_non_null_goal_wins() {
        let mut tracker = SessionTracker::new();
        tracker.activate(meta());

        let claims = tracker.pending_goals(&record_with_goals(Some(500.0), None));
        assert_eq!(claims.tips_goal, Some(500.0));
        assert_eq!(claims.members_goal, None);
        tracker.mark_goals(&claims);

        // OCR drift on a later tick must not reopen the field.
        let claims = tracker.pending_goals(&record_with_goals(Some(600.0), Some(40)));
        assert_eq!(claims.tips_goal, None);
        assert_eq!(claims.members_goal, Some(40));
    }

    #[test]
    fn unconfirmed_claims_are_offered_again() {
        let mut tracker = SessionTracker::new();
        tracker.activate(meta());

        // Persist failed, mark_goals never ran: the next tick re-claims.
        let _ = tracker.pending_goals(&record_with_goals(Some(500.0), None));
        let retry = tracker.pending_goals(&record_with_goals(Some(500.0), None));
        assert_eq!(retry.tips_goal, Some(500.0));
    }

    #[test]
    fn no_claims_outside_active_phase() {
        let mut tracker = SessionTracker::new();
        let claims = tracker.pending_goals(&record_with_goals(Some(500.0), Some(40)));
        assert!(claims.is_empty());

        tracker.activate(meta());
        tracker.end();
        let claims = tracker.pending_goals(&record_with_goals(Some(500.0), Some(40)));
        assert!(claims.is_empty());
    }

    #[test]
    fn end_fires_once() {
        let mut tracker = SessionTracker::new();
        tracker.activate(meta());
        assert_eq!(tracker.end(), Some(7));
        assert_eq!(tracker.end(), None);
        assert_eq!(tracker.phase(), SessionPhase::Ended);
    }

    #[test]
    fn end_before_activation_is_a_noop() {
        let mut tracker = SessionTracker::new();
        assert_eq!(tracker.end(), None);
        assert_eq!(tracker.phase(), SessionPhase::NotStarted);
    }
}
