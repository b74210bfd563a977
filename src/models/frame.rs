use chrono::{DateTime, Local, Utc};

/// Raw OCR output for a single poll tick: one string per cropped band.
/// Either band may be empty or pure noise; nothing downstream assumes structure.
#[derive(Debug, Clone)]
pub struct RawOcrFrame {
    pub top_text: String,
    pub bottom_text: String,
    pub stream_clock: Option<String>,
    pub captured_at_local: DateTime<Local>,
    pub captured_at_utc: DateTime<Utc>,
}

impl RawOcrFrame {
    pub fn captured_now(
        top_text: String,
        bottom_text: String,
        stream_clock: Option<String>,
    ) -> Self {
        Self {
            top_text,
            bottom_text,
            stream_clock,
            captured_at_local: Local::now(),
            captured_at_utc: Utc::now(),
        }
    }
}

/// Raw captures per overlay field, each independently present or absent.
/// A field is present only if its pattern matched the top band or, failing
/// that, the bottom band. All-absent is a valid "nothing usable this tick"
/// outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub last_tip: Option<String>,
    pub top_tip: Option<String>,
    pub goal: Option<String>,
    pub members: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.last_tip.is_none()
            && self.top_tip.is_none()
            && self.goal.is_none()
            && self.members.is_none()
    }
}
