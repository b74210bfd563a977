use log::debug;
use regex::Regex;

use super::patterns;
use crate::models::ExtractedFields;

/// Applies each field pattern to the top band first, then the bottom band.
/// Fields are extracted independently; a miss on one never blocks the others,
/// and all four missing is a valid result.
pub fn extract(top_text: &str, bottom_text: &str) -> ExtractedFields {
    ExtractedFields {
        last_tip: capture_band(&patterns::LAST_TIP, top_text, bottom_text, "last_tip"),
        top_tip: capture_band(&patterns::TOP_TIP, top_text, bottom_text, "top_tip"),
        goal: capture_band(&patterns::GOAL, top_text, bottom_text, "goal"),
        members: capture_band(&patterns::MEMBERS, top_text, bottom_text, "members"),
    }
}

fn capture_band(re: &Regex, top: &str, bottom: &str, field: &str) -> Option<String> {
    if let Some(raw) = first_capture(re, top) {
        debug!("top band matched {field}: {raw:?}");
        return Some(raw);
    }
    if let Some(raw) = first_capture(re, bottom) {
        debug!("bottom band matched {field}: {raw:?}");
        return Some(raw);
    }
    None
}

/// Returns the first capture group that participated in the match. The goal
/// and members patterns carry two alternative groups (pair form vs bare form);
/// whichever matched is handed on uninterpreted.
fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
    })
}
