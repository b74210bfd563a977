//! Compiled capture patterns for the overlay bands.
//!
//! The band patterns are deliberately loose: the text comes out of an OCR
//! engine pointed at a video overlay, so the labels arrive with predictable
//! letterform confusions (Tip/Tin, Top/Ton, dropped descenders). Each capture
//! stops at the next overlay label or at end of text. Interpretation of the
//! captured substrings happens in the normalizer, not here.

use once_cell::sync::Lazy;
use regex::Regex;

/// "Last Tip: <name and amount>" up to the following "Top Tip" label.
/// YouTube overlays label the same field "Last Super Chat".
pub static LAST_TIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:Last|Lasl)\s*(?:Ti[pn]|Super(?:\s*Chat)?)[^:;]*[:;]\s*(.+?)(?:\s*To[pn]\s*Ti[pn]|\s*$)")
        .unwrap()
});

/// "Top Tip: <name and amount>" up to the goal/members labels.
pub static TOP_TIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)To[pn]\s*Ti[pn]\s*[:;]\s*(.+?)(?:\s*(?:Ti[pn]s\s*(?:Goal|Total)|Members|Subs)|\s*$)")
        .unwrap()
});

/// Tips goal, either as a "$current/$target" progress pair (first group) or a
/// bare "$total" once the goal is met (second group).
pub static GOAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Goal|Total)\s*[:;]\s*(?:(\$\d+(?:\.\d+)?/\$\d+(?:\.\d+)?)|(\$\d+(?:\.\d+)?))")
        .unwrap()
});

/// Membership count, "current/target" pair or bare count.
pub static MEMBERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Members\s*[:;]\s*(?:(\d+/\d+)|(\d+))").unwrap());

/// Splits a captured tip blurb into tipper name and dollar amount.
/// The junk class between name and amount swallows whatever bracketing the
/// overlay (or the OCR) put around the value.
pub static TIP_NAME_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*?)\s*[^a-zA-Z0-9]*\$(\d+\.?\d*)").unwrap());

/// Numeric token with optional currency prefix, for goal captures.
pub static MONEY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$?\d+\.?\d*").unwrap());

/// Bare integer token, for member captures.
pub static INT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
