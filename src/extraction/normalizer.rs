use chrono::SecondsFormat;

use super::patterns;
use crate::models::{ExtractedFields, NormalizedTipRecord, RawOcrFrame};

/// Turns raw captures into typed values. Pure function: malformed substrings
/// degrade to null, nothing here ever fails.
pub fn normalize(frame: &RawOcrFrame, fields: &ExtractedFields) -> NormalizedTipRecord {
    let (last_tipper, last_tip_value) = split_tip(fields.last_tip.as_deref());
    let (top_tipper, top_tip_value) = split_tip(fields.top_tip.as_deref());
    let (tips_total, tips_goal, tips_met) = split_goal(fields.goal.as_deref());
    let (members_total, members_goal) = split_members(fields.members.as_deref());

    NormalizedTipRecord {
        local_time: frame
            .captured_at_local
            .to_rfc3339_opts(SecondsFormat::Secs, false),
        utc_time: frame
            .captured_at_utc
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        stream_clock: frame.stream_clock.clone(),
        tips_total,
        members_total,
        last_tipper,
        last_tip_value,
        top_tipper,
        top_tip_value,
        tips_goal,
        members_goal,
        tips_met,
    }
}

/// Re-matches a tip capture against the name-then-amount sub-pattern.
/// A capture that doesn't yield both halves nulls the whole field; a name
/// must never survive without its value or vice versa.
fn split_tip(raw: Option<&str>) -> (Option<String>, Option<f64>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    let Some(caps) = patterns::TIP_NAME_AMOUNT.captures(raw) else {
        return (None, None);
    };
    let amount = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
    match amount {
        Some(value) => {
            let name = caps.get(1).map(|m| m.as_str().to_string());
            (name, Some(value))
        }
        None => (None, None),
    }
}

/// Tokenizes a goal capture. Two tokens are the progress form (current, then
/// target, goal not yet met); a single token is the total shown once the goal
/// has been reached. Unparseable tokens null that position only.
fn split_goal(raw: Option<&str>) -> (Option<f64>, Option<f64>, Option<bool>) {
    let Some(raw) = raw else {
        return (None, None, None);
    };
    let tokens: Vec<Option<f64>> = patterns::MONEY_TOKEN
        .find_iter(raw)
        .map(|m| m.as_str().trim_start_matches('$').parse::<f64>().ok())
        .collect();
    match tokens.as_slice() {
        [] => (None, None, None),
        [total] => (*total, None, Some(true)),
        [total, goal, ..] => (*total, *goal, Some(false)),
    }
}

/// Same two-token-vs-one-token shape as the goal, integer-valued.
fn split_members(raw: Option<&str>) -> (Option<i64>, Option<i64>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    let tokens: Vec<Option<i64>> = patterns::INT_TOKEN
        .find_iter(raw)
        .map(|m| m.as_str().parse::<i64>().ok())
        .collect();
    match tokens.as_slice() {
        [] => (None, None),
        [total] => (*total, None),
        [total, goal, ..] => (*total, *goal),
    }
}
