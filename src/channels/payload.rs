//! Selection payload codec: the only place button payload strings are built
//! or read.
//!
//! Format: `action=select_gender&gender=male`,
//! `action=select_activity&activity=low`.

use std::collections::HashMap;

use crate::onboarding::model::{Activity, Gender, Selection};

/// Encode a selection as a button payload.
pub fn encode_selection(selection: Selection) -> String {
    match selection {
        Selection::Gender(g) => format!("action=select_gender&gender={}", g.as_str()),
        Selection::Activity(a) => format!("action=select_activity&activity={}", a.as_str()),
    }
}

/// Decode a button payload. Unknown actions or values yield `None`.
pub fn decode_selection(payload: &str) -> Option<Selection> {
    let pairs: HashMap<&str, &str> = payload
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();

    match pairs.get("action").copied()? {
        "select_gender" => pairs
            .get("gender")
            .and_then(|g| g.parse::<Gender>().ok())
            .map(Selection::Gender),
        "select_activity" => match Activity::from_stored(pairs.get("activity")?) {
            Activity::Unknown => None,
            activity => Some(Selection::Activity(activity)),
        },
        _ => None,
    }
}
