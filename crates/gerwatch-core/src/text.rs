use chrono::{Local, TimeZone};
use serde_json::Value;

pub const TRUNCATE_LEN: usize = 47;

/// Truncates to 47 visible characters plus an ellipsis; shorter text passes
/// through untouched.
pub fn trunc(text: &str) -> String {
    if text.chars().count() > TRUNCATE_LEN {
        let head: String = text.chars().take(TRUNCATE_LEN).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Formats an epoch-seconds field (string or number) for the Created On
/// column. Unparseable values render as an empty cell rather than failing
/// the whole row.
pub fn format_epoch(value: &Value) -> String {
    let secs = match value {
        Value::String(text) => text.trim().parse::<i64>().ok(),
        Value::Number(num) => num.as_i64(),
        _ => None,
    };
    let Some(secs) = secs else {
        return String::new();
    };
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|stamp| stamp.format("%I:%M %p %m/%d/%Y").to_string())
        .unwrap_or_default()
}

/// Wall-clock stamp for the footer summary line.
pub fn now_stamp() -> String {
    Local::now().format("%I:%M:%S %p %m/%d/%Y").to_string()
}
