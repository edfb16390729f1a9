use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};

/// Current time at the millisecond precision timestamps are persisted with.
///
/// Keeping in-memory and persisted timestamps identical means a rehydrated
/// session derives the same elapsed times as the one it replaces.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compact elapsed-time rendering: `0s`, `850ms`, `42s`, `1m5.25s`, `1h0m3s`.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let total_ms = elapsed.num_milliseconds().max(0);
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{}ms", total_ms);
    }

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let millis = total_ms % 60_000;

    let mut seconds = format!("{}.{:03}", millis / 1000, millis % 1000);
    while seconds.ends_with('0') {
        seconds.pop();
    }
    if seconds.ends_with('.') {
        seconds.pop();
    }

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
