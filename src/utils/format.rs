use chrono::{DateTime, Local, Utc};

/// Renders elapsed seconds as zero-padded `MM:SS`. Minutes keep growing past
/// 99 rather than rolling into hours.
pub fn format_duration(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

pub fn format_started_at(started_at: DateTime<Utc>) -> String {
    started_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
