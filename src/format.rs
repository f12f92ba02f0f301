//! Human-readable formatting for file sizes and timestamps.

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

/// Format a byte count as B/KB/MB/GB with one decimal place.
pub fn human_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{bytes}B")
    } else if bytes < MIB {
        format!("{:.1}KB", bytes as f64 / KIB as f64)
    } else if bytes < GIB {
        format!("{:.1}MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.1}GB", bytes as f64 / GIB as f64)
    }
}

/// Format an epoch-seconds timestamp as `YYYY-MM-DD HH:MM` in local time,
/// falling back to UTC when no local offset is available.
pub fn human_time(epoch_seconds: i64) -> String {
    const DISPLAY_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]");
    let Ok(utc) = OffsetDateTime::from_unix_timestamp(epoch_seconds) else {
        return String::from("-");
    };
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    utc.to_offset(offset)
        .format(DISPLAY_FORMAT)
        .unwrap_or_else(|_| String::from("-"))
}

/// Format an epoch-nanoseconds modification time for display.
pub fn human_mtime(modified_ns: i64) -> String {
    human_time(modified_ns.div_euclid(1_000_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_scale_through_units() {
        assert_eq!(human_size(512), "512B");
        assert_eq!(human_size(1536), "1.5KB");
        assert_eq!(human_size(5 * MIB + MIB / 2), "5.5MB");
        assert_eq!(human_size(2 * GIB), "2.0GB");
    }

    #[test]
    fn invalid_timestamps_render_placeholder() {
        assert_eq!(human_time(i64::MAX), "-");
    }

    #[test]
    fn mtime_truncates_to_seconds() {
        let rendered = human_mtime(1_700_000_000_123_456_789);
        assert!(rendered.starts_with("2023-11-1"), "got {rendered}");
    }
}
