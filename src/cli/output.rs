//! Output formatting for CLI commands

use crate::notification::HistoryRecord;
use serde::Serialize;

/// Format output as pretty JSON
pub fn format_output<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// One history record per line
pub fn format_history(records: &[HistoryRecord], json: bool) -> String {
    if json {
        return format_output(&records);
    }
    if records.is_empty() {
        return "暂无分发记录".to_string();
    }

    records
        .iter()
        .map(|r| {
            format!(
                "{}  {:<6}  {:<18}  {} ({}/{})",
                r.ts.format("%Y-%m-%d %H:%M:%S"),
                r.priority.as_str(),
                r.outcome,
                r.sender,
                r.class,
                r.instance
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;
    use chrono::{TimeZone, Utc};

    fn record() -> HistoryRecord {
        HistoryRecord {
            ts: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
            sender: "bob".to_string(),
            class: "alice".to_string(),
            instance: "andromeda".to_string(),
            priority: Priority::Urgent,
            outcome: "sent".to_string(),
        }
    }

    #[test]
    fn test_format_history_text() {
        let text = format_history(&[record()], false);
        assert!(text.starts_with("2026-10-19 12:00:00"));
        assert!(text.contains("URGENT"));
        assert!(text.contains("bob (alice/andromeda)"));
    }

    #[test]
    fn test_format_history_json() {
        let text = format_history(&[record()], true);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["outcome"], "sent");
    }

    #[test]
    fn test_format_history_empty() {
        assert_eq!(format_history(&[], false), "暂无分发记录");
    }
}
