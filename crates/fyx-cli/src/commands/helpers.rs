//! Helper utility functions for CLI commands

use fyx_storage::InterventionLogEntry;

/// Truncate to `max_chars` characters, not bytes
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Short description of how a logged intervention ended
pub fn describe_outcome(entry: &InterventionLogEntry) -> String {
    match entry.dismissed {
        None => "sent".to_string(),
        Some(true) => "dismissed".to_string(),
        Some(false) => match entry.correct {
            Some(correct) => format!("completed ({correct} correct)"),
            None => "completed".to_string(),
        },
    }
}
