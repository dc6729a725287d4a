/// Intervention log command handler
use anyhow::Result;
use chrono::Local;
use fyx_core::FyxConfig;
use fyx_storage::{Database, InterventionLogEntry};
use tabled::{Table, Tabled};

use super::helpers::{describe_outcome, truncate_str};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Tab")]
    tab: i64,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&InterventionLogEntry> for HistoryRow {
    fn from(entry: &InterventionLogEntry) -> Self {
        Self {
            time: entry
                .at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            tab: entry.tab_id,
            kind: entry.kind.to_string(),
            score: entry.score.map_or_else(|| "-".to_string(), |s| s.to_string()),
            outcome: describe_outcome(entry),
            message: truncate_str(entry.message.as_deref().unwrap_or(""), 40),
        }
    }
}

pub fn handle_history_command(config: &FyxConfig, limit: usize) -> Result<()> {
    let db = Database::new(config.storage.db_path.clone())?;
    let entries = db.recent_interventions(limit)?;

    if entries.is_empty() {
        println!("No interventions recorded yet.");
        return Ok(());
    }

    let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
    println!("{}", Table::new(rows));
    println!("\n{} of {} entries", entries.len(), db.intervention_count()?);
    Ok(())
}
