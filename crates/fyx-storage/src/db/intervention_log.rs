use anyhow::Result;
use rusqlite::{params, Row};

use crate::models::InterventionLogEntry;

use super::helpers::{duration_from_sql, duration_to_sql, parse_datetime, parse_kind, parse_uuid};
use super::Database;

impl Database {
    /// Append an entry and prune the log to the newest `limit` rows
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or prune statement fails
    pub fn append_intervention(&self, entry: &InterventionLogEntry, limit: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO intervention_log
                (id, tab_id, at, kind, score, reason, message, correct, dismissed, duration_ms, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM intervention_log))",
            params![
                entry.id.to_string(),
                entry.tab_id,
                entry.at.to_rfc3339(),
                entry.kind.as_str(),
                entry.score,
                entry.reason,
                entry.message,
                entry.correct,
                entry.dismissed,
                entry.duration_ms.map(duration_to_sql),
            ],
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let pruned = conn.execute(
            "DELETE FROM intervention_log
             WHERE seq NOT IN (SELECT seq FROM intervention_log ORDER BY seq DESC LIMIT ?1)",
            params![limit],
        )?;
        if pruned > 0 {
            log::debug!("Pruned {pruned} old intervention log entries");
        }
        Ok(())
    }

    /// Get the most recent entries, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded
    pub fn recent_interventions(&self, limit: usize) -> Result<Vec<InterventionLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, tab_id, at, kind, score, reason, message, correct, dismissed, duration_ms
             FROM (SELECT * FROM intervention_log ORDER BY seq DESC LIMIT ?1)
             ORDER BY seq ASC",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![limit], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get every logged entry for one tab, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub fn interventions_for_tab(&self, tab_id: i64) -> Result<Vec<InterventionLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, tab_id, at, kind, score, reason, message, correct, dismissed, duration_ms
             FROM intervention_log
             WHERE tab_id = ?1
             ORDER BY seq ASC",
        )?;

        let entries = stmt
            .query_map(params![tab_id], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Count logged entries
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub fn intervention_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM intervention_log", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<InterventionLogEntry> {
        Ok(InterventionLogEntry {
            id: parse_uuid(&row.get::<_, String>(0)?)?,
            tab_id: row.get(1)?,
            at: parse_datetime(&row.get::<_, String>(2)?)?,
            kind: parse_kind(&row.get::<_, String>(3)?)?,
            score: row.get(4)?,
            reason: row.get(5)?,
            message: row.get(6)?,
            correct: row.get(7)?,
            dismissed: row.get(8)?,
            duration_ms: row.get::<_, Option<i64>>(9)?.map(duration_from_sql),
        })
    }
}
