use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if table or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Intervention log - dispatches and reported outcomes, newest kept
    conn.execute(
        "CREATE TABLE IF NOT EXISTS intervention_log (
            id TEXT PRIMARY KEY,
            tab_id INTEGER NOT NULL,
            at TEXT NOT NULL,
            kind TEXT NOT NULL,
            score INTEGER,
            reason TEXT,
            message TEXT,
            correct INTEGER,
            dismissed INTEGER,
            duration_ms INTEGER,
            seq INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_intervention_log_seq ON intervention_log(seq)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_intervention_log_tab ON intervention_log(tab_id)",
        [],
    )?;

    Ok(())
}
