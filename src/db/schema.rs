use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reward_state (
            user_id     TEXT PRIMARY KEY,
            state       TEXT NOT NULL, -- JSON
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS claim_history (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id           TEXT NOT NULL,
            requested_points  INTEGER NOT NULL,
            admitted_points   INTEGER NOT NULL,
            claimed_totals    TEXT NOT NULL, -- JSON
            admitted_rewards  TEXT NOT NULL, -- JSON
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_claim_history_user ON claim_history(user_id, created_at DESC);
        ",
    )?;
    Ok(())
}
