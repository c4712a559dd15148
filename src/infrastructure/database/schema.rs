use sqlx::SqlitePool;

/// Tables are created idempotently at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS players (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS games (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        organizer_id TEXT NOT NULL,
        content_warnings TEXT NOT NULL DEFAULT '[]',
        min_players INTEGER,
        max_players INTEGER,
        created_at INTEGER NOT NULL,
        CHECK (min_players IS NULL OR max_players IS NULL OR min_players <= max_players)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS slots (
        id TEXT PRIMARY KEY,
        game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
        start_ms INTEGER NOT NULL,
        end_ms INTEGER NOT NULL,
        CHECK (start_ms < end_ms)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_slots_game ON slots(game_id)",
    r#"
    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        player_id TEXT NOT NULL,
        slot_id TEXT NOT NULL REFERENCES slots(id) ON DELETE CASCADE,
        priority INTEGER NOT NULL CHECK (priority BETWEEN 1 AND 5),
        state TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL,
        UNIQUE (player_id, slot_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_entries_slot ON entries(slot_id)",
    "CREATE INDEX IF NOT EXISTS idx_entries_player ON entries(player_id, state)",
];

pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
