use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use crate::domain::entities::{Entry, EntryState, Game, Player, Slot};
use crate::domain::repositories::{AllocationRepository, AllocationTx, RepositoryError};
use crate::domain::value_objects::{GamePredicate, PlayerBounds, Priority};
use crate::infrastructure::database::schema;

const GAME_COLUMNS: &str = "games.id, games.slug, games.name, games.summary, games.organizer_id, \
     games.content_warnings, games.min_players, games.max_players, games.created_at";

/// SQLite implementation of AllocationRepository
pub struct SqliteAllocationRepository {
    pool: SqlitePool,
}

impl SqliteAllocationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url` and make sure the schema exists.
    ///
    /// `busy_timeout` bounds both SQLite's wait on a locked database and the
    /// wait for a pooled connection.
    pub async fn connect(url: &str, busy_timeout: Duration) -> Result<Self, RepositoryError> {
        // Every connection to `:memory:` is its own database
        let in_memory = url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);
        if !in_memory {
            // Readers never block the single writer
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 8 })
            .acquire_timeout(busy_timeout)
            .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(600)) })
            .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        schema::create_schema(&pool).await.map_err(map_sqlx_error)?;

        Ok(Self::new(pool))
    }

    /// Get a reference to the database pool for direct queries
    pub fn get_db(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Transaction against the SQLite pool. Rolled back when dropped uncommitted.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

fn map_sqlx_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::PoolTimedOut => RepositoryError::Busy(e.to_string()),
        sqlx::Error::RowNotFound => RepositoryError::NotFound(e.to_string()),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() {
                return RepositoryError::AlreadyExists(db.message().to_string());
            }
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            match db.code().as_deref() {
                Some("5") | Some("6") | Some("261") | Some("517") | Some("262") => {
                    RepositoryError::Busy(db.message().to_string())
                }
                _ => RepositoryError::Database(e.to_string()),
            }
        }
        _ => RepositoryError::Database(e.to_string()),
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_game(row: &SqliteRow) -> Game {
    let content_warnings: String = row.get("content_warnings");
    let min_players: Option<i64> = row.get("min_players");
    let max_players: Option<i64> = row.get("max_players");

    Game {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        summary: row.get("summary"),
        organizer_id: row.get("organizer_id"),
        content_warnings: serde_json::from_str(&content_warnings).unwrap_or_default(),
        bounds: PlayerBounds::new(
            min_players.map(|v| v as u32),
            max_players.map(|v| v as u32),
        ),
        created_at: row.get("created_at"),
    }
}

fn row_to_slot(row: &SqliteRow) -> Slot {
    Slot {
        id: row.get("id"),
        game_id: row.get("game_id"),
        start: millis_to_datetime(row.get("start_ms")),
        end: millis_to_datetime(row.get("end_ms")),
    }
}

fn row_to_entry(row: &SqliteRow) -> Entry {
    let state_str: String = row.get("state");
    let priority: i64 = row.get("priority");

    Entry {
        id: row.get("id"),
        player_id: row.get("player_id"),
        slot_id: row.get("slot_id"),
        // The CHECK constraint keeps stored priorities in range
        priority: Priority::new(priority).unwrap_or(Priority::LOWEST),
        state: EntryState::from_str(&state_str).unwrap_or(EntryState::Pending),
        created_at: row.get("created_at"),
    }
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Translate a predicate into a SQL condition over `games`.
///
/// Every value goes through `push_bind`; only fixed SQL fragments are pushed
/// as text.
pub(crate) fn push_game_predicate(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &GamePredicate) {
    match predicate {
        GamePredicate::All(parts) => push_joined(qb, parts, " AND ", "1 = 1"),
        GamePredicate::Any(parts) => push_joined(qb, parts, " OR ", "1 = 0"),
        GamePredicate::Not(inner) => {
            qb.push("NOT (");
            push_game_predicate(qb, inner);
            qb.push(")");
        }
        GamePredicate::LacksContentWarning(cw) => {
            // content_warnings is a JSON array, so the quoted form matches whole items
            let quoted = serde_json::to_string(cw).unwrap_or_default();
            qb.push("games.content_warnings NOT LIKE ");
            qb.push_bind(format!("%{}%", escape_like(&quoted)));
            qb.push(" ESCAPE '\\'");
        }
        GamePredicate::OrganizedBy(player_id) => {
            qb.push("games.organizer_id = ");
            qb.push_bind(player_id.clone());
        }
        GamePredicate::EnteredBy(player_id) => {
            qb.push(
                "EXISTS (SELECT 1 FROM entries INNER JOIN slots ON entries.slot_id = slots.id \
                 WHERE entries.player_id = ",
            );
            qb.push_bind(player_id.clone());
            qb.push(" AND slots.game_id = games.id)");
        }
        GamePredicate::TextMatches(text) => {
            let pattern = format!("%{}%", escape_like(text));
            qb.push("(games.name LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR games.summary LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }
    }
}

fn push_joined(
    qb: &mut QueryBuilder<'_, Sqlite>,
    parts: &[GamePredicate],
    separator: &str,
    empty: &str,
) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        qb.push("(");
        push_game_predicate(qb, part);
        qb.push(")");
    }
}

fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, predicate: Option<&GamePredicate>) {
    if let Some(predicate) = predicate {
        qb.push(" WHERE ");
        push_game_predicate(qb, predicate);
    }
}

fn push_in_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[String]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl AllocationRepository for SqliteAllocationRepository {
    type Tx = SqliteTx;

    /// Takes the write lock at BEGIN. A deferred transaction that reads first
    /// and upgrades later gets SQLITE_BUSY without waiting on `busy_timeout`.
    async fn begin(&self) -> Result<SqliteTx, RepositoryError> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(map_sqlx_error)?;
        Ok(SqliteTx { tx })
    }

    async fn begin_read(&self) -> Result<SqliteTx, RepositoryError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(SqliteTx { tx })
    }
}

#[async_trait]
impl AllocationTx for SqliteTx {
    async fn find_game(&mut self, id: &str) -> Result<Option<Game>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM games WHERE id = ?", GAME_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(row_to_game))
    }

    async fn find_game_by_slug(&mut self, slug: &str) -> Result<Option<Game>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM games WHERE slug = ?", GAME_COLUMNS))
            .bind(slug)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(row_to_game))
    }

    async fn find_games_by_ids(&mut self, ids: &[String]) -> Result<Vec<Game>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM games WHERE id IN ", GAME_COLUMNS));
        push_in_list(&mut qb, ids);

        let rows = qb
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_game).collect())
    }

    async fn list_games(
        &mut self,
        predicate: Option<&GamePredicate>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Game>, RepositoryError> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM games", GAME_COLUMNS));
        push_where(&mut qb, predicate);
        qb.push(" ORDER BY games.created_at DESC, games.rowid DESC LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        let rows = qb
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_game).collect())
    }

    async fn count_games(
        &mut self,
        predicate: Option<&GamePredicate>,
    ) -> Result<u64, RepositoryError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS total FROM games");
        push_where(&mut qb, predicate);

        let row = qb
            .build()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.get::<i64, _>("total") as u64)
    }

    async fn insert_game(&mut self, game: &Game) -> Result<(), RepositoryError> {
        let content_warnings = serde_json::to_string(&game.content_warnings)
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO games (id, slug, name, summary, organizer_id, content_warnings,
                               min_players, max_players, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&game.id)
        .bind(&game.slug)
        .bind(&game.name)
        .bind(&game.summary)
        .bind(&game.organizer_id)
        .bind(content_warnings)
        .bind(game.bounds.min_players.map(i64::from))
        .bind(game.bounds.max_players.map(i64::from))
        .bind(game.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_game_bounds(
        &mut self,
        game_id: &str,
        bounds: &PlayerBounds,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE games SET min_players = ?, max_players = ? WHERE id = ?")
            .bind(bounds.min_players.map(i64::from))
            .bind(bounds.max_players.map(i64::from))
            .bind(game_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("game {}", game_id)));
        }
        Ok(())
    }

    async fn delete_game(&mut self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_slot(&mut self, id: &str) -> Result<Option<Slot>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM slots WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(row_to_slot))
    }

    async fn slots_for_game(&mut self, game_id: &str) -> Result<Vec<Slot>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM slots WHERE game_id = ? ORDER BY start_ms ASC, id ASC")
            .bind(game_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_slot).collect())
    }

    async fn all_slots(&mut self) -> Result<Vec<Slot>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM slots ORDER BY start_ms ASC, id ASC")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_slot).collect())
    }

    async fn insert_slot(&mut self, slot: &Slot) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO slots (id, game_id, start_ms, end_ms) VALUES (?, ?, ?, ?)")
            .bind(&slot.id)
            .bind(&slot.game_id)
            .bind(slot.start.timestamp_millis())
            .bind(slot.end.timestamp_millis())
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_slot(&mut self, slot: &Slot) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE slots SET start_ms = ?, end_ms = ? WHERE id = ?")
            .bind(slot.start.timestamp_millis())
            .bind(slot.end.timestamp_millis())
            .bind(&slot.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("slot {}", slot.id)));
        }
        Ok(())
    }

    async fn delete_slot(&mut self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM slots WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_entry(&mut self, id: &str) -> Result<Option<Entry>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(row_to_entry))
    }

    async fn find_entry_for(
        &mut self,
        player_id: &str,
        slot_id: &str,
    ) -> Result<Option<Entry>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM entries WHERE player_id = ? AND slot_id = ?")
            .bind(player_id)
            .bind(slot_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(row_to_entry))
    }

    async fn entries_for_slot(&mut self, slot_id: &str) -> Result<Vec<Entry>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM entries WHERE slot_id = ? ORDER BY created_at ASC, rowid ASC")
            .bind(slot_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn entries_for_player(
        &mut self,
        player_id: &str,
    ) -> Result<Vec<Entry>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM entries WHERE player_id = ? ORDER BY created_at ASC, rowid ASC")
            .bind(player_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn count_accepted(&mut self, slot_id: &str) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entries WHERE slot_id = ? AND state = 'accepted'",
        )
        .bind(slot_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count as u32)
    }

    async fn accepted_slots_for_player(
        &mut self,
        player_id: &str,
    ) -> Result<Vec<Slot>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT slots.*
            FROM slots
            INNER JOIN entries ON entries.slot_id = slots.id
            WHERE entries.player_id = ? AND entries.state = 'accepted'
            ORDER BY slots.start_ms ASC, slots.id ASC
            "#,
        )
        .bind(player_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(row_to_slot).collect())
    }

    async fn insert_entry(&mut self, entry: &Entry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO entries (id, player_id, slot_id, priority, state, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.player_id)
        .bind(&entry.slot_id)
        .bind(entry.priority.value() as i64)
        .bind(entry.state.as_str())
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_entry(&mut self, entry: &Entry) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE entries SET priority = ?, state = ? WHERE id = ?")
            .bind(entry.priority.value() as i64)
            .bind(entry.state.as_str())
            .bind(&entry.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("entry {}", entry.id)));
        }
        Ok(())
    }

    async fn delete_entry(&mut self, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_player(&mut self, player: &Player) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO players (id, username) VALUES (?, ?)
            ON CONFLICT (id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(&player.id)
        .bind(&player.username)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_players_by_ids(
        &mut self,
        ids: &[String],
    ) -> Result<Vec<Player>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new("SELECT id, username FROM players WHERE id IN ");
        push_in_list(&mut qb, ids);

        let rows = qb
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .iter()
            .map(|row| Player {
                id: row.get("id"),
                username: row.get("username"),
            })
            .collect())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
