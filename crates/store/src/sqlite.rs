use {
    async_trait::async_trait,
    serde_json::Value,
    sqlx::{
        Row, SqlitePool, TypeInfo, ValueRef,
        sqlite::{SqlitePoolOptions, SqliteRow},
    },
    tracing::debug,
};

use teleagent_channels::{
    Error as ChannelError, LoggedMessage, MembershipRow, MessageRecord, QueryRows,
    Result as ChannelResult, Store,
};

use crate::error::{Context, Result};

/// SQLite-backed record store for memberships, watched-channel messages and
/// the watchlist.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> ChannelError {
    move |e| ChannelError::external(context, e)
}

impl SqliteStore {
    /// Open a pool and apply migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open {database_url}"))?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Use an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn record_membership(&self, channel_handle: &str, joined_at: i64) -> ChannelResult<()> {
        sqlx::query(
            "INSERT INTO membership (channel_handle, joined_at) VALUES (?, ?)
             ON CONFLICT(channel_handle) DO UPDATE SET joined_at = excluded.joined_at",
        )
        .bind(channel_handle)
        .bind(joined_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("record membership"))?;
        Ok(())
    }

    async fn remove_membership(&self, channel_handle: &str) -> ChannelResult<bool> {
        let result = sqlx::query("DELETE FROM membership WHERE channel_handle = ?")
            .bind(channel_handle)
            .execute(&self.pool)
            .await
            .map_err(db_err("remove membership"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_memberships(&self) -> ChannelResult<Vec<MembershipRow>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT channel_handle, joined_at FROM membership ORDER BY joined_at, channel_handle",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list memberships"))?;

        Ok(rows
            .into_iter()
            .map(|(channel_handle, joined_at)| MembershipRow {
                channel_handle,
                joined_at,
            })
            .collect())
    }

    async fn append_message(&self, record: &MessageRecord) -> ChannelResult<()> {
        sqlx::query(
            "INSERT INTO messages (sender_id, sender_handle, channel_handle, text, sent_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.sender_id)
        .bind(&record.sender_handle)
        .bind(&record.channel_handle)
        .bind(&record.text)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("append message"))?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        channel_handle: &str,
        limit: u32,
    ) -> ChannelResult<Vec<LoggedMessage>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>, String, String, i64)>(
            "SELECT id, sender_id, sender_handle, channel_handle, text, sent_at
             FROM messages
             WHERE channel_handle = ?
             ORDER BY sent_at DESC, id DESC
             LIMIT ?",
        )
        .bind(channel_handle)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list messages"))?;

        Ok(rows
            .into_iter()
            .map(|r| LoggedMessage {
                id: r.0,
                record: MessageRecord {
                    sender_id: r.1,
                    sender_handle: r.2,
                    channel_handle: r.3,
                    text: r.4,
                    sent_at: r.5,
                },
            })
            .collect())
    }

    async fn list_watchlist(&self) -> ChannelResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT channel_handle FROM watchlist ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list watchlist"))
    }

    async fn add_to_watchlist(&self, channel_handle: &str) -> ChannelResult<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO watchlist (channel_handle) VALUES (?)")
            .bind(channel_handle)
            .execute(&self.pool)
            .await
            .map_err(db_err("add to watchlist"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_watchlist(&self, channel_handle: &str) -> ChannelResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE channel_handle = ?")
            .bind(channel_handle)
            .execute(&self.pool)
            .await
            .map_err(db_err("remove from watchlist"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn execute(&self, query: &str) -> ChannelResult<QueryRows> {
        if skip_leading_comments(query).is_empty() {
            return Err(ChannelError::invalid_input("empty query"));
        }

        if returns_rows(query) {
            let rows = sqlx::query(query)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err("query"))?;
            debug!(rows = rows.len(), "raw query returned rows");
            return Ok(rows.iter().map(row_to_values).collect());
        }

        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(db_err("statement"))?;
        debug!(rows_affected = result.rows_affected(), "raw statement executed");
        Ok(vec![vec![
            Value::from("rows_affected"),
            Value::from(result.rows_affected()),
        ]])
    }
}

/// Whether a statement produces a result set.
fn returns_rows(query: &str) -> bool {
    let upper = skip_leading_comments(query).to_ascii_uppercase();
    ["SELECT", "WITH", "PRAGMA", "EXPLAIN", "VALUES"]
        .iter()
        .any(|kw| upper.starts_with(kw))
        || upper
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word == "RETURNING")
}

/// The statement text after any leading whitespace and SQL comments.
fn skip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

fn row_to_values(row: &SqliteRow) -> Vec<Value> {
    (0..row.columns().len())
        .map(|idx| column_value(row, idx))
        .collect()
}

fn column_value(row: &SqliteRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(idx).map(Value::from).ok(),
        "REAL" => row.try_get::<f64, _>(idx).map(Value::from).ok(),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|b| Value::from(format!("<blob {} bytes>", b.len())))
            .ok(),
        _ => row.try_get::<String, _>(idx).map(Value::from).ok(),
    }
    .unwrap_or(Value::Null)
}
