//! SQLite record store.
//!
//! One database file with three tables:
//! - `conversations` — device-owned conversation headers
//! - `messages` — chat messages, removed with their conversation
//! - `products` — product profiles, unique per `(device_id, name)`
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microsecond
//! precision) so that `ORDER BY updated_at` sorts chronologically.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use forkreach_core::context::BrandVoice;
use forkreach_core::error::StoreError;
use forkreach_core::store::{
    ConversationRecord, ConversationWithMessages, DEFAULT_CONVERSATION_TITLE, DeviceId,
    MessageRecord, NewMessage, ProductInput, ProductRecord, RecordStore,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::MonotonicClock;

pub struct SqliteStore {
    pool: SqlitePool,
    clock: MonotonicClock,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().filename(path);
        let store = Self::connect_with(options, 4).await?;
        info!(path = %path.display(), "SQLite record store initialized");
        Ok(store)
    }

    /// Connect by URL, e.g. `"sqlite::memory:"` for an ephemeral database.
    ///
    /// In-memory databases are per connection, so the pool is limited to one.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?;
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect_with(options, max_connections).await
    }

    /// Use an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            clock: MonotonicClock::new(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn connect_with(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        Self::from_pool(pool).await
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: [(&str, &str); 6] = [
            (
                "conversations table",
                r#"
                CREATE TABLE IF NOT EXISTS conversations (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    id          TEXT UNIQUE NOT NULL,
                    device_id   TEXT NOT NULL,
                    title       TEXT NOT NULL,
                    created_at  TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages table",
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    iid              INTEGER PRIMARY KEY AUTOINCREMENT,
                    id               TEXT UNIQUE NOT NULL,
                    conversation_id  TEXT NOT NULL
                        REFERENCES conversations(id) ON DELETE CASCADE,
                    role             TEXT NOT NULL,
                    content          TEXT NOT NULL,
                    metadata         TEXT NOT NULL DEFAULT '{}',
                    created_at       TEXT NOT NULL
                )
                "#,
            ),
            (
                "products table",
                r#"
                CREATE TABLE IF NOT EXISTS products (
                    iid              INTEGER PRIMARY KEY AUTOINCREMENT,
                    id               TEXT UNIQUE NOT NULL,
                    device_id        TEXT NOT NULL,
                    name             TEXT NOT NULL,
                    tagline          TEXT,
                    target_audience  TEXT,
                    key_features     TEXT NOT NULL DEFAULT '[]',
                    brand_voice      TEXT NOT NULL DEFAULT 'casual',
                    created_at       TEXT NOT NULL,
                    updated_at       TEXT NOT NULL,
                    UNIQUE (device_id, name)
                )
                "#,
            ),
            (
                "conversations index",
                "CREATE INDEX IF NOT EXISTS idx_conversations_device ON conversations(device_id, updated_at DESC)",
            ),
            (
                "messages index",
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, iid)",
            ),
            (
                "products index",
                "CREATE INDEX IF NOT EXISTS idx_products_device ON products(device_id, updated_at DESC)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn now(&self) -> (DateTime<Utc>, String) {
        let now = self.clock.now();
        (now, timestamp(&now))
    }

    async fn find_conversation(&self, device: &DeviceId, id: &str) -> Result<Option<ConversationRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(device.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("SELECT conversation"))?;
        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn find_product(&self, device: &DeviceId, id: &str) -> Result<Option<ProductRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(device.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("SELECT product"))?;
        row.as_ref().map(row_to_product).transpose()
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_failed(what: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| StoreError::QueryFailed(format!("{what} failed: {e}"))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn time_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = column(row, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRecord(format!("{name} '{raw}': {e}")))
}

fn device_column(row: &SqliteRow) -> Result<DeviceId, StoreError> {
    let raw: String = column(row, "device_id")?;
    DeviceId::parse(&raw).ok_or_else(|| StoreError::InvalidRecord("blank device_id".into()))
}

fn row_to_conversation(row: &SqliteRow) -> Result<ConversationRecord, StoreError> {
    Ok(ConversationRecord {
        id: column(row, "id")?,
        title: column(row, "title")?,
        device_id: device_column(row)?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn row_to_message(row: &SqliteRow) -> Result<MessageRecord, StoreError> {
    let metadata: String = column(row, "metadata")?;
    Ok(MessageRecord {
        id: column(row, "id")?,
        conversation_id: column(row, "conversation_id")?,
        role: column(row, "role")?,
        content: column(row, "content")?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| StoreError::InvalidRecord(format!("metadata: {e}")))?,
        created_at: time_column(row, "created_at")?,
    })
}

fn row_to_product(row: &SqliteRow) -> Result<ProductRecord, StoreError> {
    let features: String = column(row, "key_features")?;
    let voice: String = column(row, "brand_voice")?;
    Ok(ProductRecord {
        id: column(row, "id")?,
        device_id: device_column(row)?,
        name: column(row, "name")?,
        tagline: column(row, "tagline")?,
        target_audience: column(row, "target_audience")?,
        key_features: serde_json::from_str(&features)
            .map_err(|e| StoreError::InvalidRecord(format!("key_features: {e}")))?,
        brand_voice: BrandVoice::parse_or_default(&voice),
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::InvalidRecord(e.to_string()))
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list_conversations(&self, device: &DeviceId) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE device_id = ? ORDER BY updated_at DESC, iid DESC",
        )
        .bind(device.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("SELECT conversations"))?;

        rows.iter().map(row_to_conversation).collect()
    }

    async fn create_conversation(
        &self,
        device: &DeviceId,
        title: Option<String>,
    ) -> Result<ConversationRecord, StoreError> {
        let (now, stamp) = self.now();
        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.into()),
            device_id: device.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO conversations (id, device_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(device.as_str())
        .bind(&record.title)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await
        .map_err(query_failed("INSERT conversation"))?;

        debug!(conversation = %record.id, device = %device, "Conversation created");
        Ok(record)
    }

    async fn get_conversation(
        &self,
        device: &DeviceId,
        id: &str,
    ) -> Result<Option<ConversationWithMessages>, StoreError> {
        let Some(conversation) = self.find_conversation(device, id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query("SELECT * FROM messages WHERE conversation_id = ? ORDER BY iid ASC")
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("SELECT messages"))?;
        let messages = rows.iter().map(row_to_message).collect::<Result<_, _>>()?;

        Ok(Some(ConversationWithMessages {
            conversation,
            messages,
        }))
    }

    async fn rename_conversation(
        &self,
        device: &DeviceId,
        id: &str,
        title: &str,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let (_, stamp) = self.now();
        let result = sqlx::query(
            "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND device_id = ?",
        )
        .bind(title)
        .bind(&stamp)
        .bind(id)
        .bind(device.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_failed("UPDATE conversation"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_conversation(device, id).await
    }

    async fn delete_conversation(&self, device: &DeviceId, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(device.as_str())
            .execute(&self.pool)
            .await
            .map_err(query_failed("DELETE conversation"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_message(
        &self,
        device: &DeviceId,
        conversation_id: &str,
        message: NewMessage,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let (now, stamp) = self.now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("BEGIN"))?;

        let bumped = sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ? AND device_id = ?")
            .bind(&stamp)
            .bind(conversation_id)
            .bind(device.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("UPDATE conversation"))?;
        if bumped.rows_affected() == 0 {
            return Ok(None);
        }

        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: message.role,
            content: message.content,
            metadata: message.metadata,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(conversation_id)
        .bind(&record.role)
        .bind(&record.content)
        .bind(to_json(&record.metadata)?)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(query_failed("INSERT message"))?;

        tx.commit().await.map_err(query_failed("COMMIT"))?;
        Ok(Some(record))
    }

    async fn list_products(&self, device: &DeviceId) -> Result<Vec<ProductRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM products WHERE device_id = ? ORDER BY updated_at DESC, iid DESC")
            .bind(device.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("SELECT products"))?;

        rows.iter().map(row_to_product).collect()
    }

    async fn get_product(&self, device: &DeviceId, id: &str) -> Result<Option<ProductRecord>, StoreError> {
        self.find_product(device, id).await
    }

    async fn upsert_product(&self, device: &DeviceId, input: ProductInput) -> Result<ProductRecord, StoreError> {
        let (_, stamp) = self.now();
        let features = to_json(&input.key_features.unwrap_or_default())?;

        let row = sqlx::query(
            r#"
            INSERT INTO products
                (id, device_id, name, tagline, target_audience, key_features, brand_voice, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (device_id, name) DO UPDATE SET
                tagline = excluded.tagline,
                target_audience = excluded.target_audience,
                key_features = excluded.key_features,
                brand_voice = excluded.brand_voice,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(device.as_str())
        .bind(&input.name)
        .bind(&input.tagline)
        .bind(&input.target_audience)
        .bind(&features)
        .bind(input.brand_voice.as_str())
        .bind(&stamp)
        .bind(&stamp)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed("UPSERT product"))?;

        let record = row_to_product(&row)?;
        debug!(product = %record.id, name = %record.name, device = %device, "Product saved");
        Ok(record)
    }

    async fn delete_product(&self, device: &DeviceId, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND device_id = ?")
            .bind(id)
            .bind(device.as_str())
            .execute(&self.pool)
            .await
            .map_err(query_failed("DELETE product"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    async fn test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn conversation_lifecycle() {
        conformance::conversation_lifecycle(&test_store().await).await;
    }

    #[tokio::test]
    async fn listing_follows_activity() {
        conformance::listing_follows_activity(&test_store().await).await;
    }

    #[tokio::test]
    async fn devices_are_isolated() {
        conformance::devices_are_isolated(&test_store().await).await;
    }

    #[tokio::test]
    async fn product_upsert_by_name() {
        conformance::product_upsert_by_name(&test_store().await).await;
    }

    #[tokio::test]
    async fn deleting_conversation_cascades_to_messages() {
        let store = test_store().await;
        let dev = DeviceId::parse("dev").unwrap();
        let conv = store.create_conversation(&dev, None).await.unwrap();
        store
            .add_message(
                &dev,
                &conv.id,
                NewMessage {
                    role: "user".into(),
                    content: "hello".into(),
                    metadata: Default::default(),
                },
            )
            .await
            .unwrap();

        assert!(store.delete_conversation(&dev, &conv.id).await.unwrap());
        let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM messages")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let dev = DeviceId::parse("dev").unwrap();

        let id = {
            let store = SqliteStore::open(&path).await.unwrap();
            let input = ProductInput {
                name: "DevTodo".into(),
                tagline: Some("Todos for devs".into()),
                target_audience: None,
                key_features: Some(vec!["Sync".into()]),
                brand_voice: BrandVoice::Professional,
            };
            store.upsert_product(&dev, input).await.unwrap().id
        };

        let store = SqliteStore::open(&path).await.unwrap();
        let product = store.get_product(&dev, &id).await.unwrap().unwrap();
        assert_eq!(product.tagline.as_deref(), Some("Todos for devs"));
        assert_eq!(product.key_features, vec!["Sync"]);
        assert_eq!(product.brand_voice, BrandVoice::Professional);
    }

    #[test]
    fn timestamps_sort_lexically() {
        let early = "2026-01-01T00:00:00.000001Z".parse::<DateTime<Utc>>().unwrap();
        let later = "2026-01-01T00:00:00.100000Z".parse::<DateTime<Utc>>().unwrap();
        assert!(timestamp(&early) < timestamp(&later));
        assert_eq!(timestamp(&early).len(), timestamp(&later).len());
    }
}
