//! Keyed record store over embedded SQLite.
//!
//! Every collection is a table of `(id, version, body)` rows where `body` is the
//! JSON form of the record. The store only knows how to insert and delete;
//! updates are a delete of the `(id, version)` pair followed by an insert of
//! the next version, run inside one transaction so a concurrent writer shows up
//! as [`StoreError::VersionConflict`] instead of a lost record.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("record '{id}' already exists in '{collection}'")]
    DuplicateKey { collection: String, id: String },
    #[error("record '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },
    #[error("record '{id}' in '{collection}' changed concurrently (expected version {expected})")]
    VersionConflict {
        collection: String,
        id: String,
        expected: i64,
    },
    #[error("invalid collection name '{0}'")]
    InvalidCollection(String),
}

/// A stored record: its key, its store-managed version and its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub version: i64,
    pub body: Value,
}

/// A decoded record together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: i64,
    pub record: T,
}

/// Conjunction of field equalities over a record's top-level JSON fields.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// The `id` clause, if any, so it can be answered by the key column.
    fn id(&self) -> Option<&str> {
        self.clauses
            .iter()
            .find(|(field, _)| field == "id")
            .and_then(|(_, value)| value.as_str())
    }

    pub fn matches(&self, body: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| body.get(field) == Some(expected))
    }
}

/// Minimal collection-oriented store contract.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), StoreError>;

    async fn find(&self, collection: &str, filter: &Filter)
        -> Result<Vec<StoredRecord>, StoreError>;

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Replace the record `id` if it is still at `expected_version`.
    /// The stored copy ends up at `expected_version + 1`.
    async fn delete_then_reinsert(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        body: Value,
    ) -> Result<i64, StoreError>;

    async fn close(&self) {}
}

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory database lives and dies with its connection, so keep
        // exactly one around for the life of the pool.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .acquire_timeout(std::time::Duration::from_secs(30))
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }
}

fn table_name(collection: &str) -> Result<String, StoreError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '_');
    if valid {
        Ok(format!("\"{}\"", collection))
    } else {
        Err(StoreError::InvalidCollection(collection.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError> {
        let table = table_name(name)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                version INTEGER NOT NULL,
                body TEXT NOT NULL
            )"
        ))
        .execute(&self.pool)
        .await?;
        log::debug!("Collection '{}' ready", name);
        Ok(())
    }

    async fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), StoreError> {
        let table = table_name(collection)?;
        let body = serde_json::to_string(&record.body)?;
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (id, version, body) VALUES (?, ?, ?)"
        ))
        .bind(&record.id)
        .bind(record.version)
        .bind(body)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    id: record.id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let table = table_name(collection)?;
        let rows: Vec<(String, i64, String)> = match filter.id() {
            Some(id) => {
                sqlx::query_as(&format!(
                    "SELECT id, version, body FROM {table} WHERE id = ? ORDER BY seq"
                ))
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!("SELECT id, version, body FROM {table} ORDER BY seq"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for (id, version, body) in rows {
            let body: Value = serde_json::from_str(&body)?;
            if filter.matches(&body) {
                records.push(StoredRecord { id, version, body });
            }
        }
        Ok(records)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let table = table_name(collection)?;
        let matching = self.find(collection, filter).await?;
        let mut deleted = 0;
        for record in matching {
            deleted += sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
                .bind(&record.id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }
        Ok(deleted)
    }

    async fn delete_then_reinsert(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        body: Value,
    ) -> Result<i64, StoreError> {
        let table = table_name(collection)?;
        let body = serde_json::to_string(&body)?;
        let next_version = expected_version + 1;

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!("DELETE FROM {table} WHERE id = ? AND version = ?"))
            .bind(id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as(&format!("SELECT version FROM {table} WHERE id = ?"))
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => StoreError::VersionConflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected: expected_version,
                },
                None => StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                },
            });
        }

        sqlx::query(&format!(
            "INSERT INTO {table} (id, version, body) VALUES (?, ?, ?)"
        ))
        .bind(id)
        .bind(next_version)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next_version)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Typed handle on one collection of a [`RecordStore`].
#[derive(Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn RecordStore>,
}

impl Collection {
    pub async fn open(store: Arc<dyn RecordStore>, name: &str) -> Result<Self, StoreError> {
        store.get_or_create_collection(name).await?;
        Ok(Self {
            name: name.to_string(),
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert<T: Serialize>(&self, id: &str, record: &T) -> Result<i64, StoreError> {
        let stored = StoredRecord {
            id: id.to_string(),
            version: 1,
            body: serde_json::to_value(record)?,
        };
        self.store.insert(&self.name, stored).await?;
        Ok(1)
    }

    pub async fn find<T: DeserializeOwned>(
        &self,
        filter: &Filter,
    ) -> Result<Vec<Versioned<T>>, StoreError> {
        self.store
            .find(&self.name, filter)
            .await?
            .into_iter()
            .map(|stored| -> Result<Versioned<T>, StoreError> {
                Ok(Versioned {
                    version: stored.version,
                    record: serde_json::from_value(stored.body)?,
                })
            })
            .collect()
    }

    pub async fn find_one<T: DeserializeOwned>(
        &self,
        filter: &Filter,
    ) -> Result<Option<Versioned<T>>, StoreError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    pub async fn delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.delete(&self.name, filter).await
    }

    pub async fn delete_then_reinsert<T: Serialize>(
        &self,
        id: &str,
        expected_version: i64,
        record: &T,
    ) -> Result<i64, StoreError> {
        let body = serde_json::to_value(record)?;
        self.store
            .delete_then_reinsert(&self.name, id, expected_version, body)
            .await
    }
}
