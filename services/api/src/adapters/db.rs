//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The document tree is stored flattened: one row per scalar leaf, keyed by its
//! full path. Every committed write sends a `document_changes` notification
//! carrying the written path, which subscribers receive through `LISTEN`.

use async_trait::async_trait;
use prep_core::ports::{new_push_key, DocumentStore, PortError, PortResult, ValueStream};
use prep_core::tree;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, warn};

/// The notification channel used for change events.
const CHANGE_CHANNEL: &str = "document_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// The subtree whose writes are serialised together: the first two segments
/// (`users/{uid}`, `pyqs/{id}`), or the whole path when it is shorter.
fn lock_scope(path: &str) -> String {
    tree::segments(path).into_iter().take(2).collect::<Vec<_>>().join("/")
}

/// Every proper ancestor of `path`; a write there must drop leaves it replaces.
fn ancestors(path: &str) -> Vec<String> {
    let segs = tree::segments(path);
    (1..segs.len()).map(|n| segs[..n].join("/")).collect()
}

async fn read_subtree(pool: &PgPool, path: &str) -> PortResult<Option<Value>> {
    let rows: Vec<(String, Value)> = sqlx::query_as(
        "SELECT path, value FROM documents WHERE $1 = '' OR path = $1 OR starts_with(path, $1 || '/')",
    )
    .bind(path)
    .fetch_all(pool)
    .await
    .map_err(|e| PortError::Persistence(e.to_string()))?;

    Ok(tree::assemble(path, rows))
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn read(&self, path: &str) -> PortResult<Option<Value>> {
        read_subtree(&self.pool, &tree::normalize(path)).await
    }

    async fn write(&self, path: &str, value: Value) -> PortResult<()> {
        let path = tree::normalize(path);
        let leaves = tree::flatten(&path, value);
        let persistence = |e: sqlx::Error| PortError::Persistence(e.to_string());

        let mut tx = self.pool.begin().await.map_err(persistence)?;

        // Overlapping writes under one user would otherwise interleave their
        // deletes and inserts. Released on commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(lock_scope(&path))
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        sqlx::query("DELETE FROM documents WHERE $1 = '' OR path = $1 OR starts_with(path, $1 || '/')")
            .bind(&path)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        let parents = ancestors(&path);
        if !parents.is_empty() {
            sqlx::query("DELETE FROM documents WHERE path = ANY($1)")
                .bind(&parents)
                .execute(&mut *tx)
                .await
                .map_err(persistence)?;
        }

        for (leaf_path, leaf) in &leaves {
            sqlx::query(
                "INSERT INTO documents (path, value) VALUES ($1, $2) \
                 ON CONFLICT (path) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(leaf_path)
            .bind(leaf)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        }

        // Delivered on commit.
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGE_CHANNEL)
            .bind(&path)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;
        debug!("Wrote {} leaves at '{}'", leaves.len(), path);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> PortResult<String> {
        let key = new_push_key();
        self.write(&tree::join(&[path, &key]), value).await?;
        Ok(key)
    }

    async fn subscribe(&self, path: &str) -> PortResult<ValueStream> {
        let path = tree::normalize(path);
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        let initial = read_subtree(&self.pool, &path).await?;
        let pool = self.pool.clone();

        let stream = async_stream::stream! {
            yield Ok(initial);
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        if tree::overlaps(notification.payload(), &path) {
                            yield read_subtree(&pool, &path).await;
                        }
                    }
                    Err(e) => {
                        warn!("Change listener for '{}' failed: {}", path, e);
                        yield Err(PortError::Persistence(e.to_string()));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_exclude_the_path_itself() {
        assert_eq!(
            ancestors("users/u1/streak"),
            vec!["users".to_string(), "users/u1".to_string()]
        );
        assert!(ancestors("users").is_empty());
        assert!(ancestors("").is_empty());
    }

    #[test]
    fn writes_lock_the_owning_subtree() {
        assert_eq!(lock_scope("users/u1/tests/2025-08-02/t1/answers"), "users/u1");
        assert_eq!(lock_scope("pyqs/t1"), "pyqs/t1");
        assert_eq!(lock_scope("users"), "users");
    }
}
