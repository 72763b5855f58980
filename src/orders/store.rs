//! Order repository trait, the `SQLite` implementation, and the best-effort
//! persistence gateway in front of it.

use crate::error::Result;
use crate::orders::id::OrderId;
use crate::orders::models::OrderItem;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Storage for order items.
///
/// All methods return a `Result` and may fail with database errors.
#[allow(clippy::missing_errors_doc)]
pub trait OrderRepository: Send + Sync {
    /// Every stored item, ordered by `sort_index` ascending.
    fn load_all(&self) -> Result<Vec<OrderItem>>;

    /// Make storage match `items`: upsert by id and delete every stored id
    /// not present. Practically empty items are not stored.
    fn save_all(&self, items: &[OrderItem]) -> Result<()>;

    /// Delete one item. Returns `false` if it was not stored.
    fn delete_by_id(&self, id: &OrderId) -> Result<bool>;
}

/// `SQLite` order storage. Each item is one row holding its JSON payload.
#[derive(Debug)]
pub struct SqliteOrderStore {
    db_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SqliteOrderStore {
    /// Open (creating if needed) the store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf(), write_lock: Mutex::new(()) };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                sort_index INTEGER NOT NULL DEFAULT 0,
                is_archived INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_orders_sort_index ON orders(sort_index);
            ",
        )?;
        Ok(())
    }
}

impl OrderRepository for SqliteOrderStore {
    fn load_all(&self) -> Result<Vec<OrderItem>> {
        let _guard = self.write_lock.lock();
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT id, payload FROM orders ORDER BY sort_index, rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            match serde_json::from_str::<OrderItem>(&payload) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(%id, "skipping unreadable order row: {e}"),
            }
        }
        tracing::info!(count = items.len(), "loaded orders");
        Ok(items)
    }

    fn save_all(&self, items: &[OrderItem]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        let mut kept: HashSet<String> = HashSet::new();
        {
            let mut upsert = tx.prepare(
                "INSERT INTO orders (id, sort_index, is_archived, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(id) DO UPDATE SET
                    sort_index = excluded.sort_index,
                    is_archived = excluded.is_archived,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
            )?;
            for item in items.iter().filter(|item| item.is_renderable()) {
                let id = item.id().to_string();
                let payload = serde_json::to_string(item)?;
                upsert.execute(params![id, item.sort_index, item.is_archived, payload])?;
                kept.insert(id);
            }
        }

        let stored: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM orders")?;
            let ids = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
            ids
        };
        let mut deleted = 0;
        for id in stored.iter().filter(|id| !kept.contains(*id)) {
            deleted += tx.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
        }

        tx.commit()?;
        tracing::info!(saved = kept.len(), deleted, "saved orders");
        Ok(())
    }

    fn delete_by_id(&self, id: &OrderId) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let conn = self.open()?;
        let deleted = conn.execute("DELETE FROM orders WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

/// A storage failure swallowed by the [`PersistenceGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFailure {
    /// Which gateway operation failed.
    pub operation: &'static str,
    /// The underlying error, rendered.
    pub message: String,
}

type FailureObserver = Box<dyn Fn(&StorageFailure) + Send + Sync>;

/// Best-effort front for an [`OrderRepository`].
///
/// Failures never propagate: loads return an empty list and saves are
/// dropped. Each failure is logged and handed to every registered observer.
pub struct PersistenceGateway<R> {
    repository: R,
    observers: Mutex<Vec<FailureObserver>>,
}

impl<R: std::fmt::Debug> std::fmt::Debug for PersistenceGateway<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("repository", &self.repository)
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}

impl<R: OrderRepository> PersistenceGateway<R> {
    /// Wrap `repository`.
    pub fn new(repository: R) -> Self {
        Self { repository, observers: Mutex::new(Vec::new()) }
    }

    /// The wrapped repository.
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Register an observer for swallowed failures.
    pub fn on_failure(&self, observer: impl Fn(&StorageFailure) + Send + Sync + 'static) {
        self.observers.lock().push(Box::new(observer));
    }

    /// Load every item, or nothing on failure.
    pub fn load_all(&self) -> Vec<OrderItem> {
        self.repository.load_all().unwrap_or_else(|e| {
            self.report("load_all", &e);
            Vec::new()
        })
    }

    /// Save `items`. Returns whether the save succeeded.
    pub fn save_all(&self, items: &[OrderItem]) -> bool {
        match self.repository.save_all(items) {
            Ok(()) => true,
            Err(e) => {
                self.report("save_all", &e);
                false
            }
        }
    }

    /// Delete one item. Returns whether a row was deleted.
    pub fn delete_by_id(&self, id: &OrderId) -> bool {
        self.repository.delete_by_id(id).unwrap_or_else(|e| {
            self.report("delete_by_id", &e);
            false
        })
    }

    fn report(&self, operation: &'static str, error: &crate::error::Error) {
        tracing::warn!(operation, "storage operation failed: {error}");
        let failure = StorageFailure { operation, message: error.to_string() };
        for observer in self.observers.lock().iter() {
            observer(&failure);
        }
    }
}
