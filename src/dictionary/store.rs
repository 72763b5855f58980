//! Keyed dictionary storage and the `SQLite` implementation.

use crate::dictionary::models::{DictionaryEntity, Vendor};
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Storage for one kind of dictionary record.
///
/// All methods return a `Result` and may fail with database errors.
#[allow(clippy::missing_errors_doc)]
pub trait DictionaryRepository<T: DictionaryEntity>: Send + Sync {
    /// Every record, ordered by key.
    fn get_all(&self) -> Result<Vec<T>>;

    /// The record with `key`.
    fn get_by_key(&self, key: &str) -> Result<Option<T>>;

    /// Records matching `predicate`, in key order, at most `max_results`.
    fn find_matching(&self, predicate: &dyn Fn(&T) -> bool, max_results: usize) -> Result<Vec<T>>;

    /// Insert or replace one record.
    fn upsert_one(&self, record: &T) -> Result<()>;

    /// Insert or replace many records in one transaction. Returns the count written.
    fn upsert_many(&self, records: &[T]) -> Result<usize>;

    /// Delete by key. Returns `false` if absent.
    fn delete_by_key(&self, key: &str) -> Result<bool>;

    /// Delete every record. Returns the count deleted.
    fn delete_all(&self) -> Result<usize>;

    /// Number of records.
    fn count(&self) -> Result<usize>;
}

/// `SQLite` table of `T` records stored as JSON payloads under their key.
#[derive(Debug)]
pub struct SqliteDictionary<T> {
    db_path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DictionaryEntity> SqliteDictionary<T> {
    /// Open (creating if needed) `T`'s table in the database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        };
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
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
            table = T::TABLE
        ))?;
        Ok(())
    }

    fn load_rows(conn: &Connection) -> Result<Vec<T>> {
        let sql = format!("SELECT key, payload FROM {} ORDER BY key", T::TABLE);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (key, payload) in rows {
            match serde_json::from_str(&payload) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(table = T::TABLE, %key, "skipping unreadable record: {e}"),
            }
        }
        Ok(records)
    }

    fn upsert_sql() -> String {
        format!(
            "INSERT INTO {} (key, payload, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            T::TABLE
        )
    }
}

impl<T: DictionaryEntity> DictionaryRepository<T> for SqliteDictionary<T> {
    fn get_all(&self) -> Result<Vec<T>> {
        let conn = self.open()?;
        Self::load_rows(&conn)
    }

    fn get_by_key(&self, key: &str) -> Result<Option<T>> {
        let conn = self.open()?;
        let payload: Option<String> = conn
            .query_row(
                &format!("SELECT payload FROM {} WHERE key = ?1", T::TABLE),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload.map(|p| serde_json::from_str::<T>(&p)).transpose()?)
    }

    fn find_matching(&self, predicate: &dyn Fn(&T) -> bool, max_results: usize) -> Result<Vec<T>> {
        let conn = self.open()?;
        Ok(Self::load_rows(&conn)?
            .into_iter()
            .filter(|record| predicate(record))
            .take(max_results)
            .collect())
    }

    fn upsert_one(&self, record: &T) -> Result<()> {
        let _guard = self.write_lock.lock();
        let conn = self.open()?;
        conn.execute(&Self::upsert_sql(), params![record.key(), serde_json::to_string(record)?])?;
        Ok(())
    }

    fn upsert_many(&self, records: &[T]) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&Self::upsert_sql())?;
            for record in records {
                stmt.execute(params![record.key(), serde_json::to_string(record)?])?;
            }
        }
        tx.commit()?;
        tracing::debug!(table = T::TABLE, count = records.len(), "upserted dictionary records");
        Ok(records.len())
    }

    fn delete_by_key(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let conn = self.open()?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", T::TABLE);
        let deleted = conn.execute(&sql, params![key])?;
        Ok(deleted > 0)
    }

    fn delete_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let conn = self.open()?;
        Ok(conn.execute(&format!("DELETE FROM {}", T::TABLE), [])?)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.open()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", T::TABLE), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Vendor lookups ranked by how often each vendor is used.
#[derive(Debug)]
pub struct VendorDirectory<R> {
    repository: R,
}

impl<R: DictionaryRepository<Vendor>> VendorDirectory<R> {
    /// Wrap a vendor repository.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// The wrapped repository.
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Bump `name`'s usage count, creating the vendor if unknown.
    ///
    /// Blank names are ignored and return `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor cannot be read or written.
    pub fn record_usage(&self, name: &str) -> Result<Option<Vendor>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let mut vendor = self.repository.get_by_key(name)?.unwrap_or_else(|| Vendor::new(name));
        vendor.usage_count = vendor.usage_count.saturating_add(1);
        self.repository.upsert_one(&vendor)?;
        Ok(Some(vendor))
    }

    /// Vendors whose name starts with `prefix` (case-insensitive), most used
    /// first, at most `max_results`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendors cannot be read.
    pub fn autocomplete(&self, prefix: &str, max_results: usize) -> Result<Vec<Vendor>> {
        let prefix = prefix.trim().to_lowercase();
        let matches_prefix = |vendor: &Vendor| vendor.name.to_lowercase().starts_with(&prefix);
        let mut matches = self.repository.find_matching(&matches_prefix, usize::MAX)?;
        matches.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        matches.truncate(max_results);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::models::{Item, Store};
    use tempfile::TempDir;

    fn create_test_dictionary<T: DictionaryEntity>() -> (TempDir, SqliteDictionary<T>) {
        let dir = TempDir::new().unwrap();
        let store = SqliteDictionary::new(dir.path().join("dictionary.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_upsert_and_get() {
        let (_dir, items) = create_test_dictionary::<Item>();
        items.upsert_one(&Item::new("10-442", "Widget")).unwrap();
        let found = items.get_by_key("10-442").unwrap().unwrap();
        assert_eq!(found.description, "Widget");
        assert!(items.get_by_key("missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_by_key() {
        let (_dir, items) = create_test_dictionary::<Item>();
        items.upsert_one(&Item::new("10-442", "Widget")).unwrap();
        items.upsert_one(&Item::new("10-442", "Widget, large")).unwrap();
        assert_eq!(items.count().unwrap(), 1);
        assert_eq!(items.get_by_key("10-442").unwrap().unwrap().description, "Widget, large");
    }

    #[test]
    fn test_upsert_many_and_get_all_ordered() {
        let (_dir, stores) = create_test_dictionary::<Store>();
        let written = stores
            .upsert_many(&[Store::new("S003", "Harbor"), Store::new("S001", "Downtown")])
            .unwrap();
        assert_eq!(written, 2);
        let codes: Vec<String> = stores.get_all().unwrap().into_iter().map(|s| s.code).collect();
        assert_eq!(codes, vec!["S001", "S003"]);
    }

    #[test]
    fn test_find_matching_respects_max() {
        let (_dir, items) = create_test_dictionary::<Item>();
        let records: Vec<Item> = (0..5).map(|i| Item::new(format!("A-{i}"), "Bolt")).collect();
        items.upsert_many(&records).unwrap();
        let found = items.find_matching(&|item: &Item| item.description == "Bolt", 3).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].item_number, "A-0");
    }

    #[test]
    fn test_delete_by_key_and_delete_all() {
        let (_dir, items) = create_test_dictionary::<Item>();
        items.upsert_many(&[Item::new("1", "a"), Item::new("2", "b")]).unwrap();
        assert!(items.delete_by_key("1").unwrap());
        assert!(!items.delete_by_key("1").unwrap());
        assert_eq!(items.delete_all().unwrap(), 1);
        assert_eq!(items.count().unwrap(), 0);
    }

    #[test]
    fn test_tables_share_one_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dictionary.db");
        let items = SqliteDictionary::<Item>::new(&path).unwrap();
        let stores = SqliteDictionary::<Store>::new(&path).unwrap();
        items.upsert_one(&Item::new("1", "a")).unwrap();
        assert_eq!(stores.count().unwrap(), 0);
        assert_eq!(items.count().unwrap(), 1);
    }

    #[test]
    fn test_record_usage_creates_and_increments() {
        let (_dir, vendors) = create_test_dictionary::<Vendor>();
        let directory = VendorDirectory::new(vendors);
        directory.record_usage("Acme").unwrap();
        let vendor = directory.record_usage(" Acme ").unwrap().unwrap();
        assert_eq!(vendor.usage_count, 2);
        assert!(directory.record_usage("   ").unwrap().is_none());
        assert_eq!(directory.repository().count().unwrap(), 1);
    }

    #[test]
    fn test_autocomplete_ranks_by_usage() {
        let (_dir, vendors) = create_test_dictionary::<Vendor>();
        let directory = VendorDirectory::new(vendors);
        directory.record_usage("Acme Tools").unwrap();
        for _ in 0..3 {
            directory.record_usage("acme Supply").unwrap();
        }
        directory.record_usage("Globex").unwrap();

        let names: Vec<String> =
            directory.autocomplete("AC", 10).unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["acme Supply", "Acme Tools"]);
        assert_eq!(directory.autocomplete("", 1).unwrap().len(), 1);
    }
}
