use crate::core::error::{Error, Result};
use crate::storage::record::FileRecord;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    ext TEXT NOT NULL,
    mtime REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_name ON files(name);
CREATE INDEX IF NOT EXISTS idx_files_mtime ON files(mtime);
";

// Update in place on conflict so the row id of an unchanged path is stable.
const UPSERT_SQL: &str = "
INSERT INTO files (path, name, ext, mtime) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(path) DO UPDATE SET
    name = excluded.name,
    ext = excluded.ext,
    mtime = excluded.mtime
";

/// Handle on the persisted file index.
///
/// Each handle owns one SQLite connection and releases it on drop. Builds
/// and queries should use separate handles; readers only see rows from
/// committed batches.
pub struct IndexStore {
    conn: Connection,
    path: PathBuf,
}

impl IndexStore {
    /// Open or create the index at `path`, creating its parent directory and
    /// applying the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::store_unavailable(parent, "create directory", e))?;
        }

        let conn = Connection::open(path).map_err(|e| Error::store_unavailable(path, "open", e))?;
        let store = Self::configure(conn, path)?;
        store
            .conn
            .execute_batch(SCHEMA)
            .map_err(|e| Error::store_unavailable(path, "apply schema to", e))?;

        Ok(store)
    }

    /// Open an index that must already exist, without creating files or
    /// schema. Used for query handles.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| Error::store_unavailable(path, "open", e))?;
        Self::configure(conn, path)
    }

    fn configure(conn: Connection, path: &Path) -> Result<Self> {
        // WAL lets queries run while a build holds the write lock
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| Error::store_unavailable(path, "enable WAL on", e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::store_unavailable(path, "configure", e))?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Whether a usable index exists at `path`.
    ///
    /// Missing file or missing table is `Ok(false)`. A file that exists but
    /// cannot be read as an index is `Err(StoreUnavailable)`.
    pub fn probe(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| Error::store_unavailable(path, "open", e))?;

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'files'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::store_unavailable(path, "read", e))?;
        if tables == 0 {
            return Ok(false);
        }

        conn.query_row("SELECT 1 FROM files LIMIT 1", [], |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|e| Error::store_unavailable(path, "query", e))?;

        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Upsert a single record in its own transaction
    pub fn put(&self, record: &FileRecord) -> Result<()> {
        upsert(&self.conn, record)
    }

    /// Start a batched writer committing every `batch_size` upserts.
    ///
    /// Taking `&mut self` keeps a handle to a single writer at a time.
    pub fn begin_batch(&mut self, batch_size: usize) -> Result<BatchWriter<'_>> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        Ok(BatchWriter {
            conn: &self.conn,
            tx: None,
            batch_size,
            pending: 0,
            written: 0,
            commits: 0,
        })
    }

    /// Look up one record by its path
    pub fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path, name, ext, mtime FROM files WHERE path = ?1")?;
        let record = stmt.query_row([path], row_to_record).optional()?;
        Ok(record)
    }

    /// Every record, ordered by path
    pub fn records(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, name, ext, mtime FROM files ORDER BY path")?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of indexed files
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Remove every record in its own transaction. A forced rebuild uses
    /// [`BatchWriter::clear`] instead so the delete lands with the first batch.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM files", [])?;
        Ok(())
    }
}

pub(crate) fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        extension: row.get(2)?,
        modified_time: row.get(3)?,
    })
}

fn upsert(conn: &Connection, record: &FileRecord) -> Result<()> {
    let mut stmt = conn.prepare_cached(UPSERT_SQL)?;
    stmt.execute(params![
        record.path,
        record.name,
        record.extension,
        record.modified_time
    ])?;
    Ok(())
}

/// Totals reported when a [`BatchWriter`] finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: u64,
    pub commits: u64,
}

/// Groups upserts into transactions of a fixed size.
///
/// A transaction is opened lazily on the first write after a commit, so an
/// empty run commits nothing and N writes make exactly ceil(N / batch_size)
/// commits. Dropping the writer without [`finish`](Self::finish) rolls back
/// the open batch; the previously committed batches stay.
///
/// A [`clear`](Self::clear) joins the open batch and commits with it, so
/// the old rows are only gone once the first new batch is durable.
pub struct BatchWriter<'a> {
    conn: &'a Connection,
    tx: Option<Transaction<'a>>,
    batch_size: usize,
    pending: usize,
    written: u64,
    commits: u64,
}

impl<'a> BatchWriter<'a> {
    /// Upsert one record. Returns `true` when this write closed a batch and
    /// committed it.
    pub fn put(&mut self, record: &FileRecord) -> Result<bool> {
        self.ensure_transaction()?;
        upsert(self.conn, record)?;
        self.pending += 1;
        self.written += 1;

        if self.pending >= self.batch_size {
            self.commit_open_batch()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Delete every existing record inside the open batch
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_transaction()?;
        self.conn.execute("DELETE FROM files", [])?;
        Ok(())
    }

    fn ensure_transaction(&mut self) -> Result<()> {
        if self.tx.is_none() {
            self.tx = Some(self.conn.unchecked_transaction()?);
        }
        Ok(())
    }

    fn commit_open_batch(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit()?;
            self.commits += 1;
            self.pending = 0;
        }
        Ok(())
    }

    /// Records written so far, committed or not
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Writes in the open, not yet committed batch
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Whether a transaction is open with work not yet committed
    pub fn has_open_batch(&self) -> bool {
        self.tx.is_some()
    }

    /// Commit the final partial batch, if any
    pub fn finish(mut self) -> Result<BatchSummary> {
        self.commit_open_batch()?;
        Ok(BatchSummary {
            written: self.written,
            commits: self.commits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(i: usize) -> FileRecord {
        FileRecord::new(format!("/data/file{}.txt", i), format!("file{}.txt", i), i as f64)
    }

    #[test]
    fn test_open_creates_parent_and_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/dir/index.db");

        let store = IndexStore::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.path(), db_path.as_path());

        let indexes: Vec<String> = store
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'files'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert!(indexes.contains(&"idx_files_name".to_string()));
        assert!(indexes.contains(&"idx_files_mtime".to_string()));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("index.db");
        {
            let store = IndexStore::open(&db_path).unwrap();
            store.put(&record(1)).unwrap();
        }
        let store = IndexStore::open(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_put_is_upsert() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        store.put(&record(1)).unwrap();
        store.put(&record(1)).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        let mut changed = record(1);
        changed.modified_time = 99.0;
        store.put(&changed).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(&changed.path).unwrap(), Some(changed));
    }

    #[test]
    fn test_upsert_keeps_row_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        let id_of = |store: &IndexStore| -> i64 {
            store
                .connection()
                .query_row("SELECT id FROM files WHERE path = '/data/file1.txt'", [], |r| r.get(0))
                .unwrap()
        };

        store.put(&record(1)).unwrap();
        let first = id_of(&store);
        store.put(&record(1)).unwrap();
        assert_eq!(id_of(&store), first);
    }

    #[test]
    fn test_batch_commit_count() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();

        for (n, b, expected) in [(0, 3, 0), (1, 3, 1), (3, 3, 1), (7, 3, 3), (9, 3, 3), (10, 1, 10)] {
            store.clear().unwrap();
            let mut writer = store.begin_batch(b).unwrap();
            for i in 0..n {
                writer.put(&record(i)).unwrap();
            }
            let summary = writer.finish().unwrap();
            assert_eq!(summary.commits, expected, "n={} b={}", n, b);
            assert_eq!(summary.written, n as u64);
            assert_eq!(store.count().unwrap(), n as u64);
        }
    }

    #[test]
    fn test_put_reports_batch_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        let mut writer = store.begin_batch(2).unwrap();

        assert!(!writer.put(&record(0)).unwrap());
        assert_eq!(writer.pending(), 1);
        assert!(writer.put(&record(1)).unwrap());
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.commits(), 1);
        assert!(!writer.put(&record(2)).unwrap());
        assert_eq!(writer.written(), 3);
    }

    #[test]
    fn test_drop_without_finish_keeps_committed_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        {
            let mut writer = store.begin_batch(4).unwrap();
            for i in 0..10 {
                writer.put(&record(i)).unwrap();
            }
            assert_eq!(writer.commits(), 2);
            // Simulated crash: the two pending writes are never committed
        }
        assert_eq!(store.count().unwrap(), 8);
        assert!(store.get("/data/file7.txt").unwrap().is_some());
        assert!(store.get("/data/file8.txt").unwrap().is_none());
    }

    #[test]
    fn test_batched_clear_rolls_back_with_its_batch() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        for i in 0..3 {
            store.put(&record(i)).unwrap();
        }

        {
            let mut writer = store.begin_batch(10).unwrap();
            writer.clear().unwrap();
            writer.put(&record(100)).unwrap();
            // Dropped before the batch commits
        }
        assert_eq!(store.count().unwrap(), 3);
        assert!(store.get("/data/file100.txt").unwrap().is_none());

        let mut writer = store.begin_batch(10).unwrap();
        writer.clear().unwrap();
        writer.put(&record(100)).unwrap();
        let summary = writer.finish().unwrap();
        assert_eq!(summary.commits, 1);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get("/data/file100.txt").unwrap().is_some());
    }

    #[test]
    fn test_batched_clear_alone_still_commits() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        store.put(&record(1)).unwrap();

        let mut writer = store.begin_batch(4).unwrap();
        writer.clear().unwrap();
        assert!(writer.has_open_batch());
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.finish().unwrap().commits, 1);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = IndexStore::open(&temp_dir.path().join("index.db")).unwrap();
        assert!(matches!(store.begin_batch(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_probe() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("index.db");

        assert!(!IndexStore::probe(&db_path).unwrap());

        // A database without the files table is not usable
        Connection::open(&db_path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x INTEGER);")
            .unwrap();
        assert!(!IndexStore::probe(&db_path).unwrap());

        // An empty but well-formed index is
        IndexStore::open(&db_path).unwrap();
        assert!(IndexStore::probe(&db_path).unwrap());
    }

    #[test]
    fn test_probe_corrupt_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("index.db");
        std::fs::write(&db_path, vec![0x42u8; 8192]).unwrap();

        let err = IndexStore::probe(&db_path).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(matches!(IndexStore::open(&db_path), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_open_existing_requires_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("missing.db");

        assert!(matches!(
            IndexStore::open_existing(&db_path),
            Err(Error::StoreUnavailable(_))
        ));
        assert!(!db_path.exists());
    }

    #[test]
    fn test_uncommitted_batch_invisible_to_other_handle() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("index.db");
        let mut writer_store = IndexStore::open(&db_path).unwrap();
        let reader = IndexStore::open_existing(&db_path).unwrap();

        let mut writer = writer_store.begin_batch(5).unwrap();
        for i in 0..7 {
            writer.put(&record(i)).unwrap();
        }
        assert_eq!(reader.count().unwrap(), 5);

        writer.finish().unwrap();
        assert_eq!(reader.count().unwrap(), 7);
    }
}
