//! Filesystem + libSQL backend.
//!
//! Folders are directories under a root path. Each run log and the overview
//! are their own libSQL database file (`<name>.db`) inside the folder they
//! were created in, so a year's logs can be archived by moving a directory.
//!
//! Creating a run log always makes a new file. When `<name>.db` is taken
//! (two runs started within the same second) the new log becomes
//! `<name> (2).db`, `<name> (3).db`, and so on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, StorageError};
use crate::pipeline::types::{FallbackRow, LogRow, OverviewRow, RunStatus};
use crate::store::migrations::{self, Migration};
use crate::store::traits::{Folder, OverviewSink, RunLog, StorageHierarchy};

/// Extension of every sink file.
const SINK_EXTENSION: &str = "db";

/// `_meta` key holding a run log's identity.
const META_LOG_ID: &str = "log_file_id";

/// Same-named run logs allowed in one folder before creation gives up.
const MAX_NAME_COLLISIONS: usize = 100;

// ── Helper functions ────────────────────────────────────────────────

/// Open (or create) a database file and bring its schema up to date.
async fn open_database(
    path: &Path,
    schema: &[Migration],
) -> Result<(LibSqlDatabase, Connection), DatabaseError> {
    let db = libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

    let conn = db
        .connect()
        .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

    migrations::run_migrations(&conn, schema).await?;
    Ok((db, conn))
}

fn sink_path(folder: &Folder, name: &str) -> PathBuf {
    Path::new(&folder.id).join(format!("{name}.{SINK_EXTENSION}"))
}

/// Claim a file name for a new run log that no other log is using.
///
/// The empty file is created atomically, so a claimed name is never shared.
async fn claim_run_log_path(folder: &Folder, name: &str) -> Result<(String, PathBuf), StorageError> {
    for n in 1..=MAX_NAME_COLLISIONS {
        let candidate = if n == 1 {
            name.to_string()
        } else {
            format!("{name} ({n})")
        };
        let path = sink_path(folder, &candidate);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok((candidate, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Run log name taken");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(StorageError::SinkUnavailable {
        name: name.to_string(),
        reason: format!("{MAX_NAME_COLLISIONS} run logs with this name already exist"),
    })
}

fn file_link(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

fn usize_to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ── Hierarchy ───────────────────────────────────────────────────────

/// Storage hierarchy rooted at a directory.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageHierarchy for FsStorage {
    fn root(&self) -> Folder {
        Folder {
            id: self.root.display().to_string(),
            name: self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    async fn get_or_create_folder(
        &self,
        name: &str,
        parent: &Folder,
    ) -> Result<Folder, StorageError> {
        let path = Path::new(&parent.id).join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| StorageError::FolderCreation {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Folder {
            id: path.display().to_string(),
            name: name.to_string(),
        })
    }

    async fn create_run_log(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Arc<dyn RunLog>, StorageError> {
        let (name, path) = claim_run_log_path(folder, name).await?;
        let log = LibSqlRunLog::open(&path, &name).await?;
        info!(name = %log.name, id = %log.id, "Run log created");
        Ok(Arc::new(log))
    }

    async fn find_overview(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Option<Arc<dyn OverviewSink>>, StorageError> {
        let path = sink_path(folder, name);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let overview = LibSqlOverview::open(&path).await?;
        Ok(Some(Arc::new(overview)))
    }

    async fn create_overview(
        &self,
        name: &str,
        folder: &Folder,
    ) -> Result<Arc<dyn OverviewSink>, StorageError> {
        let path = sink_path(folder, name);
        let overview = LibSqlOverview::open(&path).await?;
        info!(path = %path.display(), "Overview created");
        Ok(Arc::new(overview))
    }
}

// ── Run log ─────────────────────────────────────────────────────────

/// A run log stored in its own libSQL file.
pub struct LibSqlRunLog {
    #[allow(dead_code)]
    db: LibSqlDatabase,
    conn: Connection,
    id: String,
    name: String,
    path: PathBuf,
}

impl LibSqlRunLog {
    /// Open (or create) the run log at `path`.
    ///
    /// A new file is assigned a fresh id; an existing one keeps its id.
    pub async fn open(path: &Path, name: &str) -> Result<Self, DatabaseError> {
        let (db, conn) = open_database(path, migrations::RUN_LOG_MIGRATIONS).await?;
        let id = Self::load_or_assign_id(&conn).await?;
        Ok(Self {
            db,
            conn,
            id,
            name: name.to_string(),
            path: path.to_path_buf(),
        })
    }

    async fn load_or_assign_id(conn: &Connection) -> Result<String, DatabaseError> {
        conn.execute(
            "INSERT OR IGNORE INTO _meta (key, value) VALUES (?1, ?2)",
            params![META_LOG_ID, Uuid::new_v4().to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("assign log id: {e}")))?;

        let mut rows = conn
            .query(
                "SELECT value FROM _meta WHERE key = ?1",
                params![META_LOG_ID],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load log id: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => row
                .get::<String>(0)
                .map_err(|e| DatabaseError::Query(format!("load log id: {e}"))),
            Ok(None) => Err(DatabaseError::Query("load log id: missing".into())),
            Err(e) => Err(DatabaseError::Query(format!("load log id: {e}"))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn row_to_log_row(row: &libsql::Row) -> Result<LogRow, libsql::Error> {
    let unread: i64 = row.get(5)?;
    Ok(LogRow {
        timestamp: row.get(0)?,
        rule_name: row.get(1)?,
        subject: row.get(2)?,
        email_date: row.get(3)?,
        reason: row.get(4)?,
        unread_count: usize::try_from(unread).unwrap_or(0),
        custom_labels: row.get(6)?,
        labels: row.get(7)?,
        category: row.get(8)?,
        action: row.get(9)?,
        thread_link: row.get(10)?,
    })
}

fn row_to_fallback(row: &libsql::Row) -> Result<FallbackRow, libsql::Error> {
    Ok(FallbackRow {
        timestamp: row.get(0)?,
        issue: row.get(1)?,
        subject: row.get(2)?,
        thread_id: row.get(3)?,
        details: row.get(4)?,
    })
}

#[async_trait]
impl RunLog for LibSqlRunLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn link(&self) -> String {
        file_link(&self.path)
    }

    async fn append_row(&self, row: &LogRow) -> Result<(), StorageError> {
        self.conn
            .execute(
                r#"INSERT INTO "Run Log" VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
                params![
                    row.timestamp.as_str(),
                    row.rule_name.as_str(),
                    row.subject.as_str(),
                    row.email_date.as_str(),
                    row.reason.as_str(),
                    usize_to_i64(row.unread_count),
                    row.custom_labels.as_str(),
                    row.labels.as_str(),
                    row.category.as_str(),
                    row.action.as_str(),
                    row.thread_link.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_row: {e}")))?;
        Ok(())
    }

    async fn append_fallback(&self, row: &FallbackRow) -> Result<(), StorageError> {
        self.conn
            .execute(
                r#"INSERT INTO "Fallback Log" VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    row.timestamp.as_str(),
                    row.issue.as_str(),
                    row.subject.as_str(),
                    row.thread_id.as_str(),
                    row.details.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_fallback: {e}")))?;
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<LogRow>, StorageError> {
        let mut rows = self
            .conn
            .query(r#"SELECT * FROM "Run Log" ORDER BY rowid ASC"#, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("rows: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("rows: {e}")))?
        {
            out.push(row_to_log_row(&row).map_err(|e| DatabaseError::Query(format!("rows: {e}")))?);
        }
        Ok(out)
    }

    async fn fallback_rows(&self) -> Result<Vec<FallbackRow>, StorageError> {
        let mut rows = self
            .conn
            .query(r#"SELECT * FROM "Fallback Log" ORDER BY rowid ASC"#, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("fallback_rows: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("fallback_rows: {e}")))?
        {
            out.push(
                row_to_fallback(&row)
                    .map_err(|e| DatabaseError::Query(format!("fallback_rows: {e}")))?,
            );
        }
        Ok(out)
    }
}

// ── Overview ────────────────────────────────────────────────────────

/// The overview stored in its own libSQL file.
pub struct LibSqlOverview {
    #[allow(dead_code)]
    db: LibSqlDatabase,
    conn: Connection,
}

impl LibSqlOverview {
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let (db, conn) = open_database(path, migrations::OVERVIEW_MIGRATIONS).await?;
        Ok(Self { db, conn })
    }
}

fn row_to_overview(row: &libsql::Row) -> Result<OverviewRow, libsql::Error> {
    let status: String = row.get(4)?;
    Ok(OverviewRow {
        run_timestamp: row.get(0)?,
        log_file_name: row.get(1)?,
        log_file_id: row.get(2)?,
        log_link: row.get(3)?,
        // Hand-edited cells read back as Started rather than failing the sweep.
        status: RunStatus::parse(&status).unwrap_or(RunStatus::Started),
    })
}

#[async_trait]
impl OverviewSink for LibSqlOverview {
    async fn contains(&self, log_file_id: &str) -> Result<bool, StorageError> {
        let mut rows = self
            .conn
            .query(
                r#"SELECT 1 FROM "Overview" WHERE "Log File ID" = ?1 LIMIT 1"#,
                params![log_file_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("contains: {e}")))?;
        let found = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("contains: {e}")))?
            .is_some();
        Ok(found)
    }

    async fn append(&self, row: &OverviewRow) -> Result<(), StorageError> {
        self.conn
            .execute(
                r#"INSERT INTO "Overview" VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    row.run_timestamp.as_str(),
                    row.log_file_name.as_str(),
                    row.log_file_id.as_str(),
                    row.log_link.as_str(),
                    row.status.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append overview: {e}")))?;
        Ok(())
    }

    async fn set_status(
        &self,
        log_file_id: &str,
        status: RunStatus,
    ) -> Result<bool, StorageError> {
        // Only the first matching row is touched.
        let changed = self
            .conn
            .execute(
                r#"UPDATE "Overview" SET "Status" = ?1 WHERE rowid = (
                    SELECT rowid FROM "Overview" WHERE "Log File ID" = ?2 ORDER BY rowid LIMIT 1
                )"#,
                params![status.as_str(), log_file_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_status: {e}")))?;
        debug!(log_file_id, status = %status, changed, "Overview status updated");
        Ok(changed > 0)
    }

    async fn rows(&self) -> Result<Vec<OverviewRow>, StorageError> {
        let mut rows = self
            .conn
            .query(r#"SELECT * FROM "Overview" ORDER BY rowid ASC"#, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("overview rows: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("overview rows: {e}")))?
        {
            out.push(
                row_to_overview(&row)
                    .map_err(|e| DatabaseError::Query(format!("overview rows: {e}")))?,
            );
        }
        Ok(out)
    }
}
