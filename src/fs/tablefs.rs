//! The single-table filesystem.
//!
//! One row per file or explicit directory, keyed by normalized path. A row
//! whose key ends in `/` is an explicit directory; a directory with no row
//! of its own still exists implicitly while any descendant row does. All
//! hierarchy queries are LIKE prefix scans over the key column, so the SQL
//! subset in use stays portable across SQLite, Postgres and MySQL.

use std::collections::BTreeSet;
use std::sync::Once;

use async_stream::stream;
use bytes::Bytes;
use futures_util::FutureExt;
use sha2::{Digest, Sha256};
use sqlx::any::install_default_drivers;
use sqlx::pool::PoolOptions;
use sqlx::{AnyPool, Row};

use crate::davpath::{escape_like, normalize};
use crate::fs::{
    now_ms, DavFileSystem, DirEntry, FileKind, FsError, FsErrorKind, FsFuture, FsResult, FsStream,
    RemoveOptions, Stat,
};

static DRIVERS: Once = Once::new();

/// Database flavor, inferred from the connection URL scheme. Drives the
/// few SQL spellings that differ between engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    fn from_url(url: &str) -> FsResult<Dialect> {
        match url.split(':').next().unwrap_or("") {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            other => Err(FsError::invalid(
                "connect",
                url,
                format!("unsupported database scheme '{other}'"),
            )),
        }
    }

    fn bind(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            _ => "?".to_string(),
        }
    }

    /// The ESCAPE clause for LIKE patterns produced by
    /// [`escape_like`]. MySQL string literals eat one backslash.
    fn escape_clause(self) -> &'static str {
        match self {
            Dialect::Mysql => r"ESCAPE '\\'",
            _ => r"ESCAPE '\'",
        }
    }
}

/// Filesystem stored in one table.
pub struct TableFs {
    pool: AnyPool,
    table: String,
    dialect: Dialect,
}

impl TableFs {
    /// Connect and make sure the backing table exists.
    ///
    /// The table name is interpolated into SQL, so it must be a bare
    /// identifier.
    pub async fn connect(url: &str, table: &str) -> FsResult<TableFs> {
        if !is_identifier(table) {
            return Err(FsError::invalid(
                "connect",
                table,
                "table name must be a bare SQL identifier",
            ));
        }
        DRIVERS.call_once(install_default_drivers);
        let dialect = Dialect::from_url(url)?;

        // A plain in-memory SQLite database lives and dies with its
        // connection, so the pool must not grow past one.
        let pool = if dialect == Dialect::Sqlite && url.contains(":memory:") {
            PoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .map_err(|e| FsError::storage("connect", url, e.to_string()))?
        } else {
            AnyPool::connect(url)
                .await
                .map_err(|e| FsError::storage("connect", url, e.to_string()))?
        };

        let fs = TableFs {
            pool,
            table: table.to_string(),
            dialect,
        };
        fs.bootstrap().await?;
        Ok(fs)
    }

    async fn bootstrap(&self) -> FsResult<()> {
        let t = &self.table;
        let sql = match self.dialect {
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {t} (\
                 path TEXT PRIMARY KEY, \
                 created_at INTEGER NOT NULL, \
                 modified_at INTEGER NOT NULL, \
                 size INTEGER NOT NULL, \
                 etag TEXT NOT NULL, \
                 content BLOB, \
                 meta TEXT)"
            ),
            Dialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {t} (\
                 path VARCHAR(4096) PRIMARY KEY, \
                 created_at BIGINT NOT NULL, \
                 modified_at BIGINT NOT NULL, \
                 size BIGINT NOT NULL, \
                 etag TEXT NOT NULL, \
                 content BYTEA, \
                 meta TEXT)"
            ),
            // InnoDB caps index keys at 3072 bytes (768 chars at utf8mb4).
            Dialect::Mysql => format!(
                "CREATE TABLE IF NOT EXISTS {t} (\
                 path VARCHAR(768) PRIMARY KEY, \
                 created_at BIGINT NOT NULL, \
                 modified_at BIGINT NOT NULL, \
                 size BIGINT NOT NULL, \
                 etag TEXT NOT NULL, \
                 content LONGBLOB, \
                 meta TEXT)"
            ),
        };
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| FsError::storage("bootstrap", t, e.to_string()))?;
        Ok(())
    }

    fn upsert_file_sql(&self, refresh_created: bool) -> String {
        let t = &self.table;
        let d = self.dialect;
        let insert = format!(
            "INSERT INTO {t} (path, created_at, modified_at, size, etag, content, meta) \
             VALUES ({}, {}, {}, {}, {}, {}, {})",
            d.bind(1),
            d.bind(2),
            d.bind(3),
            d.bind(4),
            d.bind(5),
            d.bind(6),
            d.bind(7),
        );
        match d {
            Dialect::Sqlite | Dialect::Postgres => {
                let created = if refresh_created {
                    "created_at = excluded.created_at, "
                } else {
                    ""
                };
                format!(
                    "{insert} ON CONFLICT (path) DO UPDATE SET {created}\
                     modified_at = excluded.modified_at, size = excluded.size, \
                     etag = excluded.etag, content = excluded.content"
                )
            }
            Dialect::Mysql => {
                let created = if refresh_created {
                    "created_at = VALUES(created_at), "
                } else {
                    ""
                };
                format!(
                    "{insert} ON DUPLICATE KEY UPDATE {created}\
                     modified_at = VALUES(modified_at), size = VALUES(size), \
                     etag = VALUES(etag), content = VALUES(content)"
                )
            }
        }
    }

    /// File row lookup by exact key.
    async fn lookup_file(&self, key: &str) -> FsResult<Option<Stat>> {
        let sql = format!(
            "SELECT size, created_at, modified_at, etag FROM {} WHERE path = {}",
            self.table,
            self.dialect.bind(1)
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let size: i64 = row
            .try_get(0)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        let created_at: i64 = row
            .try_get(1)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        let modified_at: i64 = row
            .try_get(2)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        let etag: String = row
            .try_get(3)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        Ok(Some(Stat {
            path: key.to_string(),
            kind: FileKind::File,
            size: size.max(0) as u64,
            created_at,
            modified_at,
            etag: Some(etag),
        }))
    }

    /// Directory lookup: explicit row first, otherwise implied by any
    /// descendant row. `key` is the slashless form (`/` for the root).
    async fn lookup_dir(&self, key: &str) -> FsResult<Option<Stat>> {
        let dkey = dir_key(key);
        if dkey != "/" {
            let sql = format!(
                "SELECT created_at, modified_at FROM {} WHERE path = {}",
                self.table,
                self.dialect.bind(1)
            );
            let row = sqlx::query(&sql)
                .bind(&dkey)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
            if let Some(row) = row {
                let created_at: i64 = row
                    .try_get(0)
                    .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
                let modified_at: i64 = row
                    .try_get(1)
                    .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
                return Ok(Some(Stat {
                    path: key.to_string(),
                    kind: FileKind::Directory,
                    size: 0,
                    created_at,
                    modified_at,
                    etag: None,
                }));
            }
        }

        let pattern = format!("{}%", escape_like(&dkey));
        let sql = format!(
            "SELECT COUNT(path), MIN(created_at), MAX(modified_at) FROM {} \
             WHERE path LIKE {} {} AND path <> {}",
            self.table,
            self.dialect.bind(1),
            self.dialect.escape_clause(),
            self.dialect.bind(2),
        );
        let row = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&dkey)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        if count == 0 {
            return Ok(None);
        }
        let created_at: Option<i64> = row
            .try_get(1)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        let modified_at: Option<i64> = row
            .try_get(2)
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        Ok(Some(Stat {
            path: key.to_string(),
            kind: FileKind::Directory,
            size: 0,
            created_at: created_at.unwrap_or(0),
            modified_at: modified_at.unwrap_or(0),
            etag: None,
        }))
    }

    async fn stat_impl(&self, path: &str) -> FsResult<Stat> {
        let key = normalize(path);
        trace!("FS: stat {key}");
        if key == "/" {
            return self
                .lookup_dir("/")
                .await?
                .ok_or_else(|| FsError::not_found("stat", "/"));
        }
        if let Some(stat) = self.lookup_file(&key).await? {
            return Ok(stat);
        }
        self.lookup_dir(&key)
            .await?
            .ok_or_else(|| FsError::not_found("stat", &key))
    }

    async fn mkdir_impl(&self, path: &str, recursive: bool) -> FsResult<()> {
        let key = normalize(path);
        trace!("FS: mkdir {key} recursive={recursive}");
        if key == "/" {
            return Err(FsError::exists("mkdir", &key));
        }
        match self.stat_impl(&key).await {
            Ok(_) => return Err(FsError::exists("mkdir", &key)),
            Err(e) if e.kind == FsErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if !recursive {
            let parent = parent_of(&key);
            if parent != "/" {
                match self.stat_impl(&parent).await {
                    Ok(st) if st.is_dir() => {}
                    Ok(_) => return Err(FsError::not_directory("mkdir", &parent)),
                    Err(e) if e.kind == FsErrorKind::NotFound => {
                        return Err(FsError::not_found("mkdir", &parent))
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        let now = now_ms();
        let sql = format!(
            "INSERT INTO {} (path, created_at, modified_at, size, etag, content, meta) \
             VALUES ({}, {}, {}, {}, {}, {}, {})",
            self.table,
            self.dialect.bind(1),
            self.dialect.bind(2),
            self.dialect.bind(3),
            self.dialect.bind(4),
            self.dialect.bind(5),
            self.dialect.bind(6),
            self.dialect.bind(7),
        );
        sqlx::query(&sql)
            .bind(dir_key(&key))
            .bind(now)
            .bind(now)
            .bind(0i64)
            .bind("")
            .bind(Option::<Vec<u8>>::None)
            .bind(Option::<String>::None)
            .execute(&self.pool)
            .await
            .map_err(|e| FsError::storage("mkdir", &key, e.to_string()))?;
        Ok(())
    }

    async fn write_file_impl(&self, path: &str, data: Bytes) -> FsResult<()> {
        let key = normalize(path);
        trace!("FS: write_file {key} ({} bytes)", data.len());
        if key == "/" {
            return Err(FsError::is_directory("write", &key));
        }
        if self.row_exists(&format!("{key}/")).await? {
            return Err(FsError::is_directory("write", &key));
        }
        let now = now_ms();
        let etag = content_etag(&data);
        let sql = self.upsert_file_sql(false);
        sqlx::query(&sql)
            .bind(&key)
            .bind(now)
            .bind(now)
            .bind(data.len() as i64)
            .bind(&etag)
            .bind(data.to_vec())
            .bind(Option::<String>::None)
            .execute(&self.pool)
            .await
            .map_err(|e| FsError::storage("write", &key, e.to_string()))?;
        Ok(())
    }

    async fn read_file_impl(&self, path: &str) -> FsResult<Bytes> {
        let key = normalize(path);
        trace!("FS: read_file {key}");
        let sql = format!(
            "SELECT content FROM {} WHERE path = {}",
            self.table,
            self.dialect.bind(1)
        );
        let row = sqlx::query(&sql)
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FsError::storage("read", &key, e.to_string()))?
            .ok_or_else(|| FsError::not_found("read", &key))?;
        let content: Option<Vec<u8>> = row
            .try_get(0)
            .map_err(|e| FsError::storage("read", &key, e.to_string()))?;
        content
            .map(Bytes::from)
            .ok_or_else(|| FsError::not_found("read", &key))
    }

    async fn read_stream_impl(&self, path: &str, chunk_size: usize) -> FsResult<FsStream<Bytes>> {
        let key = normalize(path);
        trace!("FS: read_stream {key} chunk={chunk_size}");
        self.lookup_file(&key)
            .await?
            .ok_or_else(|| FsError::not_found("read", &key))?;

        let chunk = chunk_size.clamp(1, MAX_CHUNK) as i32;
        let sql = format!(
            "SELECT substr(content, {}, {}) FROM {} WHERE path = {}",
            self.dialect.bind(1),
            self.dialect.bind(2),
            self.table,
            self.dialect.bind(3),
        );
        let pool = self.pool.clone();

        // substr is 1-indexed; every iteration is one bounded round-trip.
        let s = stream! {
            let mut offset: i64 = 1;
            loop {
                if offset > i32::MAX as i64 {
                    break;
                }
                let row = sqlx::query(&sql)
                    .bind(offset as i32)
                    .bind(chunk)
                    .bind(key.as_str())
                    .fetch_optional(&pool)
                    .await;
                match row {
                    Err(e) => {
                        yield Err(FsError::storage("read", &key, e.to_string()));
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(row)) => {
                        let piece: Option<Vec<u8>> = match row.try_get(0) {
                            Ok(v) => v,
                            Err(e) => {
                                yield Err(FsError::storage("read", &key, e.to_string()));
                                break;
                            }
                        };
                        match piece {
                            None => break,
                            Some(v) if v.is_empty() => break,
                            Some(v) => {
                                let n = v.len();
                                yield Ok(Bytes::from(v));
                                if n < chunk as usize {
                                    break;
                                }
                                offset += chunk as i64;
                            }
                        }
                    }
                }
            }
        };
        Ok(Box::pin(s) as FsStream<Bytes>)
    }

    async fn read_dir_impl(&self, path: &str, recursive: bool) -> FsResult<Vec<DirEntry>> {
        let key = normalize(path);
        trace!("FS: read_dir {key} recursive={recursive}");
        let prefix = dir_key(&key);
        let pattern = format!("{}%", escape_like(&prefix));
        let sql = format!(
            "SELECT path FROM {} WHERE path LIKE {} {}",
            self.table,
            self.dialect.bind(1),
            self.dialect.escape_clause(),
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FsError::storage("readdir", &key, e.to_string()))?;

        let mut dirs: BTreeSet<String> = BTreeSet::new();
        let mut files: BTreeSet<String> = BTreeSet::new();
        for row in rows {
            let p: String = row
                .try_get(0)
                .map_err(|e| FsError::storage("readdir", &key, e.to_string()))?;
            let rel = match p.strip_prefix(prefix.as_str()) {
                Some(rel) if !rel.is_empty() => rel,
                _ => continue,
            };
            if recursive {
                if let Some(dir_rel) = rel.strip_suffix('/') {
                    insert_with_ancestors(&mut dirs, dir_rel);
                } else {
                    files.insert(rel.to_string());
                    if let Some(idx) = rel.rfind('/') {
                        insert_with_ancestors(&mut dirs, &rel[..idx]);
                    }
                }
            } else {
                match rel.find('/') {
                    None => {
                        files.insert(rel.to_string());
                    }
                    Some(idx) if idx > 0 => {
                        dirs.insert(rel[..idx].to_string());
                    }
                    Some(_) => {}
                }
            }
        }

        let mut out = Vec::with_capacity(dirs.len() + files.len());
        for rel in dirs {
            out.push(DirEntry {
                rel,
                base: key.clone(),
                kind: FileKind::Directory,
            });
        }
        for rel in files {
            out.push(DirEntry {
                rel,
                base: key.clone(),
                kind: FileKind::File,
            });
        }
        Ok(out)
    }

    async fn rename_impl(&self, from: &str, to: &str) -> FsResult<()> {
        let from_key = normalize(from);
        let to_key = normalize(to);
        trace!("FS: rename {from_key} -> {to_key}");
        if from_key == "/" || to_key == "/" {
            return Err(FsError::invalid("rename", &from_key, "cannot rename the root"));
        }
        let src = self.stat_impl(&from_key).await?;
        let now = now_ms();

        if src.is_file() {
            match self.stat_impl(&to_key).await {
                Ok(st) if st.is_file() => return Err(FsError::exists("rename", &to_key)),
                Ok(_) => return Err(FsError::is_directory("rename", &to_key)),
                Err(e) if e.kind == FsErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            let sql = format!(
                "UPDATE {} SET path = {}, modified_at = {} WHERE path = {}",
                self.table,
                self.dialect.bind(1),
                self.dialect.bind(2),
                self.dialect.bind(3),
            );
            sqlx::query(&sql)
                .bind(&to_key)
                .bind(now)
                .bind(&from_key)
                .execute(&self.pool)
                .await
                .map_err(|e| FsError::storage("rename", &from_key, e.to_string()))?;
            return Ok(());
        }

        let from_dir = format!("{from_key}/");
        if to_key.starts_with(&from_dir) {
            return Err(FsError::invalid(
                "rename",
                &from_key,
                "cannot move a directory into itself",
            ));
        }
        match self.stat_impl(&to_key).await {
            Ok(_) => return Err(FsError::exists("rename", &to_key)),
            Err(e) if e.kind == FsErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let to_dir = format!("{to_key}/");

        // One statement per row; grouped so a failure rolls the batch back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FsError::storage("rename", &from_key, e.to_string()))?;
        let update = format!(
            "UPDATE {} SET path = {}, modified_at = {} WHERE path = {}",
            self.table,
            self.dialect.bind(1),
            self.dialect.bind(2),
            self.dialect.bind(3),
        );
        sqlx::query(&update)
            .bind(&to_dir)
            .bind(now)
            .bind(&from_dir)
            .execute(&mut *tx)
            .await
            .map_err(|e| FsError::storage("rename", &from_key, e.to_string()))?;

        let select = format!(
            "SELECT path FROM {} WHERE path LIKE {} {}",
            self.table,
            self.dialect.bind(1),
            self.dialect.escape_clause(),
        );
        let pattern = format!("{}%", escape_like(&from_dir));
        let rows = sqlx::query(&select)
            .bind(&pattern)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| FsError::storage("rename", &from_key, e.to_string()))?;
        for row in rows {
            let p: String = row
                .try_get(0)
                .map_err(|e| FsError::storage("rename", &from_key, e.to_string()))?;
            let rest = match p.strip_prefix(from_dir.as_str()) {
                Some(rest) => rest,
                None => continue,
            };
            let renamed = format!("{to_dir}{rest}");
            sqlx::query(&update)
                .bind(&renamed)
                .bind(now)
                .bind(&p)
                .execute(&mut *tx)
                .await
                .map_err(|e| FsError::storage("rename", &p, e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| FsError::storage("rename", &from_key, e.to_string()))?;
        Ok(())
    }

    async fn rmdir_impl(&self, path: &str, recursive: bool) -> FsResult<()> {
        let key = normalize(path);
        trace!("FS: rmdir {key} recursive={recursive}");
        let st = self.stat_impl(&key).await?;
        if st.is_file() {
            return Err(FsError::not_directory("rmdir", &key));
        }
        let dkey = dir_key(&key);
        let pattern = format!("{}%", escape_like(&dkey));

        if !recursive {
            let sql = format!(
                "SELECT COUNT(path) FROM {} WHERE path LIKE {} {} AND path <> {}",
                self.table,
                self.dialect.bind(1),
                self.dialect.escape_clause(),
                self.dialect.bind(2),
            );
            let row = sqlx::query(&sql)
                .bind(&pattern)
                .bind(&dkey)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| FsError::storage("rmdir", &key, e.to_string()))?;
            let count: i64 = row
                .try_get(0)
                .map_err(|e| FsError::storage("rmdir", &key, e.to_string()))?;
            if count > 0 {
                return Err(FsError::not_empty("rmdir", &key));
            }
            let sql = format!(
                "DELETE FROM {} WHERE path = {}",
                self.table,
                self.dialect.bind(1)
            );
            sqlx::query(&sql)
                .bind(&dkey)
                .execute(&self.pool)
                .await
                .map_err(|e| FsError::storage("rmdir", &key, e.to_string()))?;
            return Ok(());
        }

        // Matches the explicit row and every descendant.
        let sql = format!(
            "DELETE FROM {} WHERE path LIKE {} {}",
            self.table,
            self.dialect.bind(1),
            self.dialect.escape_clause(),
        );
        sqlx::query(&sql)
            .bind(&pattern)
            .execute(&self.pool)
            .await
            .map_err(|e| FsError::storage("rmdir", &key, e.to_string()))?;
        Ok(())
    }

    async fn unlink_impl(&self, path: &str) -> FsResult<()> {
        if path.ends_with('/') {
            return Err(FsError::is_directory("unlink", path));
        }
        let key = normalize(path);
        trace!("FS: unlink {key}");
        if key == "/" {
            return Err(FsError::is_directory("unlink", &key));
        }
        let sql = format!(
            "DELETE FROM {} WHERE path = {}",
            self.table,
            self.dialect.bind(1)
        );
        let result = sqlx::query(&sql)
            .bind(&key)
            .execute(&self.pool)
            .await
            .map_err(|e| FsError::storage("unlink", &key, e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(FsError::not_found("unlink", &key));
        }
        Ok(())
    }

    async fn rm_impl(&self, path: &str, opts: RemoveOptions) -> FsResult<()> {
        let key = normalize(path);
        trace!("FS: rm {key} {opts:?}");
        let st = match self.stat_impl(&key).await {
            Ok(st) => st,
            Err(e) if e.kind == FsErrorKind::NotFound && opts.force => return Ok(()),
            Err(e) => return Err(e),
        };
        if st.is_dir() {
            self.rmdir_impl(&key, opts.recursive).await
        } else {
            self.unlink_impl(&key).await
        }
    }

    async fn copy_file_impl(&self, from: &str, to: &str) -> FsResult<()> {
        if from.ends_with('/') {
            return Err(FsError::invalid("copyfile", from, "source is a directory"));
        }
        let from_key = normalize(from);
        let to_key = normalize(to);
        trace!("FS: copy_file {from_key} -> {to_key}");
        if from_key == "/" {
            return Err(FsError::invalid("copyfile", &from_key, "source is a directory"));
        }
        if to.ends_with('/') || to_key == "/" {
            return Err(FsError::is_directory("copyfile", &to_key));
        }
        match self.stat_impl(&to_key).await {
            Ok(st) if st.is_dir() => return Err(FsError::is_directory("copyfile", &to_key)),
            Ok(_) => {}
            Err(e) if e.kind == FsErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let sql = format!(
            "SELECT size, etag, content FROM {} WHERE path = {}",
            self.table,
            self.dialect.bind(1)
        );
        let row = sqlx::query(&sql)
            .bind(&from_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FsError::storage("copyfile", &from_key, e.to_string()))?
            .ok_or_else(|| FsError::not_found("copyfile", &from_key))?;
        let size: i64 = row
            .try_get(0)
            .map_err(|e| FsError::storage("copyfile", &from_key, e.to_string()))?;
        let etag: String = row
            .try_get(1)
            .map_err(|e| FsError::storage("copyfile", &from_key, e.to_string()))?;
        let content: Option<Vec<u8>> = row
            .try_get(2)
            .map_err(|e| FsError::storage("copyfile", &from_key, e.to_string()))?;
        let content = content.ok_or_else(|| FsError::not_found("copyfile", &from_key))?;

        let now = now_ms();
        let sql = self.upsert_file_sql(true);
        sqlx::query(&sql)
            .bind(&to_key)
            .bind(now)
            .bind(now)
            .bind(size)
            .bind(&etag)
            .bind(content)
            .bind(Option::<String>::None)
            .execute(&self.pool)
            .await
            .map_err(|e| FsError::storage("copyfile", &to_key, e.to_string()))?;
        Ok(())
    }

    async fn row_exists(&self, key: &str) -> FsResult<bool> {
        let sql = format!(
            "SELECT path FROM {} WHERE path = {}",
            self.table,
            self.dialect.bind(1)
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FsError::storage("stat", key, e.to_string()))?;
        Ok(row.is_some())
    }
}

impl DavFileSystem for TableFs {
    fn stat<'a>(&'a self, path: &'a str) -> FsFuture<'a, Stat> {
        self.stat_impl(path).boxed()
    }

    fn mkdir<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()> {
        self.mkdir_impl(path, recursive).boxed()
    }

    fn write_file<'a>(&'a self, path: &'a str, data: Bytes) -> FsFuture<'a, ()> {
        self.write_file_impl(path, data).boxed()
    }

    fn read_file<'a>(&'a self, path: &'a str) -> FsFuture<'a, Bytes> {
        self.read_file_impl(path).boxed()
    }

    fn read_stream<'a>(&'a self, path: &'a str, chunk_size: usize) -> FsFuture<'a, FsStream<Bytes>> {
        self.read_stream_impl(path, chunk_size).boxed()
    }

    fn read_dir<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, Vec<DirEntry>> {
        self.read_dir_impl(path, recursive).boxed()
    }

    fn rename<'a>(&'a self, from: &'a str, to: &'a str) -> FsFuture<'a, ()> {
        self.rename_impl(from, to).boxed()
    }

    fn rmdir<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()> {
        self.rmdir_impl(path, recursive).boxed()
    }

    fn unlink<'a>(&'a self, path: &'a str) -> FsFuture<'a, ()> {
        self.unlink_impl(path).boxed()
    }

    fn rm<'a>(&'a self, path: &'a str, opts: RemoveOptions) -> FsFuture<'a, ()> {
        self.rm_impl(path, opts).boxed()
    }

    fn copy_file<'a>(&'a self, from: &'a str, to: &'a str) -> FsFuture<'a, ()> {
        self.copy_file_impl(from, to).boxed()
    }
}

/// Largest chunk a single streaming round-trip may return.
const MAX_CHUNK: usize = 1024 * 1024;

/// Quoted hex SHA-256, the strong etag stored with every file row.
pub(crate) fn content_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(data)))
}

/// Directory key form: trailing slash, except for the root.
fn dir_key(key: &str) -> String {
    if key == "/" {
        "/".to_string()
    } else {
        format!("{key}/")
    }
}

fn parent_of(key: &str) -> String {
    match key.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => key[..idx].to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Record a directory plus every ancestor segment leading to it.
fn insert_with_ancestors(dirs: &mut BTreeSet<String>, rel: &str) {
    if rel.is_empty() {
        return;
    }
    for (idx, c) in rel.char_indices() {
        if c == '/' {
            dirs.insert(rel[..idx].to_string());
        }
    }
    dirs.insert(rel.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("filesystem"));
        assert!(is_identifier("_fs2"));
        assert!(!is_identifier("2fs"));
        assert!(!is_identifier("fs; DROP TABLE"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn etag_is_quoted_sha256() {
        let tag = content_etag(b"hi");
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag.len(), 66);
        assert_eq!(
            tag,
            "\"8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4\""
        );
    }

    #[test]
    fn ancestor_segments() {
        let mut dirs = BTreeSet::new();
        insert_with_ancestors(&mut dirs, "a/b/c");
        let got: Vec<_> = dirs.iter().cloned().collect();
        assert_eq!(got, vec!["a", "a/b", "a/b/c"]);
    }
}
