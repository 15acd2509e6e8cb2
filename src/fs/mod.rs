//! The filesystem contract the webdav handler is generic over.
//!
//! The handler only ever talks to a [`DavFileSystem`], so the storage
//! backend can be swapped out (the shipped one keeps everything in a single
//! database table, see [`tablefs`]). All methods take path strings; the
//! implementation normalizes them on entry.

use std::fmt;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::Stream;
use futures_util::FutureExt;
use thiserror::Error;

pub mod tablefs;

pub use tablefs::TableFs;

pub type FsResult<T> = std::result::Result<T, FsError>;
pub type FsFuture<'a, T> = BoxFuture<'a, FsResult<T>>;
pub type FsStream<T> = Pin<Box<dyn Stream<Item = FsResult<T>> + Send + 'static>>;

/// Errno-style error classes. The HTTP layer maps these to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    NotFound,
    Exists,
    IsDirectory,
    NotDirectory,
    NotEmpty,
    InvalidArgument,
    NotPermitted,
    AccessDenied,
    NoSpace,
    TooLarge,
    /// Underlying database failure.
    Storage,
}

impl FsErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            FsErrorKind::NotFound => "ENOENT",
            FsErrorKind::Exists => "EEXIST",
            FsErrorKind::IsDirectory => "EISDIR",
            FsErrorKind::NotDirectory => "ENOTDIR",
            FsErrorKind::NotEmpty => "ENOTEMPTY",
            FsErrorKind::InvalidArgument => "EINVAL",
            FsErrorKind::NotPermitted => "EPERM",
            FsErrorKind::AccessDenied => "EACCES",
            FsErrorKind::NoSpace => "ENOSPC",
            FsErrorKind::TooLarge => "EFBIG",
            FsErrorKind::Storage => "EIO",
        }
    }
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A filesystem error: class, the operation that failed, and the path.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {syscall} '{path}': {message}")]
pub struct FsError {
    pub kind: FsErrorKind,
    pub syscall: &'static str,
    pub path: String,
    pub message: String,
}

impl FsError {
    pub fn new(
        kind: FsErrorKind,
        syscall: &'static str,
        path: &str,
        message: impl Into<String>,
    ) -> FsError {
        FsError {
            kind,
            syscall,
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(syscall: &'static str, path: &str) -> FsError {
        FsError::new(
            FsErrorKind::NotFound,
            syscall,
            path,
            "no such file or directory",
        )
    }

    pub fn exists(syscall: &'static str, path: &str) -> FsError {
        FsError::new(FsErrorKind::Exists, syscall, path, "already exists")
    }

    pub fn is_directory(syscall: &'static str, path: &str) -> FsError {
        FsError::new(FsErrorKind::IsDirectory, syscall, path, "is a directory")
    }

    pub fn not_directory(syscall: &'static str, path: &str) -> FsError {
        FsError::new(FsErrorKind::NotDirectory, syscall, path, "not a directory")
    }

    pub fn not_empty(syscall: &'static str, path: &str) -> FsError {
        FsError::new(FsErrorKind::NotEmpty, syscall, path, "directory not empty")
    }

    pub fn invalid(syscall: &'static str, path: &str, message: impl Into<String>) -> FsError {
        FsError::new(FsErrorKind::InvalidArgument, syscall, path, message)
    }

    pub fn storage(syscall: &'static str, path: &str, message: impl Into<String>) -> FsError {
        FsError::new(FsErrorKind::Storage, syscall, path, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Metadata for one path. Directories (explicit or implicit) have size 0
/// and no etag.
#[derive(Debug, Clone)]
pub struct Stat {
    /// Normalized path this stat describes.
    pub path: String,
    pub kind: FileKind,
    pub size: u64,
    /// Milliseconds since the epoch.
    pub created_at: i64,
    /// Milliseconds since the epoch.
    pub modified_at: i64,
    /// Quoted hex SHA-256 of the content; files only.
    pub etag: Option<String>,
}

impl Stat {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn modified(&self) -> SystemTime {
        ms_to_systemtime(self.modified_at)
    }

    pub fn created(&self) -> SystemTime {
        ms_to_systemtime(self.created_at)
    }
}

pub(crate) fn ms_to_systemtime(ms: i64) -> SystemTime {
    if ms <= 0 {
        UNIX_EPOCH
    } else {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// One listing entry, relative to the directory that was listed.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Path relative to the listed directory. Contains `/` only for
    /// recursive listings.
    pub rel: String,
    /// Normalized path of the listed directory.
    pub base: String,
    pub kind: FileKind,
}

impl DirEntry {
    /// Final path segment.
    pub fn name(&self) -> &str {
        self.rel.rsplit('/').next().unwrap_or(&self.rel)
    }

    /// Absolute path of the entry.
    pub fn path(&self) -> String {
        if self.base == "/" {
            format!("/{}", self.rel)
        } else {
            format!("{}/{}", self.base, self.rel)
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub recursive: bool,
    /// Swallow `NotFound`.
    pub force: bool,
}

/// The filesystem operations the protocol layer is written against.
pub trait DavFileSystem: Send + Sync {
    /// Resolve a path to metadata. Files win over directories when a path
    /// could name both; directories may be explicit rows or implied by
    /// descendants.
    fn stat<'a>(&'a self, path: &'a str) -> FsFuture<'a, Stat>;

    /// Succeeds iff `stat` succeeds.
    fn access<'a>(&'a self, path: &'a str) -> FsFuture<'a, ()> {
        async move { self.stat(path).await.map(|_| ()) }.boxed()
    }

    /// Create an explicit directory. Without `recursive` the parent must
    /// already exist (explicitly or implicitly).
    fn mkdir<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()>;

    /// Create or overwrite a file. No `mkdir` is required for deep paths.
    fn write_file<'a>(&'a self, path: &'a str, data: Bytes) -> FsFuture<'a, ()>;

    /// Read a whole file into memory.
    fn read_file<'a>(&'a self, path: &'a str) -> FsFuture<'a, Bytes>;

    /// Lazy chunked read; finite and non-restartable. Each chunk is one
    /// round-trip of at most `chunk_size` bytes.
    fn read_stream<'a>(&'a self, path: &'a str, chunk_size: usize) -> FsFuture<'a, FsStream<Bytes>>;

    /// List a directory: directories first, then files, both lexicographic.
    fn read_dir<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, Vec<DirEntry>>;

    /// Rename a file or a directory tree.
    fn rename<'a>(&'a self, from: &'a str, to: &'a str) -> FsFuture<'a, ()>;

    /// Remove a directory; non-recursive removal requires it to be empty.
    fn rmdir<'a>(&'a self, path: &'a str, recursive: bool) -> FsFuture<'a, ()>;

    /// Remove a file.
    fn unlink<'a>(&'a self, path: &'a str) -> FsFuture<'a, ()>;

    /// Remove whatever the path resolves to.
    fn rm<'a>(&'a self, path: &'a str, opts: RemoveOptions) -> FsFuture<'a, ()>;

    /// Copy a single file, replacing the destination if present.
    fn copy_file<'a>(&'a self, from: &'a str, to: &'a str) -> FsFuture<'a, ()>;
}
