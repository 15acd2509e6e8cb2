//! Protocol-layer errors and the mapping from filesystem error classes to
//! HTTP status codes.

use std::io;

use http::StatusCode;
use thiserror::Error;

use crate::fs::{FsError, FsErrorKind};

pub type DavResult<T> = std::result::Result<T, DavError>;

#[derive(Debug, Error)]
pub enum DavError {
    #[error("unknown HTTP method")]
    UnknownDavMethod,
    #[error("{0}")]
    Status(StatusCode),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("xml output: {0}")]
    Xml(#[from] xml::writer::Error),
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
}

impl From<StatusCode> for DavError {
    fn from(status: StatusCode) -> DavError {
        DavError::Status(status)
    }
}

impl DavError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            DavError::UnknownDavMethod => StatusCode::METHOD_NOT_ALLOWED,
            DavError::Status(status) => *status,
            DavError::Fs(e) => fs_to_status(e.kind),
            DavError::Xml(_) | DavError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub(crate) fn fs_to_status(kind: FsErrorKind) -> StatusCode {
    match kind {
        FsErrorKind::NotFound => StatusCode::NOT_FOUND,
        FsErrorKind::Exists => StatusCode::BAD_REQUEST,
        FsErrorKind::IsDirectory | FsErrorKind::NotDirectory | FsErrorKind::NotEmpty => {
            StatusCode::CONFLICT
        }
        FsErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        FsErrorKind::AccessDenied | FsErrorKind::NotPermitted => StatusCode::FORBIDDEN,
        FsErrorKind::NoSpace | FsErrorKind::TooLarge => StatusCode::INSUFFICIENT_STORAGE,
        FsErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(fs_to_status(FsErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(fs_to_status(FsErrorKind::Exists), StatusCode::BAD_REQUEST);
        assert_eq!(fs_to_status(FsErrorKind::NotEmpty), StatusCode::CONFLICT);
        assert_eq!(
            fs_to_status(FsErrorKind::NoSpace),
            StatusCode::INSUFFICIENT_STORAGE
        );
    }
}
