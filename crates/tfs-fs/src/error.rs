use thiserror::Error;

/// Error taxonomy for the TFS engine.
///
/// Kinds map onto host errno values only at the `tfs-host` boundary; nothing
/// in this crate speaks in errno.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("entry already exists: {0}")]
    Exists(String),

    #[error("no space left: {0}")]
    NoSpace(&'static str),

    #[error("block device I/O error")]
    Io(#[from] std::io::Error),

    #[error("corrupt filesystem: {0}")]
    Corrupt(&'static str),
}

pub type FsResult<T> = Result<T, FsError>;
