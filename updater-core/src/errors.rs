use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for glue code (config, driver).
pub type Result<T> = anyhow::Result<T>;

/// A script abort: halts the whole script. The message is also recorded on the
/// execution state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Abort {
    pub message: String,
}

impl Abort {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum UbiError {
    #[error("bad device index for {0}")]
    UnknownPartition(String),

    #[error("MTD attach/detach feature is not supported by your kernel")]
    Unsupported,

    #[error("cannot attach mtd{0}")]
    Attach(u32, #[source] updater_hal::HalError),

    #[error("{step}: {source}")]
    Hal {
        step: &'static str,
        #[source]
        source: updater_hal::HalError,
    },
}

impl UbiError {
    pub(crate) fn hal(step: &'static str) -> impl FnOnce(updater_hal::HalError) -> Self {
        move |source| UbiError::Hal { step, source }
    }
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("failed to open package {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("no {0} in package")]
    MissingEntry(String),

    #[error("unsafe entry name {0:?}")]
    UnsafeEntry(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("\"{0}\" is not a valid sha-1")]
    BadDigest(String),

    #[error("source file does not match any candidate sha-1")]
    NoMatchingSource,

    #[error("patched data has size {actual}, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("patched data has sha-1 {actual}, expected {expected}")]
    DigestMismatch { expected: String, actual: String },

    #[error("malformed patch: {0}")]
    Malformed(String),

    #[error("not enough space in cache for {0} bytes")]
    NoCacheSpace(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("statvfs failed: {0}")]
    Nix(#[from] nix::errno::Errno),
}

#[derive(Error, Debug)]
pub enum RetouchError {
    #[error("{0}: no retouch trailer")]
    MissingTrailer(PathBuf),

    #[error("{path}: corrupt retouch trailer ({reason})")]
    Corrupt { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to find {entry} in {package}")]
    MissingScript { entry: String, package: PathBuf },

    #[error("failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Package(#[from] PackageError),
}
