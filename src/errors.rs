//! Error taxonomy.
//!
//! Two orthogonal classes live here:
//! - usage errors: a caller violated a precondition (file path where a
//!   directory was required, malformed region, ...).  They are reported
//!   before any request is issued and are never worth retrying.
//! - operational failures: a request was rejected or never got a
//!   response.  They are ordinary outcomes callers may retry or branch on.

use http::Method;
use thiserror::Error;

/// A value failed its format rules at construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Region codes are lowercase alphanumerics and hyphens.
    #[error("Invalid region '{value}'")]
    InvalidRegion { value: String },

    /// Bucket names are 3+ lowercase alphanumerics, hyphens and periods.
    #[error("Invalid bucket name '{name}'")]
    InvalidBucketName { name: String },

    /// Entry names must be non-empty, contain no `/` and not be `.`/`..`.
    #[error("Invalid name '{name}'")]
    InvalidName { name: String },
}

/// Errors reported by [`crate::bucket::Bucket`].
#[derive(Debug, Error)]
pub enum BucketError {
    /// A file operation was given a directory path.
    #[error("A directory can't be retrieved, got '{path}'")]
    NotAFile { path: String },

    /// A directory operation was given a file path.
    #[error("Only a directory can be listed, got '{path}'")]
    NotADirectory { path: String },

    /// The bucket URL could not be turned into a bucket location.
    #[error("Invalid bucket location: {reason}")]
    InvalidLocation { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store answered with a non-success status.
    #[error("{method} '{key}' was rejected with status {status}")]
    Rejected {
        method: Method,
        key: String,
        status: u16,
    },

    /// No response was obtained from the store.
    #[error("{method} '{key}' failed: {source}")]
    Transport {
        method: Method,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A successful listing response whose body could not be read.
    #[error("Malformed listing response: {reason}")]
    MalformedListing { reason: String },
}

impl BucketError {
    /// Whether this error is a programming mistake rather than a runtime
    /// condition.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            BucketError::NotAFile { .. }
                | BucketError::NotADirectory { .. }
                | BucketError::InvalidLocation { .. }
                | BucketError::Validation(_)
        )
    }
}

/// Errors reported by [`crate::filesystem::Filesystem`].
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error(transparent)]
    Bucket(#[from] BucketError),

    /// A write the adapter could not perform; the synchronization stops
    /// rather than silently dropping content.
    #[error("Failed to upload '{path}'")]
    UploadFailed {
        path: String,
        #[source]
        source: BucketError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
