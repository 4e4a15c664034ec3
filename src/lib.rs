//! bucketfs -- an S3-compatible bucket seen as a filesystem.
//!
//! The crate speaks the S3 REST protocol directly: requests are signed with
//! AWS Signature Version 4 ([`signer`]) and listings are paginated and
//! parsed from XML ([`bucket`], [`xml`]).  On top of a [`bucket::Bucket`],
//! [`filesystem::Filesystem`] synchronizes in-memory trees of files and
//! directories with the bucket's flat key space.
//!
//! Network access goes through the [`transport::Transport`] trait, with a
//! `reqwest` implementation and an in-process S3 emulator.

pub mod bucket;
pub mod clock;
pub mod config;
pub mod errors;
pub mod filesystem;
pub mod metrics;
pub mod path;
pub mod region;
pub mod signer;
pub mod transport;
pub mod xml;

pub use bucket::Bucket;
pub use errors::{BucketError, FilesystemError, ValidationError};
pub use filesystem::Filesystem;
pub use path::Path;
pub use region::{BucketName, Region};
