//! Bucket-relative paths.
//!
//! A [`Path`] is an ordered list of segments plus a directory flag.  The
//! textual form follows the usual convention: segments joined by `/`, with a
//! trailing `/` when the path denotes a directory.  [`Path::none`] is the
//! bucket root and is itself a directory.

use std::fmt;
use std::str::FromStr;

/// Segment separator in keys and textual paths.
pub const SEPARATOR: char = '/';

/// A relative path inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
    directory: bool,
}

impl Path {
    /// The bucket root.
    pub fn none() -> Self {
        Self {
            segments: Vec::new(),
            directory: true,
        }
    }

    /// Parse a textual path.  Empty segments are dropped, so `a//b` and
    /// `/a/b` both denote `a/b`.  An empty string is the root.
    pub fn parse(raw: &str) -> Self {
        let segments: Vec<String> = raw
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let directory = segments.is_empty() || raw.ends_with(SEPARATOR);

        Self {
            segments,
            directory,
        }
    }

    /// A file path made of the given segments.
    pub fn file<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            directory: false,
        }
    }

    /// A directory path made of the given segments.
    pub fn directory<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            directory: true,
        }
    }

    /// Whether this is the bucket root.
    pub fn is_none(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_directory(&self) -> bool {
        self.directory
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The same segments with the directory flag forced on.
    pub fn as_directory(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            directory: true,
        }
    }

    /// Resolve `relative` against this path.
    ///
    /// A directory base keeps all its segments; a file base is replaced by
    /// its parent first, matching URL reference resolution.  The result
    /// takes its directory flag from `relative`, except that resolving the
    /// root against a base yields the base directory itself.
    pub fn resolve(&self, relative: &Path) -> Self {
        let mut segments = self.segments.clone();
        if !self.directory {
            segments.pop();
        }
        if relative.is_none() {
            return Self {
                segments,
                directory: true,
            };
        }
        segments.extend(relative.segments.iter().cloned());

        Self {
            segments,
            directory: relative.directory,
        }
    }

    /// The key form: segments joined by `/`, trailing `/` for non-root
    /// directories, never a leading separator.
    pub fn to_key(&self) -> String {
        let mut key = self.segments.join("/");
        if self.directory && !self.segments.is_empty() {
            key.push(SEPARATOR);
        }
        key
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
