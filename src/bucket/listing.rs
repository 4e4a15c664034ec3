//! Lazy, paginated directory listing.
//!
//! A [`Listing`] drives ListObjectsV2 requests one page at a time, following
//! `NextContinuationToken` until the store stops returning one.  Nothing is
//! sent before the stream is first polled, and a partially consumed listing
//! never requests the pages it did not reach.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use super::Bucket;
use crate::errors::BucketError;
use crate::path::Path;

/// Entries of one directory, relative to it.
pub type Listing = BoxStream<'static, Result<Path, BucketError>>;

/// Pagination cursor.
enum Cursor {
    First,
    Next(String),
    Done,
}

/// Fetch the page `cursor` points at.  `Ok(None)` once pagination is over
/// or the store refused the page.
async fn next_page(
    bucket: Bucket,
    prefix: String,
    cursor: Cursor,
) -> Result<Option<(Vec<String>, Cursor)>, BucketError> {
    let token = match cursor {
        Cursor::First => None,
        Cursor::Next(token) => Some(token),
        Cursor::Done => return Ok(None),
    };

    let Some(page) = bucket.list_page(&prefix, token.as_deref()).await? else {
        return Ok(None);
    };

    let next = match page.next_continuation_token {
        Some(token) => Cursor::Next(token),
        None => Cursor::Done,
    };
    let found = page
        .keys
        .into_iter()
        .chain(page.common_prefixes)
        .collect();
    Ok(Some((found, next)))
}

/// Every raw key and common prefix under `prefix`, page by page.
fn enumerate(bucket: Bucket, prefix: String) -> BoxStream<'static, Result<String, BucketError>> {
    stream::try_unfold(Cursor::First, move |cursor| {
        next_page(bucket.clone(), prefix.clone(), cursor)
    })
    .map_ok(|found| stream::iter(found.into_iter().map(Ok::<_, BucketError>)))
    .try_flatten()
    .boxed()
}

/// List the directory whose key prefix is `prefix` (empty for the bucket
/// root).  Entries that do not name a child once the prefix is stripped are
/// skipped: the placeholder key of the directory itself, and keys with an
/// empty segment such as `d//x`, which no [`Path`] can address.
pub(crate) fn paginate(bucket: Bucket, prefix: String) -> Listing {
    let strip = prefix.clone();

    enumerate(bucket, prefix)
        .try_filter_map(move |found| {
            let relative = found.strip_prefix(strip.as_str()).unwrap_or(&found);
            futures::future::ready(Ok(child_entry(relative)))
        })
        .boxed()
}

/// `relative` as a child path, if every segment of it is non-empty.
fn child_entry(relative: &str) -> Option<Path> {
    let name = relative.strip_suffix('/').unwrap_or(relative);
    if name.is_empty() || name.split('/').any(str::is_empty) {
        return None;
    }
    Some(Path::parse(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_entry_skips_empty_segments() {
        assert_eq!(child_entry("a.txt"), Some(Path::file(["a.txt"])));
        assert_eq!(child_entry("sub/"), Some(Path::directory(["sub"])));
        for skipped in ["", "/", "//", "/x", "a//", "a//b"] {
            assert_eq!(child_entry(skipped), None, "kept {skipped:?}");
        }
    }
}
