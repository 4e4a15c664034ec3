//! S3 XML payloads.
//!
//! Bucket listings come back as `<ListBucketResult>` documents.  This module
//! parses them into [`ListPage`]s and, for the in-process emulator, renders
//! them (plus `<Error>` documents) using `quick-xml`.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

// ── Parsing ─────────────────────────────────────────────────────────

/// One page of a ListObjectsV2 response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// `<Contents><Key>` values, in document order.
    pub keys: Vec<String>,
    /// `<CommonPrefixes><Prefix>` values, in document order.
    pub common_prefixes: Vec<String>,
    /// `<NextContinuationToken>`, present when another page follows.
    pub next_continuation_token: Option<String>,
}

/// Parse a `<ListBucketResult>` document.
///
/// Only direct children of the root element are considered, so the
/// top-level `<Prefix>` echo is never mistaken for a common prefix.
pub fn parse_list_objects_result(body: &[u8]) -> Result<ListPage, String> {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut page = ListPage::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                stack.push(local_name(e.name().as_ref()));
                saw_root = true;
                text.clear();
            }
            Ok(Event::Empty(ref e)) => {
                let tag = local_name(e.name().as_ref());
                saw_root = true;
                collect(&mut page, &stack, &tag, String::new());
            }
            Ok(Event::Text(ref e)) => {
                let value = e.unescape().map_err(|e| e.to_string())?;
                text.push_str(&value);
            }
            Ok(Event::CData(ref e)) => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(_)) => {
                let tag = stack.pop().unwrap_or_default();
                collect(&mut page, &stack, &tag, std::mem::take(&mut text));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("Listing response has no root element".to_string());
    }

    Ok(page)
}

/// Route a closed element's text into the page.  `parents` is the stack of
/// still-open elements, root first.
fn collect(page: &mut ListPage, parents: &[String], tag: &str, value: String) {
    match (parents.len(), parents.last().map(String::as_str), tag) {
        (2, Some("Contents"), "Key") => page.keys.push(value),
        (2, Some("CommonPrefixes"), "Prefix") => page.common_prefixes.push(value),
        (1, _, "NextContinuationToken") if !value.is_empty() => {
            page.next_continuation_token = Some(value);
        }
        _ => {}
    }
}

/// Strip a namespace prefix (`s3:Key` -> `Key`).
fn local_name(raw: &[u8]) -> String {
    let tag = String::from_utf8_lossy(raw);
    tag.rsplit(':').next().unwrap_or(&tag).to_string()
}

/// Extract `<Code>` from an `<Error>` document, if any.
pub fn parse_error_code(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_code = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => in_code = local_name(e.name().as_ref()) == "Code",
            Ok(Event::Text(ref e)) if in_code => {
                return e.unescape().ok().map(|c| c.into_owned());
            }
            Ok(Event::End(_)) => in_code = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

// ── Error response ──────────────────────────────────────────────────

/// Render an S3 `<Error>` XML document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchKey</Code>
///   <Message>The specified key does not exist.</Message>
///   <Resource>/mybucket/a.txt</Resource>
/// </Error>
/// ```
pub fn render_error(code: &str, message: &str, resource: &str) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_declaration(&mut writer);

    write_simple_element_group(
        &mut writer,
        "Error",
        &[("Code", code), ("Message", message), ("Resource", resource)],
    );

    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}

// ── ListBucketResult (v2) ───────────────────────────────────────────

/// Represents a single object entry inside a list-objects response.
pub struct ObjectEntry<'a> {
    pub key: &'a str,
    pub last_modified: &'a str,
    pub etag: &'a str,
    pub size: u64,
}

/// Render `<ListBucketResult>` for ListObjectsV2.
#[allow(clippy::too_many_arguments)]
pub fn render_list_objects_result(
    bucket: &str,
    prefix: &str,
    delimiter: &str,
    max_keys: usize,
    entries: &[ObjectEntry<'_>],
    common_prefixes: &[&str],
    continuation_token: Option<&str>,
    next_continuation_token: Option<&str>,
) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_declaration(&mut writer);

    let root = BytesStart::new("ListBucketResult")
        .with_attributes([("xmlns", "http://s3.amazonaws.com/doc/2006-03-01/")]);
    writer.write_event(Event::Start(root)).expect("start root");

    write_text_element(&mut writer, "Name", bucket);
    write_text_element(&mut writer, "Prefix", prefix);
    if !delimiter.is_empty() {
        write_text_element(&mut writer, "Delimiter", delimiter);
    }
    write_text_element(&mut writer, "MaxKeys", &max_keys.to_string());
    write_text_element(
        &mut writer,
        "KeyCount",
        &(entries.len() + common_prefixes.len()).to_string(),
    );
    write_text_element(
        &mut writer,
        "IsTruncated",
        if next_continuation_token.is_some() {
            "true"
        } else {
            "false"
        },
    );

    if let Some(token) = continuation_token {
        write_text_element(&mut writer, "ContinuationToken", token);
    }
    if let Some(token) = next_continuation_token {
        write_text_element(&mut writer, "NextContinuationToken", token);
    }

    for entry in entries {
        writer
            .write_event(Event::Start(BytesStart::new("Contents")))
            .expect("start Contents");
        write_text_element(&mut writer, "Key", entry.key);
        write_text_element(&mut writer, "LastModified", entry.last_modified);
        write_text_element(&mut writer, "ETag", entry.etag);
        write_text_element(&mut writer, "Size", &entry.size.to_string());
        write_text_element(&mut writer, "StorageClass", "STANDARD");
        writer
            .write_event(Event::End(BytesEnd::new("Contents")))
            .expect("end Contents");
    }

    for cp in common_prefixes {
        write_simple_element_group(&mut writer, "CommonPrefixes", &[("Prefix", cp)]);
    }

    writer
        .write_event(Event::End(BytesEnd::new("ListBucketResult")))
        .expect("end root");

    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}

// ── Helpers ─────────────────────────────────────────────────────────

fn write_declaration(writer: &mut Writer<Cursor<Vec<u8>>>) {
    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            None,
        )))
        .expect("xml decl");
}

/// Write a `<tag>text</tag>` element.
fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .expect("start tag");
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .expect("text");
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .expect("end tag");
}

/// Write a parent element containing a flat list of child text elements.
fn write_simple_element_group(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    parent: &str,
    children: &[(&str, &str)],
) {
    writer
        .write_event(Event::Start(BytesStart::new(parent)))
        .expect("start parent");
    for (tag, value) in children {
        write_text_element(writer, tag, value);
    }
    writer
        .write_event(Event::End(BytesEnd::new(parent)))
        .expect("end parent");
}
