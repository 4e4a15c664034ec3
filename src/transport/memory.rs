//! In-process S3-compatible store.
//!
//! [`MemoryTransport`] answers the subset of the S3 REST API the bucket
//! speaks (object GET/PUT/DELETE and ListObjectsV2 with delimiter, prefix
//! and continuation tokens) for a single bucket, entirely in memory.
//!
//! Besides serving as an offline backend it keeps a log of every request,
//! can verify SigV4 signatures, and can be told to fail a given method so
//! callers' failure paths can be exercised.

use base64::Engine;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, ETAG};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use md5::{Digest, Md5};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, RwLock};
use subtle::ConstantTimeEq;

use super::Transport;
use crate::signer::{self, Credentials};
use crate::xml::{render_error, render_list_objects_result, ObjectEntry};

/// Default number of entries per listing page, as on AWS.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// A stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: String,
}

/// One request as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    /// Raw (still percent-encoded) request path.
    pub path: String,
    /// Raw query string, empty when absent.
    pub query: String,
}

/// In-memory single-bucket S3 store.
pub struct MemoryTransport {
    /// Name of the only bucket served.
    bucket: String,
    /// Objects by key, kept sorted for listings.
    objects: RwLock<BTreeMap<String, StoredObject>>,
    /// Entries per listing page when the request sets no `max-keys`.
    page_size: usize,
    /// When set, every request must carry a valid signature for these.
    credentials: Option<Credentials>,
    /// Status to answer with, per method, instead of serving.
    failures: Mutex<HashMap<Method, StatusCode>>,
    /// Every request received, in order.
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MemoryTransport {
    /// Create an empty store serving `bucket`.
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            credentials: None,
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Split listings into pages of at most `page_size` entries.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Reject requests that are not signed with `credentials`.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    // ── Failure injection ───────────────────────────────────────────

    /// Answer every `method` request with `status` until [`heal`] is called.
    ///
    /// [`heal`]: MemoryTransport::heal
    pub fn fail(&self, method: Method, status: StatusCode) {
        self.failures
            .lock()
            .expect("mutex poisoned")
            .insert(method, status);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        self.failures.lock().expect("mutex poisoned").clear();
    }

    // ── Request log ─────────────────────────────────────────────────

    /// All requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("mutex poisoned").clone()
    }

    /// Number of requests received with `method`.
    pub fn count(&self, method: &Method) -> usize {
        self.requests
            .lock()
            .expect("mutex poisoned")
            .iter()
            .filter(|r| &r.method == method)
            .count()
    }

    /// Number of PUT and DELETE requests received.
    pub fn writes(&self) -> usize {
        self.count(&Method::PUT) + self.count(&Method::DELETE)
    }

    pub fn clear_requests(&self) {
        self.requests.lock().expect("mutex poisoned").clear();
    }

    // ── Direct access ───────────────────────────────────────────────

    /// Store an object without going through HTTP.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let object = StoredObject {
            etag: compute_etag(&data),
            last_modified: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            data,
        };
        self.objects
            .write()
            .expect("rwlock poisoned")
            .insert(key.to_string(), object);
    }

    /// Content stored under `key`.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .expect("rwlock poisoned")
            .get(key)
            .map(|o| o.data.clone())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("rwlock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    // ── Request handling ────────────────────────────────────────────

    fn handle(&self, request: &Request<Bytes>) -> Response<Bytes> {
        let uri = request.uri();
        self.requests
            .lock()
            .expect("mutex poisoned")
            .push(RecordedRequest {
                method: request.method().clone(),
                path: uri.path().to_string(),
                query: uri.query().unwrap_or("").to_string(),
            });

        let injected = self
            .failures
            .lock()
            .expect("mutex poisoned")
            .get(request.method())
            .copied();
        if let Some(status) = injected {
            return error_response(status, "InternalError", "Injected failure", uri.path());
        }

        if let Some(credentials) = &self.credentials {
            if let Err(message) = verify_signature(request, credentials) {
                tracing::debug!("Signature rejected: {message}");
                return error_response(
                    StatusCode::FORBIDDEN,
                    "SignatureDoesNotMatch",
                    &message,
                    uri.path(),
                );
            }
        }

        let raw = uri.path().trim_start_matches('/');
        let (bucket, raw_key) = raw.split_once('/').unwrap_or((raw, ""));
        if decode(bucket) != self.bucket {
            return error_response(
                StatusCode::NOT_FOUND,
                "NoSuchBucket",
                "The specified bucket does not exist",
                uri.path(),
            );
        }

        let key = raw_key.split('/').map(decode).collect::<Vec<_>>().join("/");

        match (request.method(), key.is_empty()) {
            (&Method::GET, true) => self.list(uri.query().unwrap_or("")),
            (&Method::GET, false) => self.get_object(&key, uri.path()),
            (&Method::PUT, false) => self.put_object(&key, request.body().clone()),
            (&Method::DELETE, false) => self.delete_object(&key),
            _ => error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                "The specified method is not allowed against this resource.",
                uri.path(),
            ),
        }
    }

    fn get_object(&self, key: &str, resource: &str) -> Response<Bytes> {
        let objects = self.objects.read().expect("rwlock poisoned");
        match objects.get(key) {
            Some(object) => {
                let mut response = Response::new(object.data.clone());
                if let Ok(etag) = HeaderValue::from_str(&object.etag) {
                    response.headers_mut().insert(ETAG, etag);
                }
                response
            }
            None => error_response(
                StatusCode::NOT_FOUND,
                "NoSuchKey",
                "The specified key does not exist.",
                resource,
            ),
        }
    }

    fn put_object(&self, key: &str, data: Bytes) -> Response<Bytes> {
        self.insert(key, data);
        let etag = self
            .objects
            .read()
            .expect("rwlock poisoned")
            .get(key)
            .map(|o| o.etag.clone())
            .unwrap_or_default();

        let mut response = Response::new(Bytes::new());
        if let Ok(etag) = HeaderValue::from_str(&etag) {
            response.headers_mut().insert(ETAG, etag);
        }
        response
    }

    fn delete_object(&self, key: &str) -> Response<Bytes> {
        // S3 deletes are idempotent: missing keys still answer 204.
        self.objects.write().expect("rwlock poisoned").remove(key);
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    }

    /// ListObjectsV2.
    fn list(&self, query: &str) -> Response<Bytes> {
        let params = parse_query_string(query);
        if params.get("list-type").map(String::as_str) != Some("2") {
            return error_response(
                StatusCode::NOT_IMPLEMENTED,
                "NotImplemented",
                "Only ListObjectsV2 is supported",
                "/",
            );
        }

        let prefix = params.get("prefix").cloned().unwrap_or_default();
        let delimiter = params.get("delimiter").cloned().unwrap_or_default();
        let max_keys = params
            .get("max-keys")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(self.page_size)
            .min(self.page_size);
        let continuation_token = params.get("continuation-token").cloned();

        let start_after = match &continuation_token {
            Some(token) => match base64::engine::general_purpose::STANDARD
                .decode(token)
                .ok()
                .and_then(|raw| String::from_utf8(raw).ok())
            {
                Some(start) => Some(start),
                None => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        "InvalidArgument",
                        "The continuation token provided is incorrect",
                        "/",
                    )
                }
            },
            None => None,
        };

        let objects = self.objects.read().expect("rwlock poisoned");

        // Group keys under their common prefix first so that each prefix
        // is one entry, then page over the merged, sorted entries.
        let mut grouped: BTreeMap<String, Option<&StoredObject>> = BTreeMap::new();
        let mut prefixes: BTreeSet<String> = BTreeSet::new();
        for (key, object) in objects.iter().filter(|(k, _)| k.starts_with(&prefix)) {
            let rest = &key[prefix.len()..];
            match (delimiter.is_empty(), rest.find(&delimiter)) {
                (false, Some(pos)) => {
                    let common = format!("{prefix}{}", &rest[..pos + delimiter.len()]);
                    prefixes.insert(common.clone());
                    grouped.insert(common, None);
                }
                _ => {
                    grouped.insert(key.clone(), Some(object));
                }
            }
        }

        let mut remaining = grouped
            .into_iter()
            .filter(|(name, _)| start_after.as_ref().map_or(true, |s| name > s));
        let page: Vec<(String, Option<&StoredObject>)> =
            remaining.by_ref().take(max_keys).collect();
        let truncated = remaining.next().is_some();

        let next_token = if truncated {
            page.last()
                .map(|(name, _)| base64::engine::general_purpose::STANDARD.encode(name))
        } else {
            None
        };

        let entries: Vec<ObjectEntry<'_>> = page
            .iter()
            .filter_map(|(name, object)| {
                object.map(|o| ObjectEntry {
                    key: name,
                    last_modified: &o.last_modified,
                    etag: &o.etag,
                    size: o.data.len() as u64,
                })
            })
            .collect();
        let common_prefixes: Vec<&str> = page
            .iter()
            .filter(|(name, object)| object.is_none() && prefixes.contains(name))
            .map(|(name, _)| name.as_str())
            .collect();

        let xml = render_list_objects_result(
            &self.bucket,
            &prefix,
            &delimiter,
            max_keys,
            &entries,
            &common_prefixes,
            continuation_token.as_deref(),
            next_token.as_deref(),
        );
        xml_response(StatusCode::OK, xml)
    }
}

impl Transport for MemoryTransport {
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Response<Bytes>>> + Send + '_>> {
        Box::pin(async move { Ok(self.handle(&request)) })
    }
}

// ── Signature verification ──────────────────────────────────────────

/// What a client claims in its `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
struct Claim<'a> {
    access_key: &'a str,
    date_stamp: &'a str,
    region: &'a str,
    service: &'a str,
    signature: &'a str,
}

/// Split `AWS4-HMAC-SHA256 Credential=<key>/<date>/<region>/<service>/aws4_request,
/// SignedHeaders=...,Signature=<hex>` into its parts.
fn parse_claim(header: &str) -> Result<Claim<'_>, String> {
    let fields = header
        .trim()
        .strip_prefix(signer::ALGORITHM)
        .ok_or_else(|| format!("Authorization must use {}", signer::ALGORITHM))?;

    let field = |key: &str| {
        fields
            .split(',')
            .find_map(|part| part.trim().strip_prefix(key))
            .map(str::trim)
            .ok_or_else(|| format!("Authorization lacks {key}"))
    };
    let credential = field("Credential=")?;
    let signature = field("Signature=")?;
    if field("SignedHeaders=")? != signer::SIGNED_HEADERS {
        return Err("Unexpected signed headers".to_string());
    }

    match credential.split('/').collect::<Vec<_>>()[..] {
        [access_key, date_stamp, region, service, "aws4_request"] => Ok(Claim {
            access_key,
            date_stamp,
            region,
            service,
            signature,
        }),
        _ => Err("Malformed credential scope".to_string()),
    }
}

/// Recompute the request signature and compare it with the one provided.
fn verify_signature(request: &Request<Bytes>, credentials: &Credentials) -> Result<(), String> {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| format!("Missing {name} header"))
    };

    let claim = parse_claim(header("authorization")?)?;
    let amz_date = header("x-amz-date")?;
    let payload_hash = header("x-amz-content-sha256")?;

    if claim.access_key != credentials.access_key {
        return Err("Unknown access key".to_string());
    }
    if !amz_date.starts_with(claim.date_stamp) {
        return Err("Credential date does not match x-amz-date".to_string());
    }
    if payload_hash != signer::content_hash(request.body()) {
        return Err("Payload hash does not match body".to_string());
    }

    let uri = request.uri();
    let canonical_request = signer::build_canonical_request(
        request.method().as_str(),
        uri.path(),
        uri.query().unwrap_or(""),
        payload_hash,
        amz_date,
    );
    let scope = format!(
        "{}/{}/{}/aws4_request",
        claim.date_stamp, claim.region, claim.service
    );
    let string_to_sign = signer::build_string_to_sign(amz_date, &scope, &canonical_request);
    let signing_key = signer::derive_signing_key(
        &credentials.secret_key,
        claim.date_stamp,
        claim.region,
        claim.service,
    );
    let computed = signer::compute_signature(&signing_key, &string_to_sign);

    // Lengths are public; only the contents are compared in constant time.
    if computed.len() == claim.signature.len()
        && bool::from(computed.as_bytes().ct_eq(claim.signature.as_bytes()))
    {
        Ok(())
    } else {
        Err("Signature mismatch".to_string())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Quoted MD5-hex ETag.
fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}

fn decode(segment: &str) -> String {
    percent_encoding::percent_decode_str(segment)
        .decode_utf8_lossy()
        .into_owned()
}

/// Parse a raw query string into decoded name/value pairs.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(part), String::new()),
        })
        .collect()
}

fn xml_response(status: StatusCode, body: String) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
    response
}

fn error_response(status: StatusCode, code: &str, message: &str, resource: &str) -> Response<Bytes> {
    xml_response(status, render_error(code, message, resource))
}
