//! Schema fetching
//!
//! Retrieves a schema document over HTTP(S) or from the local filesystem and
//! resolves its external `$ref` pointers by inlining the referenced content.
//! Local pointers (`#/...`) in the root document are left alone: the
//! enhancers look definitions up through them, and the persisted artifact
//! resolves them against its own `definitions` table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::schema::SchemaObject;

/// Referenced documents pulled in for one fetch, beyond the root
const MAX_EXTERNAL_DOCUMENTS: usize = 32;

/// Nesting limit while inlining references
const MAX_INLINE_DEPTH: usize = 32;

/// Retrieves and dereferences a schema document
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<SchemaObject, FetchError>;
}

/// Fetcher for `http(s)://` URLs, `file://` URLs and plain paths
#[derive(Debug, Clone)]
pub struct HttpSchemaFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpSchemaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn load(&self, location: &Location) -> Result<Value, FetchError> {
        let key = location.key();
        let text = match location {
            Location::Remote(url) => {
                let response = self.client.get(url.clone()).send().await.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout { url: key.clone() }
                    } else {
                        FetchError::Http(e)
                    }
                })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status { url: key, status: status.as_u16() });
                }
                response.text().await?
            }
            Location::Local(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FetchError::Io { path: key.clone(), source })?,
        };
        serde_json::from_str(&text).map_err(|source| FetchError::Parse { url: key, source })
    }

    async fn fetch_bundled(&self, url: &str) -> Result<Value, FetchError> {
        let root_location = Location::parse(url)?;
        let mut root = self.load(&root_location).await?;
        info!(url, "schema downloaded");

        let mut documents: HashMap<String, Value> = HashMap::new();
        let mut seen = HashSet::from([root_location.key()]);
        let mut queue: VecDeque<Location> = VecDeque::new();
        enqueue_external(&root, &root_location, &mut seen, &mut queue)?;

        while let Some(location) = queue.pop_front() {
            if documents.len() >= MAX_EXTERNAL_DOCUMENTS {
                return Err(FetchError::RefDepthExceeded { reference: location.key() });
            }
            let document = self.load(&location).await?;
            debug!(document = %location.key(), "external reference loaded");
            enqueue_external(&document, &location, &mut seen, &mut queue)?;
            documents.insert(location.key(), document);
        }

        if !documents.is_empty() {
            inline_external(&mut root, &root_location, &documents, 0)?;
            info!(documents = documents.len(), "external references inlined");
        }
        Ok(root)
    }
}

#[async_trait]
impl SchemaFetcher for HttpSchemaFetcher {
    async fn fetch(&self, url: &str) -> Result<SchemaObject, FetchError> {
        let value = tokio::time::timeout(self.timeout, self.fetch_bundled(url))
            .await
            .map_err(|_| FetchError::Timeout { url: url.to_string() })??;
        SchemaObject::from_value(value).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }
}

/// Where a document lives
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    fn parse(raw: &str) -> Result<Self, FetchError> {
        let invalid = |reason: &str| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };
        match Url::parse(raw) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Location::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(Location::Local)
                    .map_err(|_| invalid("not a local file path")),
                // drive letters such as C:\schemas\serve.json
                scheme if scheme.len() == 1 => Ok(Location::Local(PathBuf::from(raw))),
                _ => Err(invalid("unsupported scheme")),
            },
            Err(_) if !raw.trim().is_empty() => Ok(Location::Local(PathBuf::from(raw))),
            Err(e) => Err(invalid(&e.to_string())),
        }
    }

    /// Resolve a reference (without fragment) relative to this document
    fn join(&self, reference: &str) -> Result<Location, FetchError> {
        match self {
            Location::Remote(base) => base
                .join(reference)
                .map_err(|e| FetchError::InvalidUrl {
                    url: reference.to_string(),
                    reason: e.to_string(),
                })
                .and_then(|url| Location::parse(url.as_str())),
            Location::Local(path) => {
                if Url::parse(reference).is_ok_and(|u| u.scheme().len() > 1) {
                    return Location::parse(reference);
                }
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                Ok(Location::Local(dir.join(reference)))
            }
        }
    }

    fn key(&self) -> String {
        match self {
            Location::Remote(url) => {
                let mut url = url.clone();
                url.set_fragment(None);
                url.to_string()
            }
            Location::Local(path) => path.display().to_string(),
        }
    }
}

/// Split `doc.json#/definitions/x` into `("doc.json", "/definitions/x")`
fn split_reference(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((document, fragment)) => (document, fragment),
        None => (reference, ""),
    }
}

fn external_reference(value: &Value) -> Option<&str> {
    value
        .as_object()?
        .get("$ref")?
        .as_str()
        .filter(|r| !r.starts_with('#'))
}

fn enqueue_external(
    document: &Value,
    base: &Location,
    seen: &mut HashSet<String>,
    queue: &mut VecDeque<Location>,
) -> Result<(), FetchError> {
    let mut pending = vec![document];
    while let Some(value) = pending.pop() {
        if let Some(reference) = external_reference(value) {
            let (target, _) = split_reference(reference);
            let location = base.join(target)?;
            if seen.insert(location.key()) {
                queue.push_back(location);
            }
        }
        match value {
            Value::Object(map) => pending.extend(map.values()),
            Value::Array(items) => pending.extend(items.iter()),
            _ => {}
        }
    }
    Ok(())
}

/// Replace every external reference under `value` with the content it points to.
///
/// Content taken from another document has its own local pointers resolved
/// against that document, since they mean nothing inside the root.
fn inline_external(
    value: &mut Value,
    base: &Location,
    documents: &HashMap<String, Value>,
    depth: usize,
) -> Result<(), FetchError> {
    if let Some(reference) = external_reference(value).map(str::to_string) {
        let (target, fragment) = split_reference(&reference);
        let location = base.join(target)?;
        *value = resolve_in(&location, fragment, &reference, documents, depth)?;
        return Ok(());
    }
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                inline_external(child, base, documents, depth)?;
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                inline_external(child, base, documents, depth)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn resolve_in(
    location: &Location,
    fragment: &str,
    reference: &str,
    documents: &HashMap<String, Value>,
    depth: usize,
) -> Result<Value, FetchError> {
    if depth >= MAX_INLINE_DEPTH {
        return Err(FetchError::RefDepthExceeded { reference: reference.to_string() });
    }
    let unresolved = || FetchError::UnresolvedExternalRef { reference: reference.to_string() };
    let document = documents.get(&location.key()).ok_or_else(unresolved)?;
    let mut content = document.pointer(fragment).cloned().ok_or_else(unresolved)?;
    inline_foreign(&mut content, location, document, documents, depth + 1)?;
    Ok(content)
}

/// Inline all pointers (local and external) inside content copied out of `document`
fn inline_foreign(
    value: &mut Value,
    location: &Location,
    document: &Value,
    documents: &HashMap<String, Value>,
    depth: usize,
) -> Result<(), FetchError> {
    let reference = value
        .as_object()
        .and_then(|map| map.get("$ref"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(reference) = reference {
        if depth >= MAX_INLINE_DEPTH {
            return Err(FetchError::RefDepthExceeded { reference });
        }
        if let Some(fragment) = reference.strip_prefix('#') {
            let mut content = document
                .pointer(fragment)
                .cloned()
                .ok_or_else(|| FetchError::UnresolvedExternalRef { reference: reference.clone() })?;
            inline_foreign(&mut content, location, document, documents, depth + 1)?;
            *value = content;
        } else {
            let (target, fragment) = split_reference(&reference);
            let target_location = location.join(target)?;
            *value = resolve_in(&target_location, fragment, &reference, documents, depth)?;
        }
        return Ok(());
    }

    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                inline_foreign(child, location, document, documents, depth)?;
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                inline_foreign(child, location, document, documents, depth)?;
            }
        }
        _ => {}
    }
    Ok(())
}
