//! Local cache of enhanced schema artifacts
//!
//! The editor reads the artifacts straight from the cache directory, so a
//! write must never leave a truncated file behind: `FsCacheStore` writes to a
//! sibling temporary file and renames it over the old artifact.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity of one cached artifact (its file name inside the cache)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(filename: impl Into<String>) -> Self {
        Self(filename.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata returned by a successful `stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactStat {
    pub last_modified: DateTime<Utc>,
}

/// Storage for cached artifacts
///
/// `stat` reports a missing artifact as `Ok(None)`; any other failure is an
/// `Err`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn stat(&self, artifact: &ArtifactId) -> io::Result<Option<ArtifactStat>>;

    async fn read_all(&self, artifact: &ArtifactId) -> io::Result<Vec<u8>>;

    async fn write_all(&self, artifact: &ArtifactId, bytes: &[u8]) -> io::Result<()>;
}

/// Cache store backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of an artifact inside the cache directory
    pub fn path_of(&self, artifact: &ArtifactId) -> PathBuf {
        self.root.join(artifact.as_str())
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn stat(&self, artifact: &ArtifactId) -> io::Result<Option<ArtifactStat>> {
        match tokio::fs::metadata(self.path_of(artifact)).await {
            Ok(meta) => {
                let modified = meta.modified()?;
                Ok(Some(ArtifactStat {
                    last_modified: DateTime::<Utc>::from(modified),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_all(&self, artifact: &ArtifactId) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_of(artifact)).await
    }

    async fn write_all(&self, artifact: &ArtifactId, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        let target = self.path_of(artifact);
        let staging = self.root.join(format!(".{}.tmp", artifact.as_str()));
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Serialize an enhanced schema the way it is persisted: 2-space indented UTF-8 JSON
pub fn serialize_artifact<T: Serialize>(schema: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stat_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = FsCacheStore::new(dir.path());
        let stat = store.stat(&ArtifactId::new("serve.schema.json")).await.unwrap();
        assert!(stat.is_none());
        assert_eq!(store.root(), dir.path());
        assert_eq!(
            store.path_of(&ArtifactId::new("serve.schema.json")),
            dir.path().join("serve.schema.json")
        );
    }

    #[tokio::test]
    async fn test_write_then_stat_and_read() {
        let dir = TempDir::new().unwrap();
        let store = FsCacheStore::new(dir.path().join("nested"));
        let artifact = ArtifactId::new("sitescript.schema.json");

        let before = Utc::now() - chrono::Duration::seconds(5);
        store.write_all(&artifact, b"{}").await.unwrap();

        let stat = store.stat(&artifact).await.unwrap().expect("artifact written");
        assert!(stat.last_modified >= before);
        assert_eq!(store.read_all(&artifact).await.unwrap(), b"{}");
        assert!(!dir.path().join("nested/.sitescript.schema.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let store = FsCacheStore::new(dir.path());
        let artifact = ArtifactId::new("serve.schema.json");

        store.write_all(&artifact, b"old content").await.unwrap();
        store.write_all(&artifact, b"new").await.unwrap();
        assert_eq!(store.read_all(&artifact).await.unwrap(), b"new");
    }

    #[test]
    fn test_serialize_uses_two_space_indent() {
        let bytes = serialize_artifact(&json!({"a": {"b": 1}})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": 1\n  }\n}");
    }
}
