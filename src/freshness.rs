//! Freshness of cached artifacts
//!
//! Freshness is never stored. It is derived on every check from the artifact's
//! last-modified time, the current time and a fixed staleness threshold.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{ArtifactId, CacheStore};

/// An artifact older than one week is out of date
pub const STALE_AFTER_MS: i64 = 604_800_000;

/// Freshness of one cached artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FreshnessStatus {
    /// The artifact's metadata could not be read
    Unknown,
    Current,
    OutOfDate,
    Missing,
}

impl FreshnessStatus {
    /// Whether a non-forced refresh should run
    pub fn needs_refresh(self) -> bool {
        self != FreshnessStatus::Current
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FreshnessStatus::Unknown => "unknown",
            FreshnessStatus::Current => "current",
            FreshnessStatus::OutOfDate => "outOfDate",
            FreshnessStatus::Missing => "missing",
        }
    }
}

impl fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an existing artifact by age. Exactly `STALE_AFTER_MS` old is still current.
pub fn classify_age(now: DateTime<Utc>, last_modified: DateTime<Utc>) -> FreshnessStatus {
    let age_ms = (now - last_modified).num_milliseconds();
    if age_ms > STALE_AFTER_MS {
        FreshnessStatus::OutOfDate
    } else {
        FreshnessStatus::Current
    }
}

/// Check the freshness of an artifact in the cache store
pub async fn check_status(
    store: &dyn CacheStore,
    artifact: &ArtifactId,
    now: DateTime<Utc>,
) -> FreshnessStatus {
    match store.stat(artifact).await {
        Ok(Some(stat)) => {
            let status = classify_age(now, stat.last_modified);
            debug!(%artifact, last_modified = %stat.last_modified, %status, "artifact stat");
            status
        }
        Ok(None) => FreshnessStatus::Missing,
        Err(e) => {
            warn!(%artifact, error = %e, "could not read artifact metadata");
            FreshnessStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactStat;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::io;

    fn modified_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_current_within_threshold() {
        let t = modified_at();
        assert_eq!(classify_age(t, t), FreshnessStatus::Current);
        assert_eq!(classify_age(t + Duration::days(3), t), FreshnessStatus::Current);
        assert_eq!(
            classify_age(t + Duration::milliseconds(STALE_AFTER_MS - 1), t),
            FreshnessStatus::Current
        );
    }

    #[test]
    fn test_boundary_is_current() {
        let t = modified_at();
        assert_eq!(
            classify_age(t + Duration::milliseconds(STALE_AFTER_MS), t),
            FreshnessStatus::Current
        );
        assert_eq!(
            classify_age(t + Duration::milliseconds(STALE_AFTER_MS + 1), t),
            FreshnessStatus::OutOfDate
        );
    }

    #[test]
    fn test_future_mtime_is_current() {
        let t = modified_at();
        assert_eq!(classify_age(t - Duration::hours(1), t), FreshnessStatus::Current);
    }

    #[test]
    fn test_only_current_skips_refresh() {
        assert!(!FreshnessStatus::Current.needs_refresh());
        assert!(FreshnessStatus::OutOfDate.needs_refresh());
        assert!(FreshnessStatus::Missing.needs_refresh());
        assert!(FreshnessStatus::Unknown.needs_refresh());
    }

    enum StatResult {
        Found(DateTime<Utc>),
        NotFound,
        Denied,
    }

    struct StubStore(StatResult);

    #[async_trait]
    impl CacheStore for StubStore {
        async fn stat(&self, _artifact: &ArtifactId) -> io::Result<Option<ArtifactStat>> {
            match self.0 {
                StatResult::Found(last_modified) => Ok(Some(ArtifactStat { last_modified })),
                StatResult::NotFound => Ok(None),
                StatResult::Denied => Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            }
        }

        async fn read_all(&self, _artifact: &ArtifactId) -> io::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn write_all(&self, _artifact: &ArtifactId, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_check_status_variants() {
        let artifact = ArtifactId::new("sitescript.schema.json");
        let t = modified_at();

        let found = StubStore(StatResult::Found(t));
        assert_eq!(check_status(&found, &artifact, t + Duration::days(1)).await, FreshnessStatus::Current);
        assert_eq!(check_status(&found, &artifact, t + Duration::days(8)).await, FreshnessStatus::OutOfDate);

        let missing = StubStore(StatResult::NotFound);
        assert_eq!(check_status(&missing, &artifact, t).await, FreshnessStatus::Missing);

        let denied = StubStore(StatResult::Denied);
        assert_eq!(check_status(&denied, &artifact, t).await, FreshnessStatus::Unknown);
    }
}
