//! Settings-file change notifications
//!
//! Editors usually save by writing a new file and renaming it over the old
//! one, so the watcher observes the parent directory and filters on the file
//! name rather than watching the file itself.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, warn};

use crate::error::Result;

/// Bursts of events closer together than this count as one change
const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Reports changes to one settings file
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    events: UnboundedReceiver<()>,
    path: PathBuf,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());

        let (tx, events) = unbounded_channel();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let relevant = event.kind.is_modify() || event.kind.is_create();
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if relevant && ours {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "settings watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), "watching settings file");

        Ok(Self {
            _watcher: watcher,
            events,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next change. Returns `None` once the watcher has shut down.
    pub async fn changed(&mut self) -> Option<()> {
        self.events.recv().await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        while self.events.try_recv().is_ok() {}
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reports_settings_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema-enhancer.toml");
        std::fs::write(&path, "fetch_timeout_secs = 30\n").unwrap();

        let mut watcher = ConfigWatcher::new(&path).unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), "x").unwrap();
        std::fs::write(&path, "fetch_timeout_secs = 10\n").unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(10), watcher.changed()).await;
        assert!(matches!(changed, Ok(Some(()))));
    }
}
