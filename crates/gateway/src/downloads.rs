//! Short-lived answer files for replies too long to push inline.
//!
//! Each saved answer gets a random id and a timer that deletes it once the
//! link expires. Ids are parsed as UUIDs before touching the filesystem, so
//! a request can only ever name a file this store wrote.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct DownloadStore {
    dir: PathBuf,
    ttl: Duration,
    base_url: Option<String>,
}

impl DownloadStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, base_url: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.txt"))
    }

    /// Write `text` to a new file and schedule its deletion. Returns the id.
    pub async fn save(&self, text: &str) -> io::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = Uuid::new_v4();
        let path = self.path_for(&id);
        tokio::fs::write(&path, text).await?;
        info!(id = %id, bytes = text.len(), ttl_secs = self.ttl.as_secs(), "Saved download");

        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            remove_expired(&path).await;
        });

        Ok(id.to_string())
    }

    /// Public link for a saved file. Without a configured base URL this is a
    /// server-relative path.
    pub fn link(&self, id: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/download/{id}"),
            None => format!("/download/{id}"),
        }
    }

    /// Contents of a saved file, or `None` when the id is unknown, malformed
    /// or already expired.
    pub async fn load(&self, id: &str) -> Option<String> {
        let id = Uuid::parse_str(id).ok()?;
        tokio::fs::read_to_string(self.path_for(&id)).await.ok()
    }
}

async fn remove_expired(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Expired download removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove expired download"),
    }
}
