//! Offline content bundle download.
//!
//! When the wearer switches to standalone operation the device pulls a zip
//! bundle of task content from the server's FTP gateway and unpacks it over
//! the local content directory. The bundle replaces the directory
//! wholesale; stale read-only files from a previous unpack are made
//! writable before removal.

use std::path::Path;

use reqwest::StatusCode;
use tracing::{info, warn};

use super::client::{SessionClient, SessionError};

/// Outcome of the availability check against the FTP gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandaloneAvailability {
    /// A bundle is staged and ready to download.
    Available,
    /// The gateway is up but no bundle is staged for this device.
    NotAvailable,
    /// The gateway answered with anything else, or not at all.
    Error,
}

impl SessionClient {
    /// Asks the FTP gateway whether a content bundle is staged.
    pub async fn check_standalone(&self) -> StandaloneAvailability {
        match self.get_raw("FTP/service/check").await {
            Ok(response) => match response.status() {
                StatusCode::OK => StandaloneAvailability::Available,
                StatusCode::NOT_FOUND => StandaloneAvailability::NotAvailable,
                status => {
                    warn!(%status, "unexpected answer from content gateway");
                    StandaloneAvailability::Error
                }
            },
            Err(error) => {
                warn!(%error, "content gateway unreachable");
                StandaloneAvailability::Error
            }
        }
    }

    /// Downloads the content bundle and unpacks it into `content_dir`,
    /// replacing whatever was there.
    pub async fn download_standalone(&self, content_dir: &Path) -> Result<(), SessionError> {
        let response = self.get_raw("FTP/service").await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "FTP/service".into()));
        }
        let bytes = response.bytes().await?;
        info!(bytes = bytes.len(), "content bundle downloaded");

        let content_dir = content_dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_bundle(&bytes, &content_dir))
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?
    }
}

fn unpack_bundle(bytes: &[u8], content_dir: &Path) -> Result<(), SessionError> {
    if content_dir.exists() {
        clear_readonly(content_dir)?;
        std::fs::remove_dir_all(content_dir)?;
    }
    std::fs::create_dir_all(content_dir)?;

    let reader = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| SessionError::Malformed(e.to_string()))?;
    archive
        .extract(content_dir)
        .map_err(|e| SessionError::Malformed(e.to_string()))?;
    info!(files = archive.len(), path = %content_dir.display(), "content bundle unpacked");
    Ok(())
}

/// Strips the read-only bit from everything under `path` so the tree can be
/// removed. Bundles mark their files read-only on unpack.
fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let metadata = std::fs::metadata(path)?;
    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        std::fs::set_permissions(path, permissions)?;
    }
    if metadata.is_dir() {
        for entry in std::fs::read_dir(path)? {
            clear_readonly(&entry?.path())?;
        }
    }
    Ok(())
}
