//! Best-effort "server is up" marker.
//!
//! The flag holds a human-readable timestamp while a server is active. Its
//! creation and removal are not transactional: a crashed server leaves a
//! stale flag behind, so readers that need ground truth must probe the
//! endpoints instead.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};

/// A raised liveness flag owned by a running server.
#[derive(Debug)]
pub struct LivenessFlag {
    path: PathBuf,
}

impl LivenessFlag {
    /// Write the flag file, creating parent directories as needed.
    pub fn raise(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let flag_err = |source| TransportError::Liveness {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(flag_err)?;
            }
        }
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        std::fs::write(&path, format!("running since {stamp}\n")).map_err(flag_err)?;
        debug!(?path, "liveness flag raised");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the flag file. A flag that is already gone is not an error.
    pub fn clear(self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = ?self.path, "liveness flag cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = ?self.path, "liveness flag already removed");
                Ok(())
            }
            Err(source) => Err(TransportError::Liveness {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Contents of the flag at `path`, if present and non-empty.
pub fn read_flag(path: impl AsRef<Path>) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let trimmed = contents.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Whether the flag at `path` signals a running server. Best effort only.
pub fn is_raised(path: impl AsRef<Path>) -> bool {
    read_flag(path).is_some()
}
