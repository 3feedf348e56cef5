//! Dry-run artifact: statements appended to a local file instead of being
//! applied to a device.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::DryRunConfig;
use crate::error::{ReconcileError, ReconcileResult};

/// Append-only statement file.
#[derive(Debug)]
pub struct DryRunArtifact {
    path: PathBuf,
    mode: u32,
    write_lock: Mutex<()>,
}

impl DryRunArtifact {
    /// Creates the writer; the file itself is created on first append.
    pub fn new(config: &DryRunConfig) -> ReconcileResult<Self> {
        Ok(Self {
            path: config.path.clone(),
            mode: config.mode()?,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the artifact path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `lines` as one contiguous block, one statement per line.
    #[instrument(skip(self, lines), fields(path = %self.path.display(), statements = lines.len()))]
    pub async fn append(&self, lines: &[String]) -> ReconcileResult<()> {
        let mut block = String::new();
        for line in lines {
            block.push_str(line);
            block.push('\n');
        }

        let _write = self.write_lock.lock().await;

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(self.mode);

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| ReconcileError::io(&self.path, e))?;
        file.write_all(block.as_bytes())
            .await
            .map_err(|e| ReconcileError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| ReconcileError::io(&self.path, e))?;

        debug!("Appended statements to dry-run artifact");
        Ok(())
    }
}
