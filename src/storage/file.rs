use crate::error::DaoError;
use crate::runtime::ChainSnapshot;
use crate::storage_traits::{decode_snapshot, encode_snapshot, ChainStore};
use anyhow::Context;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Stores the snapshot frame in a single file.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileChainStore {
    path: PathBuf,
}

impl FileChainStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

impl ChainStore for FileChainStore {
    fn save(&self, snapshot: &ChainSnapshot) -> Result<(), DaoError> {
        let frame = encode_snapshot(snapshot)?;
        let temp = self.temp_path();

        fs::write(&temp, &frame)
            .with_context(|| format!("Failed to write snapshot to {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to move snapshot into {}", self.path.display()))?;

        debug!("Wrote {} byte snapshot to {}", frame.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<ChainSnapshot>, DaoError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let frame = fs::read(&self.path)
            .with_context(|| format!("Failed to read snapshot from {}", self.path.display()))?;
        decode_snapshot(&frame).map(Some)
    }
}
