use std::{fs, path::PathBuf, sync::Arc};

use chrono::Utc;
use tracing::info;

use super::EncodingProfile;
use crate::Result;

/// Finalized recording: the concatenated chunks of one session.
#[derive(Debug, Clone)]
pub struct RecordingBlob {
    bytes: Arc<[u8]>,
    profile: EncodingProfile,
    chunk_count: usize,
}

impl RecordingBlob {
    pub(crate) fn new(bytes: Vec<u8>, profile: EncodingProfile, chunk_count: usize) -> Self {
        Self {
            bytes: bytes.into(),
            profile,
            chunk_count,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn profile(&self) -> EncodingProfile {
        self.profile
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Time-stamped download name, `waveform_<epoch-millis>.<ext>`.
    pub fn suggested_name(&self) -> String {
        format!(
            "waveform_{}.{}",
            Utc::now().timestamp_millis(),
            self.profile.extension
        )
    }
}

/// Destination for finished recordings.
pub trait FileSink {
    /// Stores `blob` under `name` and returns where it ended up.
    fn save(&mut self, name: &str, blob: &RecordingBlob) -> Result<PathBuf>;
}

/// Writes recordings into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSink for DirectorySink {
    fn save(&mut self, name: &str, blob: &RecordingBlob) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, blob.bytes())?;
        info!(path = %path.display(), bytes = blob.len(), "saved recording");
        Ok(path)
    }
}
