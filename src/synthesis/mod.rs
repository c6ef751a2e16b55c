//! Sources of encoded speech payloads.
//!
//! Payloads follow the synthesis contract: base64 of raw mono S16LE PCM at
//! 24 kHz. The format is never sniffed; a source only delivers the text.

use crate::audio::EncodedAudioPayload;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};


const LOG_TARGET: &str = "serene_player::synthesis";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("failed to read payload from {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("payload from {0} is empty")]
    Empty(String),
}

/// Delivers one encoded audio payload.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch_payload(&self) -> Result<EncodedAudioPayload, SynthesisError>;
}

/// Reads a payload from a file, or from stdin when the path is `-`.
#[derive(Debug, Clone)]
pub struct FilePayloadSource {
    path: PathBuf,
}

impl FilePayloadSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePayloadSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }

    fn source_name(&self) -> String {
        if self.is_stdin() {
            "stdin".to_string()
        } else {
            self.path.display().to_string()
        }
    }
}

#[async_trait]
impl PayloadSource for FilePayloadSource {
    #[instrument(skip(self), fields(source = %self.source_name()))]
    async fn fetch_payload(&self) -> Result<EncodedAudioPayload, SynthesisError> {
        let io_err = |source| SynthesisError::Io {
            source_name: self.source_name(),
            source,
        };

        let raw = if self.is_stdin() {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .map_err(io_err)?;
            raw
        } else {
            tokio::fs::read_to_string(&self.path).await.map_err(io_err)?
        };

        // Line-wrapped base64 (as written by `base64` tools) is accepted.
        let encoded: String = raw.split_whitespace().collect();
        if encoded.is_empty() {
            return Err(SynthesisError::Empty(self.source_name()));
        }
        debug!(target: LOG_TARGET, "Read {} base64 characters.", encoded.len());
        Ok(EncodedAudioPayload::from(encoded))
    }
}
