//! ---
//! halow_section: "05-device-commands"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Chunked firmware image upload over the publish channel."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use halow_common::AppConfig;
use halow_msg::{MessagePublisher, MessagingError};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

/// Topics and pacing for a firmware upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Receives the image size as decimal text.
    pub start_topic: String,
    /// Receives the image chunks in order.
    pub chunk_topic: String,
    /// Receives an empty payload once every chunk is sent.
    pub done_topic: String,
    /// Bytes per chunk.
    pub chunk_size: usize,
    /// Pause after each chunk.
    pub chunk_delay: Duration,
}

impl UploadSettings {
    /// Derive the settings from the `[topics]` and `[upload]` sections.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            start_topic: config.topics.ota_start.clone(),
            chunk_topic: config.topics.ota_chunk.clone(),
            done_topic: config.topics.ota_done.clone(),
            chunk_size: config.upload.chunk_size,
            chunk_delay: config.upload.chunk_delay,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Image size in bytes.
    pub total_bytes: usize,
    /// Number of chunk messages published.
    pub chunks: usize,
    /// Hex-encoded SHA-256 of the image.
    pub sha256: String,
}

/// Upload failures.
#[derive(Debug, Error)]
pub enum FirmwareError {
    /// The image path does not exist.
    #[error("firmware image {0} not found")]
    NotFound(PathBuf),
    /// The image could not be read.
    #[error("unable to read firmware image {path}: {source}")]
    Read {
        /// Image path.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The image has no content.
    #[error("firmware image is empty")]
    Empty,
    /// A publish step failed; the device discards the partial image.
    #[error("firmware upload failed during {stage}: {source}")]
    Publish {
        /// `start`, `chunk N` or `done`.
        stage: String,
        /// Publisher failure.
        #[source]
        source: MessagingError,
    },
}

/// Streams firmware images to devices in fixed-size chunks.
pub struct FirmwareUploader {
    publisher: Arc<dyn MessagePublisher>,
    settings: UploadSettings,
}

impl FirmwareUploader {
    /// Create an uploader publishing through `publisher`.
    ///
    /// A zero `chunk_size` is treated as one byte per chunk.
    pub fn new(publisher: Arc<dyn MessagePublisher>, mut settings: UploadSettings) -> Self {
        settings.chunk_size = settings.chunk_size.max(1);
        Self {
            publisher,
            settings,
        }
    }

    /// Read the image at `path` and upload it.
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<UploadReport, FirmwareError> {
        let path = path.as_ref();
        let image = tokio::fs::read(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FirmwareError::NotFound(path.to_path_buf())
            } else {
                FirmwareError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        info!(path = %path.display(), bytes = image.len(), "firmware image loaded");
        self.upload_bytes(&image).await
    }

    /// Upload an in-memory image: size, chunks, then the done signal.
    pub async fn upload_bytes(&self, image: &[u8]) -> Result<UploadReport, FirmwareError> {
        if image.is_empty() {
            return Err(FirmwareError::Empty);
        }
        let settings = &self.settings;

        self.send(&settings.start_topic, image.len().to_string().into_bytes(), "start")
            .await?;

        let total_chunks = image.len().div_ceil(settings.chunk_size);
        for (index, chunk) in image.chunks(settings.chunk_size).enumerate() {
            let stage = format!("chunk {}", index + 1);
            self.send(&settings.chunk_topic, chunk.to_vec(), &stage).await?;
            debug!(chunk = index + 1, total_chunks, bytes = chunk.len(), "firmware chunk sent");
            tokio::time::sleep(settings.chunk_delay).await;
        }

        self.send(&settings.done_topic, Vec::new(), "done").await?;

        let report = UploadReport {
            total_bytes: image.len(),
            chunks: total_chunks,
            sha256: hex::encode(Sha256::digest(image)),
        };
        info!(
            bytes = report.total_bytes,
            chunks = report.chunks,
            sha256 = %report.sha256,
            "firmware upload finished"
        );
        Ok(report)
    }

    async fn send(&self, topic: &str, payload: Vec<u8>, stage: &str) -> Result<(), FirmwareError> {
        self.publisher
            .publish(topic, payload)
            .await
            .map_err(|source| FirmwareError::Publish {
                stage: stage.to_owned(),
                source,
            })
    }
}
