//! Where messages come from.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::ingest::message::{RawMessage, parse_snapshot};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("message source is not connected")]
    NotConnected,
    #[error("failed to read messages: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message snapshot: {0}")]
    Parse(#[source] serde_json::Error),
}

/// The chat client as seen by the ingestor.
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn is_connected(&self) -> bool;

    /// The most recently visible messages, oldest first, at most `max`.
    async fn poll_recent_messages(&self, max: usize) -> Result<Vec<RawMessage>, SourceError>;
}

/// Reads the JSON snapshot that the chat automation keeps rewriting.
///
/// Considered connected while the snapshot file exists.
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSource for SnapshotFileSource {
    fn is_connected(&self) -> bool {
        self.path.exists()
    }

    async fn poll_recent_messages(&self, max: usize) -> Result<Vec<RawMessage>, SourceError> {
        if !self.is_connected() {
            return Err(SourceError::NotConnected);
        }
        let json = tokio::fs::read_to_string(&self.path).await?;
        let mut messages = parse_snapshot(&json)?;
        let skip = messages.len().saturating_sub(max);
        messages.drain(..skip);
        Ok(messages)
    }
}
