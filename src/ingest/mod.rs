//! Chat message ingestion - polls the chat client and emits each new message once.

pub mod dedup;
pub mod message;
pub mod poller;
pub mod source;

pub use dedup::FingerprintCache;
pub use message::{IngestedMessage, RawMessage, parse_snapshot};
pub use poller::{MessageIngestor, StartOutcome, TickReport};
pub use source::{MessageSource, SnapshotFileSource, SourceError};
