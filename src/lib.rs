//! Chat automation core for a betting-ledger bot: message ingestion,
//! keyword rewrite rules and ledger report rendering.

pub mod config;
pub mod ingest;
pub mod ledger;
pub mod rules;
