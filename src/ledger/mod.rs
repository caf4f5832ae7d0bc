//! Betting ledger collaborators and the reports rendered from them.
//!
//! The renderer only reads: periods come from the lottery feed, bets from the
//! ledger files, live scores from the score feed and winners text from the
//! settlement step.

pub mod boards;
pub mod files;
pub mod render;
pub mod template;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

pub use boards::{PeriodBoard, ScoreBoard};
pub use files::FileLedger;
pub use render::{BetTemplateRenderer, RenderError};
pub use template::TemplateExpander;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One recorded bet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetEntry {
    pub player_id: String,
    pub player_nick: String,
    /// Chat text as the player typed it.
    pub raw_text: String,
    /// Bet text rewritten into canonical codes.
    pub normalized_text: String,
    /// Player's score when the bet was captured.
    pub score_before: Decimal,
}

/// Active betting periods. Either may be unset.
pub trait PeriodProvider: Send + Sync {
    fn current_period(&self) -> Option<String>;
    fn next_period(&self) -> Option<String>;
}

pub trait BetLedger: Send + Sync {
    fn read_bets(&self, day: NaiveDate, group: &str, period: &str) -> Result<Vec<BetEntry>, LedgerError>;
}

pub trait ScoreProvider: Send + Sync {
    fn player_score(&self, player_id: &str) -> Option<Decimal>;
}

pub trait SettlementService: Send + Sync {
    fn read_winners_text(&self, day: NaiveDate, group: &str, period: &str) -> Result<String, LedgerError>;
}
