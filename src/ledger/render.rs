//! Bet check and winners reports for outgoing message templates.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::ledger::{BetEntry, BetLedger, LedgerError, PeriodProvider, ScoreProvider, SettlementService};

/// Nickname used when none of a player's bets carries one.
const DEFAULT_NICK: &str = "玩家";

/// Leading chars of the player id shown next to the nickname.
const ID_PREFIX_CHARS: usize = 4;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("group id is blank")]
    BlankGroup,
    #[error("no active betting period")]
    NoPeriod,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Renders ledger state into report text.
///
/// The `render_*` methods never fail: every error is logged and turned
/// into an empty string. `try_render_*` expose the reason instead.
pub struct BetTemplateRenderer {
    periods: Arc<dyn PeriodProvider>,
    ledger: Arc<dyn BetLedger>,
    scores: Arc<dyn ScoreProvider>,
    settlement: Arc<dyn SettlementService>,
    deferred_display: bool,
}

impl BetTemplateRenderer {
    pub fn new(
        periods: Arc<dyn PeriodProvider>,
        ledger: Arc<dyn BetLedger>,
        scores: Arc<dyn ScoreProvider>,
        settlement: Arc<dyn SettlementService>,
        deferred_display: bool,
    ) -> Self {
        Self {
            periods,
            ledger,
            scores,
            settlement,
            deferred_display,
        }
    }

    pub fn render_bet_check(&self, day: NaiveDate, group: &str, use_normalized_text: bool) -> String {
        match self.try_render_bet_check(day, group, use_normalized_text) {
            Ok(text) => text,
            Err(RenderError::Ledger(e)) => {
                warn!(group, "Bet check render failed: {e}");
                String::new()
            }
            Err(_) => String::new(),
        }
    }

    pub fn render_winners_text(&self, day: NaiveDate, group: &str) -> String {
        match self.try_render_winners_text(day, group) {
            Ok(text) => text,
            Err(RenderError::Ledger(e)) => {
                warn!(group, "Winners render failed: {e}");
                String::new()
            }
            Err(_) => String::new(),
        }
    }

    /// One line per player who bet in the upcoming period (falling back to
    /// the current one). `Ok("")` means nobody has bet yet.
    pub fn try_render_bet_check(
        &self,
        day: NaiveDate,
        group: &str,
        use_normalized_text: bool,
    ) -> Result<String, RenderError> {
        let group = group.trim();
        if group.is_empty() {
            return Err(RenderError::BlankGroup);
        }
        // Bets placed before the draw are recorded against the next period.
        let period = self
            .periods
            .next_period()
            .filter(|p| !p.is_empty())
            .or_else(|| self.periods.current_period().filter(|p| !p.is_empty()))
            .ok_or(RenderError::NoPeriod)?;

        let bets = self.ledger.read_bets(day, group, &period)?;
        if bets.is_empty() {
            return Ok(String::new());
        }

        let lines: Vec<String> = group_by_player(&bets)
            .into_iter()
            .map(|(player_id, entries)| self.format_player(player_id, &entries, use_normalized_text))
            .collect();
        Ok(lines.join("\n").trim_end().to_string())
    }

    /// Settlement text for the current period, verbatim.
    pub fn try_render_winners_text(&self, day: NaiveDate, group: &str) -> Result<String, RenderError> {
        let group = group.trim();
        if group.is_empty() {
            return Err(RenderError::BlankGroup);
        }
        let period = self
            .periods
            .current_period()
            .filter(|p| !p.is_empty())
            .ok_or(RenderError::NoPeriod)?;
        Ok(self.settlement.read_winners_text(day, group, &period)?)
    }

    fn format_player(&self, player_id: &str, entries: &[&BetEntry], use_normalized_text: bool) -> String {
        let nick = entries
            .iter()
            .map(|e| e.player_nick.as_str())
            .find(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_NICK);
        let prefix: String = player_id.chars().take(ID_PREFIX_CHARS).collect();

        let before = entries[0].score_before;
        let after = self.scores.player_score(player_id).unwrap_or(before);

        let bet_text = entries
            .iter()
            .map(|e| if use_normalized_text { &e.normalized_text } else { &e.raw_text })
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if self.deferred_display {
            format!("{nick}({prefix}) [{bet_text}] {before} - {after}")
        } else {
            format!("{nick}({prefix}) {before} - [{bet_text}] _{after}")
        }
    }
}

/// Group entries by player, in order of each player's first bet.
fn group_by_player(bets: &[BetEntry]) -> Vec<(&str, Vec<&BetEntry>)> {
    let mut groups: Vec<(&str, Vec<&BetEntry>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for bet in bets {
        match index.get(bet.player_id.as_str()) {
            Some(&i) => groups[i].1.push(bet),
            None => {
                index.insert(bet.player_id.as_str(), groups.len());
                groups.push((bet.player_id.as_str(), vec![bet]));
            }
        }
    }
    groups
}
