//! In-memory period and score state, updated by the lottery and score feeds.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::ledger::{PeriodProvider, ScoreProvider};

#[derive(Debug, Default)]
struct Periods {
    current: Option<String>,
    next: Option<String>,
}

/// Current and upcoming lottery period.
#[derive(Debug, Default)]
pub struct PeriodBoard {
    periods: RwLock<Periods>,
}

impl PeriodBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, current: Option<&str>, next: Option<&str>) {
        let mut periods = self.periods.write().unwrap_or_else(|p| p.into_inner());
        periods.current = normalize(current);
        periods.next = normalize(next);
    }

    pub fn set_current(&self, current: Option<&str>) {
        self.periods.write().unwrap_or_else(|p| p.into_inner()).current = normalize(current);
    }

    pub fn set_next(&self, next: Option<&str>) {
        self.periods.write().unwrap_or_else(|p| p.into_inner()).next = normalize(next);
    }
}

fn normalize(period: Option<&str>) -> Option<String> {
    period.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string)
}

impl PeriodProvider for PeriodBoard {
    fn current_period(&self) -> Option<String> {
        self.periods.read().unwrap_or_else(|p| p.into_inner()).current.clone()
    }

    fn next_period(&self) -> Option<String> {
        self.periods.read().unwrap_or_else(|p| p.into_inner()).next.clone()
    }
}

/// Live player scores keyed by player id.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    scores: RwLock<HashMap<String, Decimal>>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score(&self, player_id: &str, score: Decimal) {
        self.scores
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(player_id.to_string(), score);
    }
}

impl ScoreProvider for ScoreBoard {
    fn player_score(&self, player_id: &str) -> Option<Decimal> {
        self.scores.read().unwrap_or_else(|p| p.into_inner()).get(player_id).copied()
    }
}
