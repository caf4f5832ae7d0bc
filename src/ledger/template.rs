//! Expansion of report tokens embedded in outgoing message templates.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::ledger::render::BetTemplateRenderer;
use crate::rules::RewriteRuleStore;

/// Bet check using the text players typed.
pub const BET_CHECK_TOKEN: &str = "[下注核对]";
/// Bet check using normalized bet codes.
pub const BET_CHECK_NORMALIZED_TOKEN: &str = "[下注核对2]";
/// Winners of the settled period.
pub const WINNERS_TOKEN: &str = "[中奖玩家]";

pub struct TemplateExpander {
    renderer: Arc<BetTemplateRenderer>,
}

impl TemplateExpander {
    pub fn new(renderer: Arc<BetTemplateRenderer>) -> Self {
        Self { renderer }
    }

    /// Replace every report token in `template`. Reports are only rendered
    /// for tokens that are present.
    pub fn expand(&self, template: &str, day: NaiveDate, group: &str) -> String {
        let mut result = template.to_string();
        if result.contains(BET_CHECK_TOKEN) {
            let report = self.renderer.render_bet_check(day, group, false);
            result = result.replace(BET_CHECK_TOKEN, &report);
        }
        if result.contains(BET_CHECK_NORMALIZED_TOKEN) {
            let report = self.renderer.render_bet_check(day, group, true);
            result = result.replace(BET_CHECK_NORMALIZED_TOKEN, &report);
        }
        if result.contains(WINNERS_TOKEN) {
            let report = self.renderer.render_winners_text(day, group);
            result = result.replace(WINNERS_TOKEN, &report);
        }
        result
    }

    /// Expand tokens, then run the send-message rewrite rules over the result.
    pub fn compose(&self, template: &str, day: NaiveDate, group: &str, send_rules: &RewriteRuleStore) -> String {
        send_rules.apply_replacement(&self.expand(template, day, group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{BetEntry, FileLedger, PeriodBoard, ScoreBoard};
    use chrono::NaiveTime;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn setup(dir: &TempDir) -> TemplateExpander {
        let ledger = Arc::new(FileLedger::in_data_dir(dir.path()));
        let periods = Arc::new(PeriodBoard::new());
        periods.set(Some("3000"), Some("3001"));
        let scores = Arc::new(ScoreBoard::new());
        scores.set_score("u1", Decimal::from(150));

        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let entry = BetEntry {
            player_id: "u1".into(),
            player_nick: "Tom".into(),
            raw_text: "大100".into(),
            normalized_text: "D100".into(),
            score_before: Decimal::from(100),
        };
        ledger.append_bet(day(), time, "team-1", "3001", &entry, Decimal::from(100)).unwrap();
        ledger.write_winners_text(day(), "team-1", "3000", "Tom(u1) 盈亏:50").unwrap();

        let renderer = BetTemplateRenderer::new(periods, ledger.clone(), scores, ledger, true);
        TemplateExpander::new(Arc::new(renderer))
    }

    #[test]
    fn test_expands_all_tokens() {
        let dir = TempDir::new().unwrap();
        let expander = setup(&dir);

        let out = expander.expand("核对:\n[下注核对]\n[下注核对2]\n中奖:\n[中奖玩家]", day(), "team-1");
        assert_eq!(
            out,
            "核对:\nTom(u1) [大100] 100 - 150\nTom(u1) [D100] 100 - 150\n中奖:\nTom(u1) 盈亏:50"
        );
    }

    #[test]
    fn test_plain_text_unchanged() {
        let dir = TempDir::new().unwrap();
        let expander = setup(&dir);
        assert_eq!(expander.expand("封盘了", day(), "team-1"), "封盘了");
    }

    #[test]
    fn test_tokens_vanish_without_group() {
        let dir = TempDir::new().unwrap();
        let expander = setup(&dir);
        assert_eq!(expander.expand("A[下注核对]B[中奖玩家]C", day(), ""), "ABC");
    }

    #[test]
    fn test_compose_applies_send_rules() {
        let dir = TempDir::new().unwrap();
        let expander = setup(&dir);
        let rules = RewriteRuleStore::open("send", dir.path().join("send.txt"));
        rules.add_or_update("大", "DA").unwrap();

        let out = expander.compose("[下注核对]", day(), "team-1", &rules);
        assert_eq!(out, "Tom(u1) [DA100] 100 - 150");
    }
}
