//! Bet ledger and settlement results stored as plain files.
//!
//! Layout under the ledger root:
//!
//! ```text
//! <root>/<yyyy-MM-dd>/<group>/bets-<period>.txt    one TSV line per bet
//! <root>/<yyyy-MM-dd>/<group>/settle-<period>.txt  winners text, verbatim
//! ```
//!
//! Bet lines carry nine tab-separated columns:
//! `time period group playerId nick scoreBefore total normalized raw`.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::ledger::{BetEntry, BetLedger, LedgerError, SettlementService};

const BET_COLUMNS: usize = 9;

/// Directory name used when a record has no group.
const UNKNOWN_GROUP: &str = "unknown-team";

pub struct FileLedger {
    root: PathBuf,
}

impl FileLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ledger rooted at `<data_dir>/Bets`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("Bets"))
    }

    fn group_dir(&self, day: NaiveDate, group: &str) -> PathBuf {
        let group = group.trim();
        let group = if group.is_empty() { UNKNOWN_GROUP.to_string() } else { path_segment(group) };
        self.root.join(day.format("%Y-%m-%d").to_string()).join(group)
    }

    pub fn bets_path(&self, day: NaiveDate, group: &str, period: &str) -> PathBuf {
        let period = path_segment(period.trim());
        self.group_dir(day, group).join(format!("bets-{period}.txt"))
    }

    pub fn settlement_path(&self, day: NaiveDate, group: &str, period: &str) -> PathBuf {
        let period = path_segment(period.trim());
        self.group_dir(day, group).join(format!("settle-{period}.txt"))
    }

    /// Append one bet line, creating directories as needed.
    pub fn append_bet(
        &self,
        day: NaiveDate,
        time: NaiveTime,
        group: &str,
        period: &str,
        entry: &BetEntry,
        total: Decimal,
    ) -> Result<(), LedgerError> {
        let path = self.bets_path(day, group, period);
        let io_err = |e: std::io::Error| LedgerError::Io { path: path.clone(), source: e };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }

        let line = [
            time.format("%H:%M:%S").to_string(),
            period.to_string(),
            group.trim().to_string(),
            entry.player_id.clone(),
            untab(&entry.player_nick),
            entry.score_before.to_string(),
            total.to_string(),
            untab(&entry.normalized_text),
            untab(&entry.raw_text),
        ]
        .join("\t");

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        writeln!(file, "{line}").map_err(io_err)?;
        debug!(player = %entry.player_id, period, "Bet appended to {:?}", path);
        Ok(())
    }

    /// Store the winners text for a settled period, replacing any earlier one.
    pub fn write_winners_text(
        &self,
        day: NaiveDate,
        group: &str,
        period: &str,
        text: &str,
    ) -> Result<(), LedgerError> {
        let path = self.settlement_path(day, group, period);
        let io_err = |e: std::io::Error| LedgerError::Io { path: path.clone(), source: e };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        std::fs::write(&path, text).map_err(io_err)
    }
}

/// Make an id safe to use as a single path component under the ledger root.
fn path_segment(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        return "_".repeat(cleaned.len().max(1));
    }
    cleaned
}

fn untab(s: &str) -> String {
    s.replace(['\t', '\r', '\n'], " ")
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO)
}

/// Parse ledger lines; blank and short lines are skipped.
fn parse_bets(content: &str) -> Vec<BetEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < BET_COLUMNS {
                return None;
            }
            Some(BetEntry {
                player_id: parts[3].to_string(),
                player_nick: parts[4].to_string(),
                score_before: parse_decimal(parts[5]),
                normalized_text: parts[7].to_string(),
                raw_text: parts[8].to_string(),
            })
        })
        .collect()
}

impl BetLedger for FileLedger {
    fn read_bets(&self, day: NaiveDate, group: &str, period: &str) -> Result<Vec<BetEntry>, LedgerError> {
        let path = self.bets_path(day, group, period);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LedgerError::Io { path: path.clone(), source: e })?;
        Ok(parse_bets(&content))
    }
}

impl SettlementService for FileLedger {
    fn read_winners_text(&self, day: NaiveDate, group: &str, period: &str) -> Result<String, LedgerError> {
        let path = self.settlement_path(day, group, period);
        if !path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&path).map_err(|e| LedgerError::Io { path, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn entry(id: &str, nick: &str, raw: &str, before: i64) -> BetEntry {
        BetEntry {
            player_id: id.to_string(),
            player_nick: nick.to_string(),
            raw_text: raw.to_string(),
            normalized_text: raw.to_uppercase(),
            score_before: Decimal::from(before),
        }
    }

    #[test]
    fn test_paths() {
        let ledger = FileLedger::new("/data/Bets");
        assert_eq!(
            ledger.bets_path(day(), " team-1 ", "3001"),
            PathBuf::from("/data/Bets/2026-03-14/team-1/bets-3001.txt")
        );
        assert_eq!(
            ledger.settlement_path(day(), "", "3001"),
            PathBuf::from("/data/Bets/2026-03-14/unknown-team/settle-3001.txt")
        );
    }

    #[test]
    fn test_ids_cannot_leave_the_root() {
        let ledger = FileLedger::new("/data/Bets");
        assert_eq!(
            ledger.bets_path(day(), "..", "../../etc/passwd"),
            PathBuf::from("/data/Bets/2026-03-14/__/bets-.._.._etc_passwd.txt")
        );
        assert_eq!(
            ledger.settlement_path(day(), "a/b\\c", "1"),
            PathBuf::from("/data/Bets/2026-03-14/a_b_c/settle-1.txt")
        );
        assert!(ledger.bets_path(day(), "/abs", "1").starts_with("/data/Bets"));
    }

    #[test]
    fn test_append_then_read() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::in_data_dir(dir.path());
        let time = NaiveTime::from_hms_opt(12, 30, 5).unwrap();

        ledger.append_bet(day(), time, "team-1", "3001", &entry("u1", "Tom", "da100", 100), Decimal::from(100)).unwrap();
        ledger.append_bet(day(), time, "team-1", "3001", &entry("u2", "A\tB", "x\ty", 50), Decimal::from(10)).unwrap();

        let bets = ledger.read_bets(day(), "team-1", "3001").unwrap();
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0], entry("u1", "Tom", "da100", 100));
        assert_eq!(bets[1].player_nick, "A B");
        assert_eq!(bets[1].raw_text, "x y");

        let line = std::fs::read_to_string(ledger.bets_path(day(), "team-1", "3001")).unwrap();
        assert!(line.starts_with("12:30:05\t3001\tteam-1\tu1\tTom\t100\t100\tDA100\tda100\n"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::in_data_dir(dir.path());
        assert!(ledger.read_bets(day(), "team-1", "3001").unwrap().is_empty());
        assert_eq!(ledger.read_winners_text(day(), "team-1", "3001").unwrap(), "");
    }

    #[test]
    fn test_skips_short_and_blank_lines() {
        let content = "\n12:00:00\t1\tg\tu1\tTom\t100\t5\tD5\t大5\nbroken\tline\n   \n12:01:00\t1\tg\tu2\tAmy\tnope\t5\tX5\t小5\n";
        let bets = parse_bets(content);
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].score_before, Decimal::from(100));
        assert_eq!(bets[1].score_before, Decimal::ZERO);
        assert_eq!(bets[1].raw_text, "小5");
    }

    #[test]
    fn test_decimal_scale_preserved() {
        let bets = parse_bets("t\tp\tg\tu1\tTom\t100.50\t0\tn\tr\n");
        assert_eq!(bets[0].score_before.to_string(), "100.50");
    }

    #[test]
    fn test_winners_roundtrip() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::in_data_dir(dir.path());
        let text = "期号3001 号码合计=15 [DD]\nTom(u1) 盈亏:50\n";
        ledger.write_winners_text(day(), "team-1", "3001", text).unwrap();
        assert_eq!(ledger.read_winners_text(day(), "team-1", "3001").unwrap(), text);
    }
}
