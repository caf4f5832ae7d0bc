//! Keyword rewrite rules backed by a flat tab-separated file.
//!
//! Two independent stores exist at runtime: one rewrites inbound admin
//! commands, the other rewrites outbound messages right before sending.
//! Both behave identically and only differ in the file they persist to.

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("rule file I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One keyword -> replacement pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementRule {
    pub keyword: String,
    pub replacement: String,
}

/// Ordered, case-insensitively keyed rewrite table.
///
/// Rules are kept in insertion order and applied in that order, so the output
/// of one rule can feed the next one. Every mutation rewrites the whole file
/// while the write lock is held, which keeps concurrent saves from
/// interleaving. A failed save leaves the in-memory change in place.
pub struct RewriteRuleStore {
    name: String,
    path: PathBuf,
    rules: RwLock<Vec<ReplacementRule>>,
}

impl RewriteRuleStore {
    /// Create a store and load whatever the file currently holds.
    ///
    /// A missing or unreadable file leaves the store empty.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let store = Self {
            name: name.into(),
            path: path.into(),
            rules: RwLock::new(Vec::new()),
        };
        match store.reload() {
            Ok(count) => info!(store = %store.name, count, "Loaded rewrite rules from {:?}", store.path),
            Err(e) => warn!(store = %store.name, "Failed to load rewrite rules: {e}"),
        }
        store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the in-memory table with the file contents.
    ///
    /// On error the current table is kept as is.
    pub fn reload(&self) -> Result<usize, RuleStoreError> {
        if !self.path.exists() {
            self.write_guard().clear();
            return Ok(0);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| RuleStoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let parsed = parse_rules(&content);
        let count = parsed.len();
        *self.write_guard() = parsed;
        Ok(count)
    }

    /// Copy of every rule in application order.
    pub fn get_all(&self) -> Vec<ReplacementRule> {
        self.read_guard().clone()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// Insert a rule or overwrite the replacement of an existing keyword.
    ///
    /// Blank keywords are ignored. An overwritten rule keeps its position and
    /// its original keyword spelling.
    pub fn add_or_update(&self, keyword: &str, replacement: &str) -> Result<(), RuleStoreError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(());
        }
        let mut rules = self.write_guard();
        match rules.iter_mut().find(|r| same_key(&r.keyword, keyword)) {
            Some(rule) => rule.replacement = replacement.to_string(),
            None => rules.push(ReplacementRule {
                keyword: keyword.to_string(),
                replacement: replacement.to_string(),
            }),
        }
        debug!(store = %self.name, keyword, "Rule set");
        self.save_locked(&rules)
    }

    /// Remove a rule. Returns whether a rule was found.
    ///
    /// The file is only rewritten when something was removed, so an `Err`
    /// always means the rule is gone from memory but the file is stale.
    pub fn remove(&self, keyword: &str) -> Result<bool, RuleStoreError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(false);
        }
        let mut rules = self.write_guard();
        let Some(idx) = rules.iter().position(|r| same_key(&r.keyword, keyword)) else {
            return Ok(false);
        };
        rules.remove(idx);
        debug!(store = %self.name, keyword, "Rule removed");
        self.save_locked(&rules)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), RuleStoreError> {
        let mut rules = self.write_guard();
        rules.clear();
        self.save_locked(&rules)
    }

    /// Rewrite `text` with every rule, in insertion order.
    ///
    /// Matching is a case-sensitive literal substring test and each rule
    /// replaces all of its occurrences. There is no cycle detection: a rule
    /// whose replacement contains its own keyword grows the text on every call.
    pub fn apply_replacement(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let rules = self.read_guard();
        let mut result = text.to_string();
        for rule in rules.iter() {
            if !rule.keyword.is_empty() && result.contains(rule.keyword.as_str()) {
                result = result.replace(rule.keyword.as_str(), &rule.replacement);
            }
        }
        result
    }

    /// True if any keyword occurs in `text`.
    pub fn has_match(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        self.read_guard()
            .iter()
            .any(|r| !r.keyword.is_empty() && text.contains(r.keyword.as_str()))
    }

    /// Exact, case-insensitive keyword lookup.
    pub fn get_replacement(&self, keyword: &str) -> Option<String> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return None;
        }
        self.read_guard()
            .iter()
            .find(|r| same_key(&r.keyword, keyword))
            .map(|r| r.replacement.clone())
    }

    fn save_locked(&self, rules: &[ReplacementRule]) -> Result<(), RuleStoreError> {
        let io_err = |e: std::io::Error| RuleStoreError::Io { path: self.path.clone(), source: e };
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let result = std::fs::write(&self.path, format_rules(rules)).map_err(io_err);
        if let Err(ref e) = result {
            warn!(store = %self.name, "Failed to save rewrite rules: {e}");
        }
        result
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Vec<ReplacementRule>> {
        self.rules.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Vec<ReplacementRule>> {
        self.rules.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn same_key(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Parse `keyword\treplacement` lines. Lines without a tab after a
/// non-empty keyword are dropped; a repeated keyword overwrites in place.
fn parse_rules(content: &str) -> Vec<ReplacementRule> {
    let mut rules: Vec<ReplacementRule> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((keyword, replacement)) = line.split_once('\t') else {
            continue;
        };
        if keyword.is_empty() {
            continue;
        }
        match rules.iter_mut().find(|r| same_key(&r.keyword, keyword)) {
            Some(rule) => rule.replacement = replacement.to_string(),
            None => rules.push(ReplacementRule {
                keyword: keyword.to_string(),
                replacement: replacement.to_string(),
            }),
        }
    }
    rules
}

fn format_rules(rules: &[ReplacementRule]) -> String {
    let mut out = String::new();
    for rule in rules {
        out.push_str(&rule.keyword);
        out.push('\t');
        out.push_str(&rule.replacement);
        out.push('\n');
    }
    out
}

/// Which of the two rule stores a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Rewrites inbound admin commands.
    Admin,
    /// Rewrites outbound messages before they are sent.
    Send,
}

impl RuleKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "send" => Some(Self::Send),
            _ => None,
        }
    }
}

/// The admin-command and send-message stores opened side by side.
pub struct RuleSet {
    pub admin: RewriteRuleStore,
    pub send: RewriteRuleStore,
}

impl RuleSet {
    pub fn open(config: &Config) -> Self {
        Self {
            admin: RewriteRuleStore::open("admin", &config.admin_rules_path),
            send: RewriteRuleStore::open("send", &config.send_rules_path),
        }
    }

    pub fn get(&self, kind: RuleKind) -> &RewriteRuleStore {
        match kind {
            RuleKind::Admin => &self.admin,
            RuleKind::Send => &self.send,
        }
    }
}
