use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use ledgerbot::config::Config;
use ledgerbot::ingest::{MessageIngestor, SnapshotFileSource, StartOutcome};
use ledgerbot::ledger::{BetTemplateRenderer, FileLedger, PeriodBoard, ScoreBoard, TemplateExpander};
use ledgerbot::rules::{RuleKind, RuleSet};

const USAGE: &str = "usage: ledgerbot [config.json] <command>

commands:
  watch                                   poll the message snapshot until Ctrl-C (default)
  rules <admin|send> list
  rules <admin|send> add <keyword> [replacement]
  rules <admin|send> remove <keyword>
  rules <admin|send> clear
  rules <admin|send> apply <text>
  render <template> [group] [--current P] [--next P]

The config path defaults to ledgerbot.json; a first argument ending in .json overrides it.";

const DEFAULT_CONFIG: &str = "ledgerbot.json";

#[tokio::main]
async fn main() -> ExitCode {
    let (config_path, command) = split_args(std::env::args().skip(1).collect());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "ledgerbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("Loaded config from {config_path}");

    let args: Vec<&str> = command.iter().map(String::as_str).collect();
    match args.as_slice() {
        [] | ["watch"] => watch(config).await,
        ["rules", kind, rest @ ..] => match RuleKind::parse(kind) {
            Some(kind) => rules_command(&config, kind, rest),
            None => usage(),
        },
        ["render", template, rest @ ..] => render_command(&config, template, rest),
        _ => usage(),
    }
}

/// Split off an optional leading `*.json` config path from the command words.
fn split_args(mut args: Vec<String>) -> (String, Vec<String>) {
    match args.first() {
        Some(first) if first.ends_with(".json") => {
            let config_path = args.remove(0);
            (config_path, args)
        }
        _ => (DEFAULT_CONFIG.to_string(), args),
    }
}

fn usage() -> ExitCode {
    eprintln!("{USAGE}");
    ExitCode::FAILURE
}

fn rules_command(config: &Config, kind: RuleKind, args: &[&str]) -> ExitCode {
    let rules = RuleSet::open(config);
    let store = rules.get(kind);

    let saved = match args {
        ["list"] => {
            for rule in store.get_all() {
                println!("{}\t{}", rule.keyword, rule.replacement);
            }
            Ok(())
        }
        ["add", keyword] => store.add_or_update(keyword, ""),
        ["add", keyword, replacement] => store.add_or_update(keyword, replacement),
        ["remove", keyword] => match store.remove(keyword) {
            Ok(found) => {
                if !found {
                    println!("no rule for '{keyword}'");
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        ["clear"] => store.clear(),
        ["apply", text] => {
            println!("{}", store.apply_replacement(text));
            Ok(())
        }
        _ => return usage(),
    };

    match saved {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The change is live in memory but did not reach the file.
            warn!(store = store.name(), "Rule change not persisted: {e}");
            ExitCode::FAILURE
        }
    }
}

fn render_command(config: &Config, template: &str, args: &[&str]) -> ExitCode {
    let (mut group, flags) = match args {
        [first, rest @ ..] if !first.starts_with("--") => (Some(first.to_string()), rest),
        _ => (None, args),
    };
    if group.is_none() {
        group = config.group_id.clone();
    }
    let periods = Arc::new(PeriodBoard::new());

    let mut it = flags.iter();
    while let Some(flag) = it.next() {
        let Some(value) = it.next() else {
            return usage();
        };
        match *flag {
            "--current" => periods.set_current(Some(*value)),
            "--next" => periods.set_next(Some(*value)),
            _ => return usage(),
        }
    }

    let expander = build_expander(config, periods, Arc::new(ScoreBoard::new()));
    let rules = RuleSet::open(config);
    let day = Local::now().date_naive();
    let text = expander.compose(template, day, group.as_deref().unwrap_or(""), &rules.send);
    println!("{text}");
    ExitCode::SUCCESS
}

fn build_expander(config: &Config, periods: Arc<PeriodBoard>, scores: Arc<ScoreBoard>) -> TemplateExpander {
    let ledger = Arc::new(FileLedger::in_data_dir(&config.data_dir));
    let renderer = BetTemplateRenderer::new(
        periods,
        ledger.clone(),
        scores,
        ledger,
        config.deferred_bet_display,
    );
    TemplateExpander::new(Arc::new(renderer))
}

async fn watch(config: Config) -> ExitCode {
    let Some(snapshot) = config.snapshot_file.clone() else {
        eprintln!("snapshot_file is not set in the config");
        return ExitCode::FAILURE;
    };

    info!("🚀 Starting ledgerbot...");
    let rules = RuleSet::open(&config);
    let source = Arc::new(SnapshotFileSource::new(&snapshot));
    let (ingestor, mut events) = MessageIngestor::new(source, config.poll_max_messages);
    let interval = Duration::from_millis(config.poll_interval_ms);

    // Wait for the chat automation to produce its first snapshot.
    loop {
        match ingestor.start(interval) {
            StartOutcome::Started | StartOutcome::AlreadyPolling => break,
            StartOutcome::NotConnected => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => return ExitCode::SUCCESS,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if rules.admin.has_match(&event.content) {
                    let command = rules.admin.apply_replacement(&event.content);
                    info!(sender = %event.sender_id, "Admin command: {} -> {}", event.preview(), command);
                }
            }
        }
    }

    ingestor.stop();
    ExitCode::SUCCESS
}
