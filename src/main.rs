use chatguard::engine::{AutomatedVerdict, ModerationEngine, ReportRequest, ResetPolicy};
use chatguard::policy::PolicyStore;
use chatguard::transport::{AllowAllAuthorizer, LoggingTransport, MessageEvent};
use chatguard::{ClassifierGateway, Config, HeuristicScorer, Store};
use clap::{Arg, Command};
use log::LevelFilter;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("chatguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Spam and phishing moderation engine for group chats")
        .long_about(
            "chatguard scores group-chat messages for spam/phishing likelihood, \
             removes offenders, tracks per-user violation counts, and escalates \
             to a configurable punishment once a chat's warning limit is crossed. \
             The chat platform adapter embeds this engine; the binary provides \
             configuration, statistics, and demo tooling.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/chatguard.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Run canned messages through the full moderation pipeline")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("chat")
                .long("chat")
                .value_name("ID")
                .help("Chat id for stats/policy commands")
                .allow_hyphen_values(true)
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Show moderation statistics for --chat")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("enforcements")
                .long("enforcements")
                .help("List the enforcement audit trail for --chat")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-policy")
                .long("show-policy")
                .help("Show the moderation policy for --chat")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .value_name("FIELD=VALUE")
                .help("Set a policy field for --chat (threshold also accepts weak/normal/high)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit statistics as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match Config::default().to_file(path) {
            Ok(()) => println!("✅ Default configuration written to {path}"),
            Err(e) => {
                eprintln!("Failed to write configuration: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("demo") {
        run_demo().await;
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration from {config_path}: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let wants_chat_command = matches.get_flag("stats")
        || matches.get_flag("enforcements")
        || matches.get_flag("show-policy")
        || matches.contains_id("set");

    if !wants_chat_command {
        eprintln!("No action specified. Try --demo, --stats, or --help.");
        process::exit(2);
    }

    let chat_id = require_chat(&matches);
    let store = match Store::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open database {}: {e}", config.database_path);
            process::exit(1);
        }
    };
    let policies = PolicyStore::new(store.clone());

    if let Some(assignment) = matches.get_one::<String>("set") {
        set_policy_field(&policies, &config, chat_id, assignment);
    }

    if matches.get_flag("show-policy") {
        show_policy(&policies, chat_id);
    }

    if matches.get_flag("stats") {
        show_stats(&store, chat_id, matches.get_flag("json"));
    }

    if matches.get_flag("enforcements") {
        show_enforcements(&store, chat_id);
    }
}

fn require_chat(matches: &clap::ArgMatches) -> i64 {
    let raw = match matches.get_one::<String>("chat") {
        Some(raw) => raw,
        None => {
            eprintln!("--chat <ID> is required for this command");
            process::exit(2);
        }
    };
    match raw.parse() {
        Ok(id) => id,
        Err(_) => {
            eprintln!("Invalid chat id: {raw}");
            process::exit(2);
        }
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!("  Database path: {}", config.database_path);
    println!("  Reset policy: {:?}", config.reset_policy);
    println!(
        "  Sensitivity presets: weak={} normal={} high={}",
        config.presets.weak, config.presets.normal, config.presets.high
    );

    let presets = [
        ("weak", config.presets.weak),
        ("normal", config.presets.normal),
        ("high", config.presets.high),
    ];
    for (name, value) in presets {
        if !(0.0..=1.0).contains(&value) {
            println!("❌ Preset '{name}' must be within [0, 1], got {value}");
            process::exit(1);
        }
    }
    println!("✅ Configuration is valid");
}

fn set_policy_field(policies: &PolicyStore, config: &Config, chat_id: i64, assignment: &str) {
    let (field, raw_value) = match assignment.split_once('=') {
        Some(pair) => pair,
        None => {
            eprintln!("Expected FIELD=VALUE, got: {assignment}");
            process::exit(2);
        }
    };

    // Allow named sensitivity levels where a raw threshold is expected.
    let resolved;
    let value = if field == "threshold" {
        match config.presets.resolve(raw_value) {
            Some(threshold) => {
                resolved = threshold.to_string();
                &resolved
            }
            None => raw_value,
        }
    } else {
        raw_value
    };

    match policies.set_field(chat_id, field, value) {
        Ok(()) => println!("✅ Set {field} = {value} for chat {chat_id}"),
        Err(e) => {
            eprintln!("Failed to set {field}: {e}");
            process::exit(1);
        }
    }
}

fn show_policy(policies: &PolicyStore, chat_id: i64) {
    match policies.policy(chat_id) {
        Ok(policy) => {
            println!("⚙️ Policy for chat {chat_id}");
            println!("  threshold:    {}", policy.threshold);
            println!("  max_warnings: {}", policy.max_warnings);
            println!("  punishment:   {}", policy.punishment);
            println!("  logging:      {}", if policy.logging_enabled { "on" } else { "off" });
            println!("  anon_reports: {}", if policy.anonymous_reports { "on" } else { "off" });
        }
        Err(e) => {
            eprintln!("Failed to read policy: {e}");
            process::exit(1);
        }
    }
}

fn show_stats(store: &Store, chat_id: i64, as_json: bool) {
    let stats = match chatguard::stats::chat_stats(store, chat_id) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Failed to read statistics: {e}");
            process::exit(1);
        }
    };

    if as_json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize statistics: {e}");
                process::exit(1);
            }
        }
        return;
    }

    println!("📊 Moderation statistics for chat {chat_id}");
    println!("  Messages scored:     {}", stats.messages_scored);
    println!("  Messages removed:    {}", stats.messages_removed);
    println!("  Reports:             {}", stats.reports);
    println!("  Enforcement actions: {}", stats.enforcements);
}

fn show_enforcements(store: &Store, chat_id: i64) {
    let records = match chatguard::stats::enforcement_history(store, chat_id) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Failed to read enforcement history: {e}");
            process::exit(1);
        }
    };

    if records.is_empty() {
        println!("No enforcement actions recorded for chat {chat_id}.");
        return;
    }

    println!("⛔ Enforcement history for chat {chat_id}");
    for record in records {
        println!(
            "  [{}] user {} — {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.user_id,
            record.reason
        );
    }
}

const DEMO_CHAT: i64 = -1001;

async fn run_demo() {
    println!("🧪 chatguard demo — heuristic scorer, logging transport, in-memory database");
    println!();

    let store = match Store::open_in_memory() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open in-memory database: {e}");
            process::exit(1);
        }
    };
    let engine = ModerationEngine::new(
        store.clone(),
        ClassifierGateway::new(Box::new(HeuristicScorer::new())),
        Arc::new(LoggingTransport),
        Arc::new(AllowAllAuthorizer),
        ResetPolicy::OnAttempt,
    );

    // Weak sensitivity and a short fuse so the demo escalates quickly.
    for (field, value) in [("threshold", "0.8"), ("max_warnings", "2")] {
        if let Err(e) = engine.set_policy_field(DEMO_CHAT, field, value) {
            eprintln!("Failed to configure demo policy: {e}");
            process::exit(1);
        }
    }

    let samples: [(i64, &str); 4] = [
        (501, "anyone up for lunch tomorrow?"),
        (
            777,
            "Congratulations! You have won a free iPhone. Claim your prize here: \
             bit.ly/claim123 — offer expires within 24 hours!",
        ),
        (501, "sure, noon at the usual place"),
        (
            777,
            "URGENT: your account has been suspended. Verify your account now: \
             bit.ly/verify-acct",
        ),
    ];

    for (i, (user_id, text)) in samples.iter().enumerate() {
        let event = MessageEvent {
            chat_id: DEMO_CHAT,
            user_id: *user_id,
            message_id: (i + 1) as i64,
            text: text.to_string(),
            is_private: false,
            reply_target: None,
        };
        println!("▶ user {user_id}: {text}");
        match engine.decide_automated(&event).await {
            Ok(AutomatedVerdict::Skipped(reason)) => println!("  ↷ skipped ({reason:?})"),
            Ok(AutomatedVerdict::Accepted { score }) => {
                println!("  ✅ accepted (score {score:.2})")
            }
            Ok(AutomatedVerdict::Removed {
                score,
                warnings,
                max_warnings,
                escalation,
                ..
            }) => {
                println!("  🗑️ removed (score {score:.2}, warning {warnings}/{max_warnings})");
                if let Some(escalation) = escalation {
                    println!(
                        "  ⛔ escalated: {} (enforced: {})",
                        escalation.punishment, escalation.enforced
                    );
                }
            }
            Err(e) => println!("  ❌ engine error: {e}"),
        }
        println!();
    }

    println!("▶ moderator 900 reports message 3");
    match engine
        .decide_manual_report(&ReportRequest {
            chat_id: DEMO_CHAT,
            reporter_id: 900,
            message_id: 3,
            message_text: "sure, noon at the usual place".to_string(),
        })
        .await
    {
        Ok(outcome) => println!(
            "  📝 report {} recorded (score {:?}, anonymous: {})",
            outcome.report_id, outcome.score, outcome.anonymous
        ),
        Err(e) => println!("  ❌ report failed: {e}"),
    }
    println!();

    match chatguard::stats::chat_stats(&store, DEMO_CHAT) {
        Ok(stats) => {
            println!("📊 Demo chat statistics");
            println!("  Messages scored:     {}", stats.messages_scored);
            println!("  Messages removed:    {}", stats.messages_removed);
            println!("  Reports:             {}", stats.reports);
            println!("  Enforcement actions: {}", stats.enforcements);
        }
        Err(e) => eprintln!("Failed to read demo statistics: {e}"),
    }
}
