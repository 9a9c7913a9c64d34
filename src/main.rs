use clap::{Arg, Command};
use log::LevelFilter;
use mailsift::decision::Verdict;
use mailsift::message::{self, Message};
use mailsift::{Config, Screener};
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("mailsift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Multi-signal email screening: spamd scoring, DKIM/SPF evidence, blocklists, and optional LLM analysis")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("mailsift.yaml"),
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
                .help("Validate the configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .value_name("DIR")
                .help("Override the sample directory to scan")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("no-move")
                .long("no-move")
                .help("Report verdicts without relocating files")
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
        generate_default_config(path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        println!("Configuration OK");
        println!("  sample dir:        {}", config.sample_dir);
        println!(
            "  spamd:             {}:{} (timeout {}s)",
            config.spamd.host, config.spamd.port, config.spamd.timeout_seconds
        );
        println!("  blocklist entries: {}", config.blocklist.len());
        let llm = if config.llm.resolved_gemini_key().is_some() {
            "gemini"
        } else if config.llm.resolved_openai_key().is_some() {
            "openai"
        } else {
            "disabled (no API key)"
        };
        println!("  LLM judge:         {llm}");
        println!(
            "  routes:            clean={} quarantine={} spam={}",
            config.routes.clean_dir, config.routes.quarantine_dir, config.routes.spam_dir
        );
        return;
    }

    if let Some(dir) = matches.get_one::<String>("dir") {
        config.sample_dir = dir.clone();
    }

    if let Err(e) = run(config, matches.get_flag("no-move")).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        log::info!("Loading configuration from: {path}");
        Config::from_file(path)
    } else {
        log::warn!("Config file {path} not found, using defaults");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    match Config::default().to_file(path) {
        Ok(()) => println!("Generated default configuration: {path}"),
        Err(e) => {
            eprintln!("Failed to write {path}: {e}");
            process::exit(1);
        }
    }
}

async fn run(config: Config, keep_in_place: bool) -> anyhow::Result<()> {
    let sample_dir = PathBuf::from(&config.sample_dir);
    log::info!("Loading emails from {}", sample_dir.display());
    let messages = message::load_dir(&sample_dir)?;
    if messages.is_empty() {
        log::info!("No .eml files found in {}", sample_dir.display());
        return Ok(());
    }

    let screener = Screener::new(config);
    for message in &messages {
        println!("==============================");
        println!("Email: {}", message.id);
        let verdict = screener.screen(message).await;
        print_scorecard(message, &verdict);

        if keep_in_place {
            continue;
        }
        match screener.dispose(message, &verdict) {
            Ok(dest) => println!("Moved to: {}", dest.display()),
            Err(e) => log::error!("Failed to move {}: {e}", message.id),
        }
    }
    Ok(())
}

fn print_scorecard(message: &Message, verdict: &Verdict) {
    println!();
    println!("----- EMAIL SCORECARD -----");
    println!(
        "FINAL DECISION: {} (Score: {:.1}/10.0)",
        verdict.status, verdict.decision_score
    );
    println!("---------------------------");
    println!("Subject: {}", message.subject.as_deref().unwrap_or("(none)"));
    println!("Detailed breakdown:");
    println!(" [ ] Domain: {}", verdict.domain_mark);
    println!(" [ ] SPF:    {}", verdict.signals.provenance.status.as_str());
    println!(" [ ] DKIM:   {}", verdict.auth_mark);
    match &verdict.signals.classifier {
        Some(c) => println!(" [ ] spamd:  score {:.1} / {:.1}", c.score, c.required),
        None => println!(" [ ] spamd:  N/A"),
    }
    match &verdict.signals.llm {
        Some(l) => println!(" [ ] LLM:    confidence {:.2}", l.confidence),
        None => println!(" [ ] LLM:    N/A"),
    }
    if let Some(host) = &verdict.signals.provenance.resolved_hostname {
        println!(" [ ] PTR:    {host}");
    }
    if verdict.signals.adversarial.is_flagged {
        println!(
            " [!] SECURITY: {}",
            verdict
                .signals
                .adversarial
                .reason
                .as_deref()
                .unwrap_or("adversarial content")
        );
    }
    println!("Reasons:");
    for reason in &verdict.reasons {
        println!(" - {reason}");
    }
}
