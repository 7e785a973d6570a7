//! Fingerprint replay
//!
//! Runs vehicle identification over a recorded candump log and reports the
//! result together with the actuation limits the controller would use.
//!
//! # Usage
//!
//! ```bash
//! candump -l can0
//! ./fingerprint-replay candump-2024-05-01_101500.log --config session.toml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use mqb_lateral::candump::parse_candump_line;
use mqb_lateral::config::SessionConfig;
use mqb_lateral::controller::SteeringController;
use mqb_lateral::matcher::{FingerprintMatcher, MatchResult};

#[derive(Parser, Debug)]
#[command(name = "fingerprint-replay")]
#[command(about = "Identify an MQB vehicle from a recorded CAN log")]
struct Args {
    /// candump log file (`candump -l` format)
    log: PathBuf,

    /// Session configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only use frames captured on this interface
    #[arg(short, long)]
    interface: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "mqb_lateral=debug,fingerprint_replay=debug"
    } else {
        "mqb_lateral=info,fingerprint_replay=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            SessionConfig::load(path).context("Failed to load config")?
        }
        None => SessionConfig::default(),
    };

    let db = config
        .fingerprint_database()
        .context("Failed to load fingerprint database")?;
    let mut matcher = FingerprintMatcher::new(&db, config.matcher_config());

    let log = std::fs::read_to_string(&args.log)
        .with_context(|| format!("Failed to read {}", args.log.display()))?;

    let mut origin = None;
    for (number, line) in log.lines().enumerate() {
        let frame = match parse_candump_line(line) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = number + 1, "skipping line: {}", e);
                continue;
            }
        };
        if args
            .interface
            .as_deref()
            .is_some_and(|iface| iface != frame.interface)
        {
            continue;
        }

        let origin = *origin.get_or_insert(frame.timestamp);
        let elapsed = frame.timestamp.saturating_sub(origin);
        if matcher.observe_at(frame.id, frame.len(), elapsed).is_terminal() {
            break;
        }
    }

    let frames = matcher.frames_seen();
    let distinct = matcher.observations().len();
    let result = matcher.finish();
    info!(frames, distinct, "replay finished");

    match &result {
        MatchResult::Confirmed(variant) => {
            println!("Confirmed: {} ({})", variant, variant.id())
        }
        MatchResult::Ambiguous(candidates) => {
            let names: Vec<_> = candidates.iter().map(|v| v.id()).collect();
            println!("Ambiguous: {}", names.join(", "))
        }
        MatchResult::NoMatch => println!("No match"),
        MatchResult::Unresolved => println!("Unresolved"),
    }

    let table = config.param_table();
    let controller =
        SteeringController::start(&result, &table, config.fallback, config.buttons)
            .context("Steering control would not engage")?;
    println!("{:#?}", controller.params());

    Ok(())
}
