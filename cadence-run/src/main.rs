//! cadence-run - Long-running daemon for scheduled engagement cycles
//!
//! Loads configuration from the environment, wires a provider into the
//! engine and runs cycles until a fatal outcome.

use clap::Parser;
use libcadence::provider::mock::MockProvider;
use libcadence::provider::snapshot::Snapshot;
use libcadence::{logging, Config, Engine, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cadence-run")]
#[command(version)]
#[command(about = "Long-running daemon for scheduled engagement cycles")]
#[command(long_about = "\
cadence-run - Long-running daemon for scheduled engagement cycles

DESCRIPTION:
    cadence-run logs in once, then repeats an engagement cycle every
    30 minutes: view (and sometimes like) stories of followed accounts,
    like and comment on feed posts, follow and later unfollow a target
    account, and send a welcome message to new followers.

    Every action is paced with a random delay and capped by a per-cycle
    quota. Failures are retried after a long random backoff.

USAGE:
    # Dry run against a recorded account snapshot
    cadence-run --snapshot account.json

    # Single cycle, then exit
    cadence-run --snapshot account.json --once

ENVIRONMENT:
    CADENCE_USERNAME, CADENCE_PASSWORD   Account credentials (required)
    CADENCE_TARGET_ACCOUNT               Handle to follow and unfollow
    CADENCE_MESSAGED_STORE               Messaged-user file
                                         (default: ~/.local/share/cadence/messaged_users.txt)
    CADENCE_CHALLENGE_POLICY             block (default) or exit
    CADENCE_CONFIG                       TOML file with quotas and timing
    CADENCE_LOG_FORMAT                   text (default), json or pretty
    CADENCE_LOG_LEVEL                    Log level (default: info)

EXIT CODES:
    0 - Completed (only with --once)
    1 - Invalid credentials or unresolved verification challenge
    2 - Configuration or startup error
")]
struct Cli {
    /// JSON snapshot served by the bundled mock provider
    #[arg(long, value_name = "PATH")]
    snapshot: PathBuf,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let snapshot = Snapshot::from_path(&cli.snapshot)?;
    let provider = MockProvider::new(snapshot);

    info!(
        "cadence-run starting for {} (snapshot {})",
        config.credentials.username(),
        cli.snapshot.display()
    );
    if let Some(target) = &config.target_account {
        info!("Target account: {}", target);
    }

    let mut engine = Engine::from_config(config, provider)?;
    let max_cycles = if cli.once { Some(1) } else { None };
    engine.run(max_cycles).await?;

    info!("cadence-run finished");
    Ok(())
}
