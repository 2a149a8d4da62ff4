//! The operator-facing `judge` binary: one executable, three subcommands,
//! in the teacher's `codex-cli` "multitool dispatches to a per-role crate's
//! `run_main`" style (`Subcommand::Exec`/`Repl`/`Proto` there; `Serve`/
//! `Worker`/`Migrate` here).

use clap::Parser;
use clap::Subcommand;
use judge_core::config::Config;
use judge_core::store::PostgresStore;
use tracing_subscriber::EnvFilter;

/// The judge CLI.
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API (`judge-server`).
    Serve,
    /// Run a worker pool (`judge-worker`).
    Worker,
    /// Apply pending database migrations and exit.
    Migrate,
}

fn init_tracing() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();
}

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    init_tracing();
    match cli.command {
        Command::Serve => judge_server::run_main().await,
        Command::Worker => judge_worker::run_main().await,
        Command::Migrate => {
            let config = Config::from_env()?;
            let store = PostgresStore::connect(&config.database.url).await?;
            store.migrate().await?;
            tracing::info!("migrations applied");
            Ok(())
        }
    }
}
