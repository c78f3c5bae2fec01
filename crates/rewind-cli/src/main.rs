use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rewind_core::{ExecutionContext, RunError, Runner, SqliteConfig, SqliteRepository, Wrapped};

#[derive(Parser)]
#[command(name = "rewind", about = "Durable, resumable task workflows")]
struct Cli {
    /// sqlx connection URL of the job database.
    #[arg(long, default_value = "sqlite://rewind.db")]
    db: String,

    #[arg(long, default_value = "1")]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo workflow; finished steps are skipped on re-run.
    Run {
        /// How long each `slp` step sleeps.
        #[arg(long, default_value = "1000")]
        sleep_ms: u64,
    },
    /// Print job counts by status.
    Status,
}

/// RUST_LOG で上書き可能（既定は info）
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// monster() = aa(0) + aa(1) + aa(2)
/// aa(id)    = x(10) + x(20)   （2 本は並行）
/// x(d)      = slp(); d
fn demo_workflow(runner: &Runner, sleep_ms: u64) -> Wrapped<(), u64> {
    let slp = runner.wrap("slp", move |_cx, (): ()| async move {
        sleep(Duration::from_millis(sleep_ms)).await;
        Ok(())
    });

    let x = runner.wrap("x", move |cx, d: u64| {
        let slp = slp.clone();
        async move {
            slp.call(&cx, ()).await?;
            Ok::<_, RunError>(d)
        }
    });

    let aa = runner.wrap("aa", move |cx, _id: u64| {
        let x = x.clone();
        async move {
            // 同時に await する分岐はそれぞれ fork したスタックで
            let left = cx.fork();
            let right = cx.fork();
            let (a, b) = tokio::join!(x.call(&left, 10), x.call(&right, 20));
            Ok::<_, RunError>(a? + b?)
        }
    });

    runner.wrap("monster", move |cx, (): ()| {
        let aa = aa.clone();
        async move {
            let mut total = 0;
            for id in 0..3 {
                total += aa.call(&cx, id).await?;
            }
            Ok::<_, RunError>(total)
        }
    })
}

async fn connect(cli: &Cli) -> Result<SqliteRepository> {
    let config = SqliteConfig {
        max_connections: cli.max_connections,
        ..SqliteConfig::new(&cli.db)
    };
    SqliteRepository::connect(&config)
        .await
        .with_context(|| format!("open job database {}", cli.db))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let repo = Arc::new(connect(&cli).await?);

    match cli.command {
        Commands::Run { sleep_ms } => {
            let runner = Runner::new(repo.clone());
            let monster = demo_workflow(&runner, sleep_ms);

            let outcome = monster.call(&ExecutionContext::root(), ()).await;
            match &outcome {
                Ok(total) => println!("monster() = {total}"),
                Err(e) => eprintln!("monster() failed: {e}"),
            }

            let counts = repo.counts_by_status().await?;
            info!(pending = counts.pending, done = counts.done, "jobs");
            repo.close().await;
            outcome?;
        }
        Commands::Status => {
            let counts = repo.counts_by_status().await?;
            println!("pending: {}", counts.pending);
            println!("done:    {}", counts.done);
            println!("total:   {}", counts.total());
            repo.close().await;
        }
    }

    Ok(())
}
