use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use doorstep_lib::{db, logging, migrate};

#[derive(Parser)]
#[command(name = "migrate", about = "Doorstep migration helper")]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, value_name = "PATH")]
    db: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List migrations and show applied/pending
    List,
    /// Apply pending migrations
    Up,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let pool = db::open_sqlite_pool(&cli.db).await?;

    match cli.cmd {
        Cmd::List => {
            for (version, applied) in migrate::migration_status(&pool).await? {
                let marker = if applied { "applied" } else { "pending" };
                println!("{marker:>8}  {version}");
            }
        }
        Cmd::Up => {
            migrate::apply_migrations(&pool).await?;
            println!("migrations up to date");
        }
    }

    pool.close().await;
    Ok(())
}
