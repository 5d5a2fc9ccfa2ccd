use certifica::config::DEFAULT_DATABASE_URL;
use certifica::db;
use certifica::loader::{self, ConflictPolicy};
use clap::Parser;
use std::path::PathBuf;

/// Import participant records from a CSV file with the columns
/// document_id, name, quality, category.
#[derive(Parser, Debug)]
#[command(name = "load_records", version, about)]
struct Cli {
    /// CSV file to import
    path: PathBuf,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// Keep existing records instead of overwriting them
    #[arg(long)]
    skip_existing: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certifica=info,load_records=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let policy = if cli.skip_existing {
        ConflictPolicy::SkipExisting
    } else {
        ConflictPolicy::Overwrite
    };

    let pool = db::create_pool(&cli.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    tracing::info!(path = %cli.path.display(), ?policy, "loading records");
    let summary = loader::load_csv(pool.as_ref(), &cli.path, policy).await?;
    tracing::info!(
        written = summary.written,
        skipped = summary.skipped,
        "records loaded"
    );

    Ok(())
}
