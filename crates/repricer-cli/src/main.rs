mod commands;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "repricer-cli")]
#[command(about = "Price batch operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one engine tick now instead of waiting for the scheduler
    Tick,
    /// Print the current job record and its completion projection
    Status,
    /// Cancel the current job by deleting its record
    Cancel,
    /// Print recent run log entries, oldest first
    Log {
        /// Number of entries to print
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = repricer_core::load_app_config()?;

    let pool_config = repricer_db::PoolConfig::from_app_config(&config);
    let pool = repricer_db::connect_pool(&config.database_url, pool_config).await?;
    let store = repricer_db::PgJobStore::new(pool, config.log_cap);

    match cli.command {
        Commands::Tick => commands::run_tick_once(&store, &config).await,
        Commands::Status => commands::print_status(&store, &config).await,
        Commands::Cancel => commands::cancel(&store).await,
        Commands::Log { limit } => commands::print_log(&store, limit).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_limit_defaults_to_fifty() {
        let cli = Cli::try_parse_from(["repricer-cli", "log"]).expect("parse");
        assert!(matches!(cli.command, Commands::Log { limit: 50 }));
    }

    #[test]
    fn log_limit_can_be_overridden() {
        let cli = Cli::try_parse_from(["repricer-cli", "log", "--limit", "25"]).expect("parse");
        assert!(matches!(cli.command, Commands::Log { limit: 25 }));
    }

    #[test]
    fn a_subcommand_is_required() {
        assert!(Cli::try_parse_from(["repricer-cli"]).is_err());
    }
}
