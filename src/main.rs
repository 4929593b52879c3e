use clap::{Args, Parser, Subcommand};
use colfrag::catalog::{SnapshotCatalog, SqlServerCatalog};
use colfrag::config::{DbConfig, DEFAULT_PORT};
use colfrag::inspector::{execute_commands, FragmentationInspector};
use colfrag::models::{Action, ActionOutput, ObjectFilter};
use colfrag::reporter::{ReportFormat, Reporter};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Column-store fragmentation analyzer - reports deleted-row fragmentation and generates REORGANIZE commands
#[derive(Parser, Debug)]
#[command(name = "colfrag")]
#[command(version = "0.1.0")]
#[command(about = "SQL Server column-store fragmentation analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "markdown", global = true)]
    format: ReportFormat,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Only indexes in this schema (exact match)
    #[arg(short = 's', long = "schema")]
    schema: Option<String>,

    /// Only indexes on this table (exact match)
    #[arg(short = 't', long = "table")]
    table: Option<String>,

    /// What to produce: report (0), fragmented (1) or commands (2)
    #[arg(short = 'a', long = "action", value_enum, default_value = "report")]
    action: Action,
}

impl FilterArgs {
    fn filter(&self) -> ObjectFilter {
        ObjectFilter::new(self.schema.clone(), self.table.clone())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a single SQL Server database
    Analyze {
        /// Database host
        #[arg(
            short = 'H',
            long = "host",
            env = "MSSQL_HOST",
            default_value = "localhost"
        )]
        host: String,

        /// Database port
        #[arg(long = "port", env = "MSSQL_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Database name
        #[arg(short = 'd', long = "database", env = "MSSQL_DATABASE")]
        database: String,

        /// Username
        #[arg(short = 'u', long = "username", env = "MSSQL_USER")]
        username: String,

        /// Password
        #[arg(short = 'p', long = "password", env = "MSSQL_PASSWORD")]
        password: String,

        /// Require TLS for the connection
        #[arg(long = "encrypt", default_value_t = false)]
        encrypt: bool,

        #[command(flatten)]
        filter: FilterArgs,

        /// Run the generated commands (compress pass, then final reorganize) instead of only printing them
        #[arg(long = "execute", default_value_t = false)]
        execute: bool,
    },
    /// Analyze multiple databases from a YAML config file
    Config {
        /// Path to YAML config file
        #[arg(short = 'c', long = "config")]
        config_path: String,
    },
    /// Analyze a catalog snapshot file (YAML or JSON) without connecting to a server
    Snapshot {
        /// Path to the snapshot file
        #[arg(long = "file")]
        path: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let reporter = Reporter::new(cli.format);

    match cli.command {
        Commands::Analyze {
            host,
            port,
            database,
            username,
            password,
            encrypt,
            filter,
            execute,
        } => {
            info!("Analyzing database: {}", database);
            let config = DbConfig::from_connection_params(
                host,
                port,
                database,
                username,
                password,
                encrypt,
                filter.schema,
                filter.table,
                filter.action,
                execute,
            )?;
            analyze_target(&config, &reporter).await?;
        }
        Commands::Config { config_path } => {
            info!("Loading config from: {}", config_path);
            let configs = DbConfig::from_config_file(&config_path)?;

            for config in configs {
                info!("Analyzing database: {}", config.database);
                analyze_target(&config, &reporter).await?;
            }
        }
        Commands::Snapshot { path, filter } => {
            info!("Loading catalog snapshot from: {}", path);
            let catalog = SnapshotCatalog::from_file(&path)?;
            let mut inspector = FragmentationInspector::new(catalog);
            let results = inspector.inspect(&filter.filter(), filter.action).await?;
            reporter.report(&results)?;
        }
    }

    Ok(())
}

async fn analyze_target(config: &DbConfig, reporter: &Reporter) -> anyhow::Result<()> {
    let catalog = SqlServerCatalog::connect(config, !config.execute).await?;
    let mut inspector = FragmentationInspector::new(catalog);
    let mut results = inspector.inspect(&config.filter(), config.action).await?;

    if config.execute {
        if let ActionOutput::Commands(rows) = &results.output {
            warn!(
                "Executing {} REORGANIZE commands against {}",
                rows.len() * 2,
                config.database
            );
            let mut catalog = inspector.into_provider();
            results.executed = execute_commands(&mut catalog, rows).await?;
        }
    }

    reporter.report(&results)?;
    Ok(())
}
