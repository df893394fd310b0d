//! keyscout CLI - find primary-key candidates by counting duplicates
//!
//! Usage:
//!   keyscout table <table> [--schema <schema>] [--connection <name> | --sqlite <path>]
//!   keyscout schema [<schema>] [--connection <name> | --sqlite <path>]
//!   keyscout tables [<schema>] [--connection <name> | --sqlite <path>]
//!
//! Examples:
//!   keyscout --sqlite ./air.db table airport
//!   keyscout --connection air schema postgres_air --format json
//!   keyscout --connection air --max-columns 3 table booking_leg

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use keyscout::backend::{KeyBackend, QueryError, SqliteBackend, WorkerBackend};
use keyscout::config::{ConnectionConfig, ConnectionError, Settings, SettingsError};
use keyscout::worker::{WorkerClient, WorkerError};
use keyscout::{KeyCandidate, SearchReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyscout")]
#[command(about = "keyscout - discover primary-key candidates by counting duplicate rows")]
#[command(version)]
struct Cli {
    /// Named connection from the config file
    #[arg(short, long, global = true)]
    connection: Option<String>,

    /// Search a SQLite database file directly
    #[arg(long, global = true, conflicts_with = "connection")]
    sqlite: Option<PathBuf>,

    /// Config file (defaults to KEYSCOUT_CONFIG, ./keyscout.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Largest column combination to probe
    #[arg(long, global = true)]
    max_columns: Option<usize>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one table for key candidates
    Table {
        /// Table name
        table: String,

        /// Schema the table lives in (defaults to the connection's schema)
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Search every table of a schema
    Schema {
        /// Schema name (defaults to the connection's schema)
        schema: Option<String>,
    },

    /// List the tables of a schema
    Tables {
        /// Schema name (defaults to the connection's schema)
        schema: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One candidate per line
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// A connected backend and the schema to use when none is given.
struct Target {
    backend: Arc<dyn KeyBackend>,
    default_schema: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keyscout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    if cli.max_columns.is_some() {
        settings.search.max_key_columns = cli.max_columns;
    }

    let target = connect(&cli, &settings).await?;

    match cli.command {
        Commands::Table { table, schema } => {
            let schema = schema.unwrap_or(target.default_schema);
            cmd_table(target.backend, &schema, &table, &settings, cli.format).await
        }
        Commands::Schema { schema } => {
            let schema = schema.unwrap_or(target.default_schema);
            cmd_schema(target.backend, &schema, &settings, cli.format).await
        }
        Commands::Tables { schema } => {
            let schema = schema.unwrap_or(target.default_schema);
            for table in target.backend.list_tables(&schema).await? {
                println!("{}", table);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Resolve the connection from flags, config, or environment and open its backend.
async fn connect(cli: &Cli, settings: &Settings) -> Result<Target, CliError> {
    let (config, schema) = if let Some(path) = &cli.sqlite {
        (
            ConnectionConfig::sqlite(path.to_string_lossy()),
            "main".to_string(),
        )
    } else if let Some(name) = &cli.connection {
        let conn = settings.get_connection(name)?;
        (conn.resolve()?, conn.schema())
    } else if let Some((_, conn)) = settings.default_connection() {
        (conn.resolve()?, conn.schema())
    } else {
        let config = ConnectionConfig::from_env()?;
        let schema = config.driver.default_schema().to_string();
        (config, schema)
    };

    let backend: Arc<dyn KeyBackend> = if config.driver.is_in_process() {
        Arc::new(SqliteBackend::open(&config.connection_string)?)
    } else {
        let client = Arc::new(WorkerClient::spawn_with_settings(settings).await?);
        let dialect = config.driver.dialect();
        let backend = WorkerBackend::new(
            client.clone(),
            config.driver.as_str(),
            config.connection_string,
            dialect,
        );
        tracing::debug!(
            driver = backend.driver(),
            dialect = dialect.name(),
            timeout_secs = client.timeout().as_secs(),
            "using worker backend"
        );
        Arc::new(backend)
    };

    Ok(Target {
        backend,
        default_schema: schema,
    })
}

async fn cmd_table(
    backend: Arc<dyn KeyBackend>,
    schema: &str,
    table: &str,
    settings: &Settings,
    format: OutputFormat,
) -> Result<ExitCode, CliError> {
    let mut search = keyscout::start(backend, schema, table, &settings.search);
    let mut failure = None;

    loop {
        tokio::select! {
            Some(candidate) = search.results.recv() => print_candidate(&candidate, format)?,
            Some(error) = search.errors.recv() => failure = Some(error),
            else => break,
        }
    }

    match failure {
        Some(e) => {
            eprintln!("Search incomplete for {}.{}: {}", schema, table, e);
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

async fn cmd_schema(
    backend: Arc<dyn KeyBackend>,
    schema: &str,
    settings: &Settings,
    format: OutputFormat,
) -> Result<ExitCode, CliError> {
    let reports = keyscout::scan_schema(backend, schema, &settings.search).await?;

    let mut code = ExitCode::SUCCESS;
    for report in &reports {
        print_report(report, format)?;
        if let Some(e) = &report.error {
            eprintln!("Search incomplete for {}.{}: {}", schema, report.table, e);
            code = ExitCode::FAILURE;
        }
    }
    Ok(code)
}

fn print_report(report: &SearchReport, format: OutputFormat) -> Result<(), CliError> {
    if let OutputFormat::Text = format {
        if report.candidates.is_empty() {
            println!("{}: no candidates", report.table);
        }
    }
    for candidate in &report.candidates {
        print_candidate(candidate, format)?;
    }
    Ok(())
}

fn print_candidate(candidate: &KeyCandidate, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => println!("{}", candidate),
        OutputFormat::Json => println!("{}", serde_json::to_string(candidate)?),
    }
    Ok(())
}
