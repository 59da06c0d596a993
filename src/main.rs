use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sqlite_reader::{Database, PageLoading, ReaderConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

/// Inspect and query a SQLite database file without the SQLite library
#[derive(Parser, Debug)]
#[command(name = "sqlite-reader", version)]
struct Args {
    /// Path to the database file
    db_path: PathBuf,

    /// `.dbinfo`, `.tables`, `.indexes` or a SELECT statement
    command: String,

    /// When pages are read from disk
    #[arg(long, value_enum, default_value = "lazy", env = "SQLITE_READER_PAGE_LOADING")]
    page_loading: PageLoadingArg,

    /// Log decoding and query planning to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PageLoadingArg {
    /// Read each page the first time it is needed
    Lazy,
    /// Read and decode the whole file at open
    Eager,
}

impl From<PageLoadingArg> for PageLoading {
    fn from(arg: PageLoadingArg) -> Self {
        match arg {
            PageLoadingArg::Lazy => PageLoading::Lazy,
            PageLoadingArg::Eager => PageLoading::Eager,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("sqlite_reader=debug")
        } else {
            EnvFilter::new("sqlite_reader=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = ReaderConfig::default().with_page_loading(args.page_loading.into());
    let db = Database::open_with(&args.db_path, config)
        .with_context(|| format!("failed to open {}", args.db_path.display()))?;

    let stdout = std::io::stdout();
    commands::run_command(&db, &args.command, &mut stdout.lock())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
