//! Rowport command line tool
//!
//! Builds parameterized queries from filter/sort/page descriptors and checks
//! CSV or workbook files against a table schema before they are imported.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rowport_core::RowportSettings;
use rowport_interchange::Delimiter;

#[derive(Parser)]
#[command(name = "rowport")]
#[command(about = "Safe query building and bulk data exchange for relational tables")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to <config dir>/rowport/settings.toml)
    #[arg(long, global = true, env = "ROWPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write JSON logs to <data dir>/rowport/logs
    #[arg(long, global = true)]
    pub json_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the SQL and parameters for a filtered, sorted, paged SELECT
    Query(QueryArgs),
    /// Show the columns and first rows of a CSV or workbook file
    Inspect(InspectArgs),
    /// Check a file against a table schema without writing anything
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct QueryArgs {
    /// Table schema as JSON
    #[arg(long)]
    pub schema: PathBuf,

    /// SQL dialect: sqlite, postgres, mysql or mssql
    #[arg(long, default_value = "sqlite")]
    pub dialect: String,

    /// Column to select; repeat for several (default: all)
    #[arg(long = "column")]
    pub columns: Vec<String>,

    /// Filter as column:operator[:value], e.g. name:startsWith:Jo*
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Sort as column:asc or column:desc
    #[arg(long)]
    pub sort: Option<String>,

    /// 1-based page number
    #[arg(long, requires = "page_size")]
    pub page: Option<u64>,

    /// Rows per page
    #[arg(long)]
    pub page_size: Option<u64>,

    /// Build the COUNT(*) query instead
    #[arg(long)]
    pub count: bool,
}

#[derive(Args)]
pub struct FileArgs {
    /// CSV, xlsx, xls or ods file
    pub file: PathBuf,

    /// Worksheet to read from a workbook with several sheets
    #[arg(long)]
    pub sheet: Option<String>,

    /// CSV delimiter (detected when omitted)
    #[arg(long, value_enum)]
    pub delimiter: Option<DelimiterArg>,

    /// The first row is data, not column names
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub file: FileArgs,

    /// Number of rows to preview
    #[arg(long, default_value = "10")]
    pub rows: usize,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub file: FileArgs,

    /// Table schema as JSON
    #[arg(long)]
    pub schema: PathBuf,

    /// Column mapping as JSON (default: match names ignoring case)
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// Decide from the first row whether it holds column names
    #[arg(long, conflicts_with = "no_header")]
    pub infer_header: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DelimiterArg {
    Comma,
    Semicolon,
    Tab,
}

impl From<DelimiterArg> for Delimiter {
    fn from(arg: DelimiterArg) -> Self {
        match arg {
            DelimiterArg::Comma => Delimiter::Comma,
            DelimiterArg::Semicolon => Delimiter::Semicolon,
            DelimiterArg::Tab => Delimiter::Tab,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let _log_guard = logging::init(&logging::LoggingConfig {
        verbosity: cli.verbose,
        log_dir: cli.json_log.then(logging::log_directory),
    })?;

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Query(args) => commands::query(&args),
        Command::Inspect(args) => commands::inspect(&args, &settings),
        Command::Validate(args) => commands::validate(&args, &settings),
    }
}

fn load_settings(path: Option<&std::path::Path>) -> anyhow::Result<RowportSettings> {
    RowportSettings::load_or_default(path).context("Failed to load settings")
}
