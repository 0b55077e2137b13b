//! CLI for refsheet - Convert tagged reference exports into spreadsheets.

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use refsheet::{
    default_output_path, load_export, project,
    profile::{builtin_profile_names, DEFAULT_PROFILE},
    resolve_profile, write_table, Dialect, OutputFormat,
};

/// Input read when no path is given.
const DEFAULT_INPUT: &str = "Amsterdam.txt";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Convert tagged reference exports (Key: value blocks) into spreadsheets
#[derive(Parser)]
#[command(name = "refsheet")]
#[command(version)]
#[command(after_help = "\
Examples:
  refsheet Amsterdam.txt
  refsheet export.txt -o letters.xlsx --profile endnote
  refsheet export.txt -o letters.csv --dialect double-blank-line
  cat export.txt | refsheet - -o letters.json
  refsheet --list-profiles")]
struct Cli {
    /// Input export file (use '-' for stdin)
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Output file (default: <input stem>_converted.xlsx next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Profile: builtin name (see --list-profiles) or path to a TOML profile
    #[arg(short, long, default_value = DEFAULT_PROFILE)]
    profile: String,

    /// Record boundary dialect: blank-line, double-blank-line or sentinel
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Field that starts a new record in the sentinel dialect
    #[arg(long)]
    sentinel: Option<String>,

    /// Output format: xlsx, csv or json (default: from the output extension)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// List builtin profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ---------------------------------------------------------------------------
// AppError: semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10: input file not found / unreadable
    InputFile(String),
    /// Exit 11: profile not found / invalid
    Profile(String),
    /// Exit 12: cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::Profile(_) => 11,
            AppError::OutputFile(_) => 12,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::Profile(msg) => {
                let names = builtin_profile_names().join(", ");
                write!(
                    f,
                    "{}\n  available builtin profiles: {}\n  hint: provide a path to a .toml profile, or use a builtin profile name",
                    msg, names
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and succeed; usage errors exit 1.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("refsheet={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), AppError> {
    if cli.list_profiles {
        list_profiles_command();
        return Ok(());
    }

    convert_command(cli)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Convert one export into one output table.
fn convert_command(cli: Cli) -> Result<(), AppError> {
    // 1. Resolve the profile and apply command-line overrides
    let mut profile = resolve_profile(&cli.profile)
        .map_err(|e| AppError::Profile(format!("'{}': {}", cli.profile, e)))?;
    if let Some(dialect) = cli.dialect {
        profile.parser.dialect = dialect;
    }
    if let Some(sentinel) = cli.sentinel {
        if sentinel.trim().is_empty() {
            return Err(AppError::Profile("the sentinel field must not be empty".to_string()));
        }
        profile.parser.sentinel = sentinel.trim().to_string();
    }

    // 2. Read the whole export
    let text = load_export(&cli.input)
        .map_err(|e| AppError::InputFile(format!("'{}': {}", cli.input.display(), e)))?;

    // 3. Parse records and project them onto the output columns
    let records = profile.parse(&text);
    if records.is_empty() {
        warn!(input = %cli.input.display(), "no records found");
    }
    let table = project(&records, &profile.projection);

    // 4. Pick the destination and its format
    let format = cli
        .format
        .or_else(|| cli.output.as_deref().and_then(OutputFormat::from_path))
        .unwrap_or_default();
    let output = cli
        .output
        .unwrap_or_else(|| default_output_path(&cli.input).with_extension(format.extension()));

    // 5. Write everything in one go
    write_table(&table, &output, format)
        .map_err(|e| AppError::OutputFile(format!("'{}': {}", output.display(), e)))?;

    info!(records = records.len(), dialect = %profile.parser.dialect, "conversion finished");
    println!(
        "Conversion complete. The records have been saved to '{}'.",
        output.display()
    );

    Ok(())
}

/// List available builtin profiles.
fn list_profiles_command() {
    for name in builtin_profile_names() {
        println!("{}", name);
    }
}
