//! Age of Mythology: Retold replay (.mythrec) parser CLI.
//!
//! ## Commands
//!
//! - `parse` - Parse a replay to JSON
//! - `rename` - Rename every replay in a directory by player names
//! - `version` - Print the parser version

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mythrec_parser::rename::rename_rec_files;
use mythrec_parser::replay::{parse_file, ParseOptions, ReplayRecord};
use mythrec_parser::PARSER_VERSION;

/// Age of Mythology: Retold replay parser.
#[derive(Parser)]
#[command(name = "mythrec")]
#[command(about = "Parse and manipulate Age of Mythology: Retold .mythrec files")]
#[command(version)]
struct Cli {
    /// The input files carry an outer gzip wrap (.mythrec.gz).
    #[arg(long, global = true)]
    is_gzip: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parses a .mythrec file to human-readable JSON.
    Parse {
        /// Path to the replay file.
        file: PathBuf,

        /// Save the output JSON to the provided filepath.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quiet mode, no output to standard output.
        #[arg(short, long)]
        quiet: bool,

        /// Pretty print the output JSON.
        #[arg(long)]
        pretty_print: bool,

        /// Omit the formatted command list from the output.
        #[arg(long)]
        slim: bool,

        /// Compute per-player statistics.
        #[arg(long, conflicts_with = "slim")]
        stats: bool,
    },
    /// Renames all replays in a directory based on player names.
    ///
    /// Only files ending in .mythrec (or .mythrec.gz when --is-gzip is
    /// set) are renamed; everything else is ignored. Existing files
    /// with the target name are overwritten.
    Rename {
        /// Directory containing the replay files.
        directory: PathBuf,

        /// Prefix to add to renamed files.
        #[arg(long, default_value = "")]
        prefix: String,

        /// Suffix to add to renamed files (before the extension).
        #[arg(long, default_value = "")]
        suffix: String,
    },
    /// Prints the version of the parser.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse {
            file,
            output,
            quiet,
            pretty_print,
            slim,
            stats,
        } => cmd_parse(
            &file,
            output.as_deref(),
            quiet,
            pretty_print,
            ParseOptions {
                slim,
                stats,
                is_gzip: cli.is_gzip,
            },
        ),
        Commands::Rename {
            directory,
            prefix,
            suffix,
        } => cmd_rename(&directory, cli.is_gzip, &prefix, &suffix),
        Commands::Version => {
            println!("{PARSER_VERSION}");
            ExitCode::SUCCESS
        }
    }
}

fn cmd_parse(
    file: &Path,
    output: Option<&Path>,
    quiet: bool,
    pretty_print: bool,
    options: ParseOptions,
) -> ExitCode {
    if let Err(reason) = validate_input_path(file) {
        eprintln!("error with filepath: {reason}");
        return ExitCode::FAILURE;
    }

    let record = match parse_file(file, &options) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let json = match serialize_record(&record, pretty_print) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("error serializing record: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !quiet {
        println!("{json}");
    }

    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(output_path, &json) {
            eprintln!("error writing to file: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn serialize_record(record: &ReplayRecord, pretty_print: bool) -> serde_json::Result<String> {
    if pretty_print {
        serde_json::to_string_pretty(record)
    } else {
        serde_json::to_string(record)
    }
}

fn validate_input_path(file: &Path) -> Result<(), String> {
    if file.as_os_str().is_empty() {
        return Err("filepath is an empty string".to_string());
    }

    match std::fs::metadata(file) {
        Ok(info) if info.is_dir() => Err("filepath is a directory".to_string()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err("file does not exist".to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn cmd_rename(directory: &Path, is_gzip: bool, prefix: &str, suffix: &str) -> ExitCode {
    match std::fs::metadata(directory) {
        Ok(info) if info.is_dir() => {}
        _ => {
            eprintln!("error: '{}' is not a valid directory", directory.display());
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = rename_rec_files(directory, is_gzip, prefix, suffix) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
