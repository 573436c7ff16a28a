use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use dpatch::{
    apply_patch, EngineOptions, MatchPolicy, PatchRequest, PatchStatus,
    DEFAULT_SIMILARITY_THRESHOLD,
};
use env_logger::Builder;
use log::{info, warn, Level, LevelFilter};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);
    if let Err(e) = run(args) {
        // Using {:?} ensures the full error chain from `anyhow` is printed.
        eprintln!("{} {:?}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Defines the command-line arguments for the application.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Apply a unified diff to a text document and print the patched result.",
    long_about = "Applies a unified diff to a document. By default context lines are matched \
                  fuzzily so minor drift between the diff and the document is absorbed; with \
                  --strict every context line must match exactly and a target filename is required."
)]
struct Args {
    /// Path to the file containing the unified diff.
    diff_file: PathBuf,
    /// Path to the original document the diff applies to. Omit for new-file diffs.
    #[arg(short = 'O', long)]
    original: Option<PathBuf>,
    /// Filename to report in messages, overriding the diff's `+++ b/` target.
    #[arg(short = 'f', long)]
    filename: Option<String>,
    /// Use the strict engine: exact context matches and a mandatory filename.
    #[arg(long)]
    strict: bool,
    /// Similarity threshold for fuzzy context matching (0.0 to 1.0). Higher is stricter.
    #[arg(short = 't', long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    threshold: f32,
    /// Write the patched output to this file instead of stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Contains the primary logic of the application.
fn run(args: Args) -> Result<()> {
    if !(0.0..=1.0).contains(&args.threshold) {
        return Err(anyhow!("Similarity threshold must be between 0.0 and 1.0."));
    }

    let diff_text = fs::read_to_string(&args.diff_file)
        .with_context(|| format!("Failed to read diff file '{}'", args.diff_file.display()))?;
    let original_text = match &args.original {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read original file '{}'", path.display()))?,
        ),
        None => None,
    };

    let options = if args.strict {
        EngineOptions::strict()
    } else {
        EngineOptions {
            match_policy: MatchPolicy::Fuzzy {
                threshold: args.threshold,
            },
            require_filename: false,
        }
    };

    let request = PatchRequest {
        diff_text: &diff_text,
        original_text: original_text.as_deref(),
        filename: args.filename.as_deref(),
    };
    let result = apply_patch(&request, &options);

    // Messages go to stderr via the logger; stdout carries only the patched
    // output so it stays pipeable.
    match result.status {
        PatchStatus::Error => return Err(anyhow!(result.message)),
        PatchStatus::Warning => {
            for warning in &result.warnings {
                warn!("{}", warning);
            }
            warn!("{}", result.message);
        }
        PatchStatus::Success => info!("{}", result.message),
    }

    let output = result.output.unwrap_or_default();
    match &args.output {
        Some(path) => {
            fs::write(path, output)
                .with_context(|| format!("Failed to write output file '{}'", path.display()))?;
            info!("wrote patched output to '{}'", path.display());
        }
        None => {
            print!("{}", output);
            io::stdout().flush()?;
        }
    }

    Ok(())
}

/// Sets up the global logger with a colored per-level format.
fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace, // -vvv and higher
    };
    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();
}
