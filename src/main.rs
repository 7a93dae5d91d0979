//! niidiff command line tool.
//!
//! Prints a fixed-width table of the header fields that differ among two
//! or more NIfTI files, followed by a single voxel-data comparison line.
//!
//! Exit codes follow a documented contract: `1` means the comparison
//! completed (regardless of whether differences were found; callers must
//! not read it as pass/fail), `2` means a usage or runtime failure.

use clap::Parser;
use niidiff::diff::{data_diff, headers_diff, FieldSelection};
use niidiff::nifti;
use niidiff::Result;
use std::io::Write;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(
    name = "niidiff",
    version,
    about = "Quick summary of the differences among a set of neuroimaging files",
    after_help = "Exit codes: 1 = comparison completed (not an error), \
                  2 = usage or runtime failure."
)]
struct Cli {
    /// Make more noise. May be given multiple times; loader compliance
    /// warnings appear at -vvv
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Comma-separated header fields to compare, or "all" for every field
    /// present in the first file's header
    #[arg(
        short = 'H',
        long = "header-fields",
        default_value = "all",
        value_name = "FIELDS"
    )]
    header_fields: String,

    /// Files to compare (at least two)
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.files.len() < 2 {
        eprintln!("Error: please provide at least two files to compare");
        process::exit(2);
    }

    match run(&cli) {
        // "Comparison completed"; historically nonzero, kept for callers
        // that depend on it.
        Ok(()) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let images = cli
        .files
        .iter()
        .map(nifti::load)
        .collect::<Result<Vec<_>>>()?;

    let selection = FieldSelection::parse(&cli.header_fields);
    let header_diff = headers_diff(&images, &selection)?;
    let data_differs = data_diff(&images);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    niidiff::report::write_report(&mut out, &cli.files, &header_diff, data_differs)?;
    out.flush()?;
    Ok(())
}

/// Thread the verbosity count into the logger configuration. Loader
/// compliance warnings are suppressed below three `-v`s.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0..=2 => log::LevelFilter::Error,
        3 => log::LevelFilter::Warn,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}
