use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{LevelFilter, error, info};
use owo_colors::OwoColorize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use anyhow::{Context, Result};

use controlfreak::{
    diff_blocks, diff_files, hex_dump_file, Collection, ImageWriter, LogReporter,
};

/// cf – convert and merge Control Freak program files
#[derive(Parser)]
#[command(name = "cf", version, about = "Read, merge and write Control Freak .FA1 files", arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merges programs and alarms from .FA1 images and text files
    Merge {
        /// .FA1 images or text files, one program or alarm per line
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write a binary .FA1 image
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the text listing to a file as well
        #[arg(short, long)]
        text: Option<PathBuf>,

        /// Keep the input order instead of sorting
        #[arg(long)]
        no_sort: bool,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hex-dumps an image, block by block
    Dump {
        /// Path to the .FA1 file
        file: PathBuf,

        /// Bytes per line
        #[arg(long, default_value_t = 16, value_parser = parse_byte_range)]
        bytes: usize,
    },

    /// Byte-by-byte diff
    Diff {
        file_a: PathBuf,
        file_b: PathBuf,

        /// Show N bytes before/after mismatch
        #[arg(long, default_value_t = 8)]
        context: usize,
    },

    /// Diff per 256-byte block
    DiffBlocks {
        file_a: PathBuf,
        file_b: PathBuf,

        /// Max mismatched blocks to show
        #[arg(long, default_value_t = 10)]
        max: usize,
    },
}

/// Accepts a string, parses to usize, and enforces 1..=64
fn parse_byte_range(s: &str) -> Result<usize, String> {
    let val: usize = s
        .parse()
        .map_err(|_| format!("`{}` isn’t a number", s))?;
    if (1..=64).contains(&val) {
        Ok(val)
    } else {
        Err(format!("must be in range 1..=64 (got {})", val))
    }
}

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp(None)
        .parse_env(Env::new().filter("CONTROLFREAK_LOG"))
        .init();
}

fn merge(
    inputs: &[PathBuf],
    output: Option<PathBuf>,
    text: Option<PathBuf>,
    sort: bool,
    json: bool,
) -> Result<()> {
    let mut reporter = LogReporter;
    let mut merged = Collection::new();
    let mut failed = 0;

    for input in inputs {
        if let Err(e) = merged.load(input, &mut reporter) {
            error!("Skipping {:?}: {}", input, e);
            failed += 1;
        }
    }

    if sort {
        merged.sort();
    }

    let stdout = io::stdout();
    let mut lock = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut lock, &merged)?;
        writeln!(lock)?;
    } else {
        merged.write_text(&mut lock)?;
    }

    if let Some(path) = &text {
        let mut file = BufWriter::new(
            File::create(path).with_context(|| format!("Creating {:?}", path))?,
        );
        merged
            .write_text(&mut file)
            .and_then(|_| file.flush())
            .with_context(|| format!("Writing {:?}", path))?;
        info!("Wrote {:?}", path);
    }

    if let Some(path) = &output {
        if merged.check_capacity(&mut reporter) {
            let mut image = ImageWriter::create(path)
                .with_context(|| format!("Creating {:?}", path))?;
            merged
                .write_image(&mut image)
                .with_context(|| format!("Writing {:?}", path))?;
            eprintln!("{}", format!("Wrote {:?}", path).green());
        } else {
            error!("Not writing {:?}", path);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs could not be read", failed, inputs.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.cmd {
        Command::Merge { inputs, output, text, no_sort, json } => {
            drop(out);
            merge(&inputs, output, text, !no_sort, json)?;
        }

        Command::Dump { file, bytes } => {
            hex_dump_file(&mut out, &file, bytes)
                .with_context(|| format!("Dumping {:?}", file))?;
        }

        Command::Diff { file_a, file_b, context } => {
            diff_files(&mut out, &file_a, &file_b, context)?;
        }

        Command::DiffBlocks { file_a, file_b, max } => {
            diff_blocks(&mut out, &file_a, &file_b, max)?;
        }
    }

    Ok(())
}
