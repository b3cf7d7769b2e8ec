//! Command line front end for physical layout conversion.
//!
//! - json-to-dts: QMK-like JSON (bare key list or `layouts` mapping) to ZMK devicetree.
//! - dts-to-json: ZMK devicetree source to JSON.
//! - normalize: JSON to normalized JSON.
//! - shared: list the layouts defined by every `*.dtsi` below a directory.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use physical_layout::converter::shared_summary;
use physical_layout::{Converter, ConverterConfig, FileSink, LogLevel, Logger};

/// Log files are truncated once they grow past this size.
const LOG_FILE_MAX_BYTES: u64 = 1 << 20;

#[derive(Parser)]
#[command(name = "physlayout")]
#[command(author, version, about = "Convert keyboard physical layouts between JSON and ZMK devicetree")]
struct Cli {
    /// Append JSON-lines logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Include debug events in the log file
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert QMK-like JSON to ZMK devicetree source
    JsonToDts {
        /// Input file, `-` for stdin
        input: PathBuf,
        /// Output file, `-` or omitted for stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert ZMK devicetree source to QMK-like JSON
    DtsToJson {
        /// Input file, `-` for stdin
        input: PathBuf,
        /// Output file, `-` or omitted for stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Normalize QMK-like JSON so every layout starts at the origin
    Normalize {
        /// Input file, `-` for stdin
        input: PathBuf,
        /// Output file, `-` or omitted for stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List shared layouts found in a directory of `.dtsi` files
    Shared {
        /// Directory searched recursively
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let converter = Converter::new(build_config(&cli)?);

    match &cli.command {
        Commands::JsonToDts { input, output } => {
            let text = read_input(input)?;
            let dts = converter
                .json_to_dts(&text)
                .with_context(|| format!("converting {} to devicetree", input.display()))?;
            write_output(output.as_deref(), &dts)?;
        }
        Commands::DtsToJson { input, output } => {
            let text = read_input(input)?;
            let json = converter
                .dts_to_json(&text)
                .with_context(|| format!("converting {} to JSON", input.display()))?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Normalize { input, output } => {
            let text = read_input(input)?;
            let json = converter
                .normalize_json(&text)
                .with_context(|| format!("normalizing {}", input.display()))?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Shared { dir } => {
            let shared = converter
                .load_shared_layouts(dir)
                .with_context(|| format!("loading shared layouts from {}", dir.display()))?;
            let summary = serde_json::to_string_pretty(&shared_summary(&shared))?;
            write_output(None, &summary)?;
        }
    }

    converter.emit_metrics();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut config = ConverterConfig::default();
    if let Some(path) = cli.log_file.as_ref() {
        let sink = FileSink::new(path, LOG_FILE_MAX_BYTES)
            .with_context(|| format!("opening log file {}", path.display()))?;
        let level = if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        config = config.with_logger(Logger::new(sink).with_min_level(level));
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    let mut text = text.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    match path {
        Some(path) if path != Path::new("-") => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
