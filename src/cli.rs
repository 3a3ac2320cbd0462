use crate::config::{Config, ReaderConfig, load_config};
use crate::graph_dump::write_graph_dump;
use crate::host::Canvas;
use crate::reader::{LoadReport, Reader};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "figload", version, about = "Load a persisted figure document into a graph")]
pub struct Args {
    /// Input document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the JSON graph dump. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    /// Fail on forward references and on broken group assignments
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.strict {
        config.reader = ReaderConfig {
            type_aliases: config.reader.type_aliases,
            ..ReaderConfig::strict()
        };
    }
    debug!(strict = args.strict; "Configuration loaded");

    let input = read_input(args.input.as_deref())?;
    let (canvas, report) = load(&input, config)?;
    print_summary(&report);

    write_graph_dump(args.output.as_deref(), &canvas, &report.diagnostics)?;
    if let Some(path) = &args.output {
        info!(path:? = path; "Graph dump written");
    }
    Ok(())
}

/// Loads `input` into a fresh canvas configured by `config`.
pub fn load(input: &str, config: Config) -> Result<(Canvas, LoadReport)> {
    let Config { reader, crossing } = config;
    let reader = Reader::new()
        .with_config(reader)
        .context("invalid reader configuration")?;
    let mut canvas = Canvas::with_crossing_config(crossing);
    let report = reader.unmarshal_with_report(&mut canvas, input)?;
    Ok((canvas, report))
}

fn print_summary(report: &LoadReport) {
    if report.is_clean() {
        eprintln!("loaded {} figures", report.figures.len());
        return;
    }
    eprintln!(
        "loaded {} figures, {} records failed:",
        report.figures.len(),
        report.diagnostics.len()
    );
    for diagnostic in &report.diagnostics {
        eprintln!(
            "  #{} {} '{}' ({:?}): {}",
            diagnostic.index,
            diagnostic.type_name,
            diagnostic.id,
            diagnostic.phase,
            diagnostic.error
        );
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
