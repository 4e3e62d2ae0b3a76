use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueHint};
use pdf_recompress::RecompressError;
use pdf_recompress::config::{Brightness, RecompressConfig};
use pdf_recompress::observability::log_snapshot;
use pdf_recompress::pipeline::PipelineExecutor;
use pdf_recompress::report::RunReport;
use pdf_recompress::tools::SystemRunner;
use pdf_recompress::validation::validate_config;
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = configure_tracing() {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<RecompressError>()
                .map(RecompressError::exit_code)
                .unwrap_or(1);
            eprintln!("error: {err:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    let report = validate_config(&config);
    for warning in &report.warnings {
        warn!("{warning}");
    }
    if !report.is_ok() {
        for error_msg in &report.errors {
            error!("{error_msg}");
        }
        bail!(
            "Configuration invalid with {} error(s): {}",
            report.errors.len(),
            report.errors.join("; ")
        );
    }

    let brightness = config.brightness.to_string();
    let executor = PipelineExecutor::new(config, Box::new(SystemRunner));

    if cli.dry_run {
        let config = executor.config();
        info!(
            input = %cli.input.display(),
            output = %cli.output.display(),
            stages = ?executor.stage_names(),
            brightness = config.brightness.as_str(),
            min_image_bytes = config.min_image_bytes,
            preserve_jpeg = config.extraction.preserve_jpeg,
            "Dry run; no tools invoked"
        );
        return Ok(());
    }

    let result = executor.execute(&cli.input, &cli.output)?;
    let snapshot = executor.metrics().snapshot();

    if cli.print_metrics {
        log_snapshot(&snapshot);
    }

    if let Some(path) = &cli.metrics_json {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create metrics directory: {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
        to_writer_pretty(file, &snapshot)
            .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
        info!(metrics = %path.display(), "Metrics JSON written");
    }

    if let Some(path) = &cli.report {
        let run_report = RunReport::build(&result, &brightness, snapshot)?;
        run_report.write(path)?;
        info!(report = %path.display(), "Run report written");
    }

    info!(
        output = %result.output.display(),
        pages = result.pages.len(),
        skipped = result.skipped.len(),
        "Recompression completed"
    );
    Ok(())
}

/// Profile values first, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<RecompressConfig> {
    let mut config = match &cli.config {
        Some(path) => RecompressConfig::load(path)?,
        None => RecompressConfig::default(),
    };
    if let Some(brightness) = &cli.brightness {
        config.brightness = brightness.clone();
    }
    if let Some(min_size) = cli.min_size {
        config.min_image_bytes = min_size;
    }
    if cli.no_preserve_jpeg {
        config.extraction.preserve_jpeg = false;
    }
    Ok(config)
}

#[derive(Parser)]
#[command(
    name = "pdf-recompress",
    version,
    about = "Recompress a PDF file consisting of images as bilevel CCITT G4 pages"
)]
struct Cli {
    #[arg(value_name = "INPUT", help = "input PDF", value_hint = ValueHint::FilePath)]
    input: PathBuf,
    #[arg(value_name = "OUTPUT", help = "output PDF", value_hint = ValueHint::FilePath)]
    output: PathBuf,
    #[arg(
        short,
        long,
        allow_hyphen_values = true,
        help = "change image brightness [default: 0]"
    )]
    brightness: Option<Brightness>,
    #[arg(
        long = "min-size",
        value_name = "BYTES",
        help = "skip extracted images smaller than this [default: 100000]"
    )]
    min_size: Option<u64>,
    #[arg(long = "no-preserve-jpeg", help = "decode JPEG images during extraction")]
    no_preserve_jpeg: bool,
    #[arg(long, value_name = "FILE", help = "YAML profile")]
    config: Option<PathBuf>,
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    print_metrics: bool,
    #[arg(long = "metrics-json", value_name = "FILE")]
    metrics_json: Option<PathBuf>,
    #[arg(long, value_name = "FILE", help = "write a JSON run report")]
    report: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_brightness_is_accepted() {
        let cli =
            Cli::try_parse_from(["pdf-recompress", "in.pdf", "out.pdf", "-b", "-0.2"]).unwrap();
        assert_eq!(cli.brightness.unwrap().as_str(), "-0.2");
    }

    #[test]
    fn flags_override_profile_defaults() {
        let cli = Cli::try_parse_from([
            "pdf-recompress",
            "in.pdf",
            "out.pdf",
            "--min-size",
            "0",
            "--no-preserve-jpeg",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.min_image_bytes, 0);
        assert!(!config.extraction.preserve_jpeg);
        assert_eq!(config.brightness.as_str(), "0");
    }

    #[test]
    fn non_numeric_brightness_is_rejected() {
        let parsed = Cli::try_parse_from(["pdf-recompress", "in.pdf", "out.pdf", "-b", "dim"]);
        assert!(parsed.is_err());
    }
}
