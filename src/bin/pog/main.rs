//! `pog`: validate and build pyramidal cloud-optimized GeoTIFFs.

mod args;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pog::batch::BatchRunner;
use pog::compliance::{check, ComplianceOptions};
use pog::errors::PogError;
use pog::pipeline::{make_pyramid_compliant, PipelineConfig, Stage};
use pog::progress::LogProgress;
use pog::pyramid::{Compression, PixelType, PyramidLevel};
use pog::validate::{validate, ValidateOptions};
use pog::GdalEngine;

use args::{Cli, Command, FullCheckArg};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Validate {
            path,
            quiet,
            full_check,
        } => run_validate(&path, quiet, full_check),
        Command::Check {
            path,
            exhaustive,
            quiet,
        } => run_check(&path, exhaustive, quiet),
        Command::Convert {
            input,
            output,
            pixel_type,
            no_data_floor,
            compression,
            skip,
        } => run_convert(
            &input,
            output.as_deref(),
            pixel_type,
            no_data_floor,
            compression,
            &skip,
        ),
        Command::Batch { jobs, paths } => run_batch(jobs, &paths),
        Command::Levels => {
            print_levels();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_validate(path: &Path, quiet: bool, full_check: FullCheckArg) -> Result<ExitCode> {
    let options = ValidateOptions {
        full_check: full_check.into(),
        ..ValidateOptions::default()
    };
    let report = match validate(path, &options) {
        Ok(report) => report,
        Err(
            e @ (PogError::NotFound { .. }
            | PogError::NotAContainer { .. }
            | PogError::Unreadable { .. }),
        ) => {
            if !quiet {
                eprintln!("{e}");
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).with_context(|| format!("validating {}", path.display())),
    };

    if !quiet {
        print!("{report}");
        if report.is_valid() {
            println!("{} is a valid cloud optimized GeoTIFF", path.display());
        }
    }
    Ok(exit_code(report.is_valid()))
}

fn run_check(path: &Path, exhaustive: bool, quiet: bool) -> Result<ExitCode> {
    let options = if exhaustive {
        ComplianceOptions::exhaustive()
    } else {
        ComplianceOptions::default()
    };
    let report = check(&GdalEngine::default(), path, &options)
        .with_context(|| format!("checking {}", path.display()))?;

    if !quiet {
        for warning in &report.warnings {
            println!("warning: {warning}");
        }
        for finding in &report.findings {
            println!("{finding}");
        }
        match report.level {
            Some(level) if report.is_compliant() => {
                println!("{} is pyramid compliant at {level}", path.display())
            }
            _ => println!("{} is not pyramid compliant", path.display()),
        }
    }
    Ok(exit_code(report.is_compliant()))
}

fn run_convert(
    input: &Path,
    output: Option<&Path>,
    pixel_type: Option<PixelType>,
    no_data_floor: Option<f64>,
    compression: Compression,
    skip: &[Stage],
) -> Result<ExitCode> {
    let mut config = PipelineConfig {
        pixel_type,
        no_data_floor,
        compression,
        ..PipelineConfig::default()
    };
    for stage in skip {
        config.stages.remove(stage.flag());
    }

    let artifact = make_pyramid_compliant(
        &GdalEngine::default(),
        input,
        output,
        &config,
        &mut LogProgress::new(),
    )
    .with_context(|| format!("converting {}", input.display()))?;
    println!("{}", artifact.path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_batch(jobs: usize, paths: &[PathBuf]) -> Result<ExitCode> {
    let runner = BatchRunner::current_exe(jobs).context("locating the pog executable")?;
    let outcomes = runner.run(paths);
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.succeeded()).collect();
    for outcome in &failed {
        eprintln!("failed: {}", outcome.path.display());
    }
    println!(
        "{} of {} files converted",
        outcomes.len() - failed.len(),
        outcomes.len()
    );
    Ok(exit_code(failed.is_empty()))
}

fn print_levels() {
    println!(
        "{:>8}  {:>22}  {:>18}  overviews",
        "arcsec", "cell size (deg)", "shape"
    );
    for level in PyramidLevel::ALL {
        let (cols, rows) = level.shape();
        let ladder: Vec<String> = level
            .overview_ladder()
            .iter()
            .map(|f| f.to_string())
            .collect();
        println!(
            "{:>8}  {:>22.17}  {:>18}  {}",
            level.arcseconds(),
            level.cell_size(),
            format!("{cols} x {rows}"),
            if ladder.is_empty() {
                "-".to_string()
            } else {
                ladder.join(" ")
            }
        );
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
