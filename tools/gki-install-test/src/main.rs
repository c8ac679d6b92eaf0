// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: GKI APEX install compatibility runner
//! INTENT: Enumerate the artifact manifest and run every case against one adb device
//! DEPS: gki_install (protocol + adb backend), adb on PATH or via config
//! READINESS: Needs a booted device that carries the GKI APEX under test
//! TESTS: argument parsing; --list enumeration; invalid manifest exit path; report write errors
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gki_install::{AdbDevice, DirectoryResolver, Suite, SuiteConfig, SuiteReport};
use log::{error, info, LevelFilter};

#[derive(Parser, Debug)]
#[command(name = "gki-install-test")]
#[command(about = "Installs GKI test APEXes and checks downgrade protection", long_about = None)]
struct Cli {
    /// Newline-separated list of test APEX file names
    #[arg(long)]
    manifest: PathBuf,

    /// Directory holding the test APEXes; repeat to search several
    #[arg(long = "artifact-dir", required_unless_present = "list")]
    artifact_dirs: Vec<PathBuf>,

    /// Device serial (defaults to ANDROID_SERIAL, then the only attached device)
    #[arg(long, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// TOML file overriding timeouts, sentinel version or adb program
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only run cases whose name contains this string
    #[arg(long)]
    filter: Option<String>,

    /// Print the derived cases and exit without touching the device
    #[arg(long)]
    list: bool,

    /// Write the suite report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}

/// Returns `Ok(false)` when at least one case failed.
fn run(cli: &Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => SuiteConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SuiteConfig::default(),
    };

    let mut suite = Suite::load(&cli.manifest)
        .with_context(|| format!("enumerating {}", cli.manifest.display()))?;
    if let Some(pattern) = &cli.filter {
        suite = suite.filtered(pattern);
    }

    if cli.list {
        for case in suite.cases() {
            println!("{}\t{}\t{}", case.name(), case.package_name(), case.expected());
        }
        return Ok(true);
    }

    let resolver = DirectoryResolver::new(cli.artifact_dirs.iter().cloned());
    let mut device = AdbDevice::from_config(&config, cli.serial.clone());
    info!(
        "running {} cases on {}",
        suite.cases().len(),
        device.serial().unwrap_or("the attached device")
    );

    let mut report = suite.run(&mut device, &resolver, &config);
    report.serial = cli.serial.clone();
    for case in &report.cases {
        println!("{}", case.line());
    }
    println!("{}", report.summary());
    finish(&report, cli.json.as_deref())
}

/// Writes the optional JSON report. Case failures decide the result over a
/// failed write, so a failing run never exits as an invocation error.
fn finish(report: &SuiteReport, json: Option<&Path>) -> Result<bool> {
    if let Some(path) = json {
        if let Err(err) = write_report(path, report) {
            if report.is_success() {
                return Err(err);
            }
            error!("{err:#}");
        }
    }
    Ok(report.is_success())
}

fn write_report(path: &Path, report: &SuiteReport) -> Result<()> {
    let json = report.to_json_pretty().context("serializing report")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
