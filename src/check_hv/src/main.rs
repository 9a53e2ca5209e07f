//! The hypervisor checker.
//!
//! ```text
//! > check_hv --expect virtual
//! Executing CPUID(0x1) on all logical processors
//! CPU 0: hypervisor present
//! CPU 1: hypervisor present
//! CPU 2: hypervisor present
//! CPU 3: hypervisor present
//! Environment: virtual
//! ```

use std::fmt;

use anyhow::{Context, Result, ensure};
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use vmchecker::{DetectError, HypervisorDetector};

#[derive(Parser)]
#[command(author, about, long_about = None)]
struct Cli {
    /// Fail unless every processor reports this environment
    #[arg(long, value_enum)]
    expect: Option<Environment>,

    /// Check only the processor this program happens to run on
    #[arg(long)]
    current_only: bool,

    /// Increase the log level (-v, -vv, -vvv). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Environment {
    /// Running under a hypervisor
    Virtual,
    /// Running directly on the hardware
    BareMetal,
}

impl From<bool> for Environment {
    fn from(hypervisor_present: bool) -> Self {
        if hypervisor_present {
            Self::Virtual
        } else {
            Self::BareMetal
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Virtual => "virtual",
            Self::BareMetal => "bare metal",
        })
    }
}

/// The outcome of the check on a single logical processor.
#[derive(Debug)]
struct ProcessorReport {
    /// `None` when the thread was not pinned to any particular processor.
    cpu: Option<usize>,
    result: Result<bool, DetectError>,
}

impl ProcessorReport {
    /// Collapses the result the same way [`HypervisorDetector::is_hypervisor`]
    /// does.
    fn environment(&self) -> Environment {
        Environment::from(self.result.unwrap_or(false))
    }
}

impl fmt::Display for ProcessorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cpu {
            Some(id) => write!(f, "CPU{id:2}: ")?,
            None => f.write_str("CPU ?: ")?,
        }
        match &self.result {
            Ok(true) => f.write_str("hypervisor present"),
            Ok(false) => f.write_str("no hypervisor"),
            Err(e) => write!(f, "unknown ({e})"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let detector = HypervisorDetector::new();
    let reports = if cli.current_only {
        println!("Executing CPUID(0x1) on the current logical processor");
        vec![ProcessorReport {
            cpu: None,
            result: detector.try_detect(),
        }]
    } else {
        println!("Executing CPUID(0x1) on all logical processors");
        check_all_processors(&detector)?
    };
    for report in &reports {
        println!("{report}");
    }

    let environment = summarize(&reports);
    match environment {
        Some(environment) => println!("Environment: {environment}"),
        None => {
            log::warn!("Logical processors disagree on the hypervisor present bit");
            println!("Environment: inconsistent");
        }
    }

    if let Some(expected) = cli.expect {
        ensure!(
            environment == Some(expected),
            "expected the {expected} environment, but it is {}",
            environment.map_or_else(|| "inconsistent".to_string(), |e| e.to_string())
        );
    }
    Ok(())
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Runs the check on each logical processor one by one.
fn check_all_processors(detector: &HypervisorDetector) -> Result<Vec<ProcessorReport>> {
    let core_ids =
        core_affinity::get_core_ids().context("failed to enumerate logical processors")?;
    log::info!("Found {} logical processors", core_ids.len());

    core_ids
        .into_iter()
        .map(|core_id| {
            ensure!(
                core_affinity::set_for_current(core_id),
                "failed to run on CPU {}",
                core_id.id
            );
            log::debug!("Running on CPU {}", core_id.id);
            Ok(ProcessorReport {
                cpu: Some(core_id.id),
                result: detector.try_detect(),
            })
        })
        .collect()
}

/// Returns the environment all processors agree on, or `None` if they do not.
fn summarize(reports: &[ProcessorReport]) -> Option<Environment> {
    let (first, rest) = reports.split_first()?;
    let environment = first.environment();
    rest.iter()
        .all(|report| report.environment() == environment)
        .then_some(environment)
}
