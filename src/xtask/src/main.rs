//! A build and test assist program. To show the usage, run
//!
//! ```shell
//! cargo xtask
//! ```

use std::{
    env::{self, consts::EXE_SUFFIX},
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, ensure};
use cargo::{Action, Package, Profile, cargo_run};
use clap::{Parser, Subcommand, ValueEnum};

mod cargo;

#[derive(Parser)]
#[command(author, about, long_about = None)]
struct Cli {
    /// Build with the release profile
    #[arg(short, long)]
    release: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the entire workspace, including the shared library
    Build,
    /// Run clippy for the entire workspace
    Clippy,
    /// Run the tests of the entire workspace
    Test,
    /// Build and run check_hv, failing unless this machine is as expected
    CheckEnv {
        /// What this machine is known to be
        #[arg(long, value_enum)]
        expect: Expectation,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Expectation {
    /// A virtual machine, such as a hosted CI runner
    Virtual,
    /// A physical machine without a hypervisor
    BareMetal,
}

impl Expectation {
    fn as_arg(self) -> &'static str {
        match self {
            Expectation::Virtual => "virtual",
            Expectation::BareMetal => "bare-metal",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let profile = if cli.release {
        Profile::Release
    } else {
        Profile::Debug
    };
    match cli.command {
        Commands::Build => build(profile),
        Commands::Clippy => clippy(),
        Commands::Test => test(profile),
        Commands::CheckEnv { expect } => check_env(expect, profile),
    }
}

fn build(profile: Profile) -> Result<()> {
    cargo_run(Action::Build, Package::Vmchecker, profile)?;
    cargo_run(Action::Build, Package::CheckHv, profile)
}

fn clippy() -> Result<()> {
    cargo_run(Action::Clippy, Package::Vmchecker, Profile::Debug)?;
    cargo_run(Action::Clippy, Package::CheckHv, Profile::Debug)?;
    cargo_run(Action::Clippy, Package::Xtask, Profile::Debug)
}

fn test(profile: Profile) -> Result<()> {
    cargo_run(Action::Test, Package::Vmchecker, profile)?;
    cargo_run(Action::Test, Package::CheckHv, profile)?;
    cargo_run(Action::Test, Package::Xtask, profile)
}

fn check_env(expect: Expectation, profile: Profile) -> Result<()> {
    build(profile)?;

    let check_hv = output_dir(profile)?.join(Package::CheckHv.name().to_owned() + EXE_SUFFIX);
    let status = Command::new(&check_hv)
        .args(["--expect", expect.as_arg()])
        .status()
        .with_context(|| format!("failed to run {}", check_hv.display()))?;
    ensure!(
        status.success(),
        "this machine is not {}: check_hv exited with {status}",
        expect.as_arg()
    );
    Ok(())
}

fn output_dir(profile: Profile) -> Result<PathBuf> {
    let target = target_dir(&project_root_dir()?, env::var_os("CARGO_TARGET_DIR"));
    let out_dir = target.join(profile.dir_name());
    fs::canonicalize(&out_dir).with_context(|| format!("{} does not exist", out_dir.display()))
}

// Cargo is always started from the project root, so a relative CARGO_TARGET_DIR
// is relative to it.
fn target_dir(root_dir: &Path, cargo_target_dir: Option<OsString>) -> PathBuf {
    match cargo_target_dir {
        Some(dir) if !dir.is_empty() => root_dir.join(dir),
        _ => root_dir.join("target"),
    }
}

fn project_root_dir() -> Result<PathBuf> {
    // Get the path to the xtask directory and resolve the workspace root, two
    // levels above it.
    let root_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .context("xtask is not located under <root>/src")?;
    Ok(fs::canonicalize(root_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_dir_holds_workspace_manifest() {
        let root = project_root_dir().unwrap();
        assert!(root.join("Cargo.toml").exists());
        assert!(root.join("src").join("xtask").exists());
    }

    #[test]
    fn target_dir_follows_cargo_target_dir() {
        let root = Path::new("/work/vmchecker");
        assert_eq!(target_dir(root, None), Path::new("/work/vmchecker/target"));
        assert_eq!(
            target_dir(root, Some(OsString::new())),
            Path::new("/work/vmchecker/target")
        );
        assert_eq!(
            target_dir(root, Some("build/out".into())),
            Path::new("/work/vmchecker/build/out")
        );
        assert_eq!(
            target_dir(root, Some("/tmp/cargo-target".into())),
            Path::new("/tmp/cargo-target")
        );
    }

    #[test]
    fn expectation_args_match_check_hv() {
        assert_eq!(Expectation::Virtual.as_arg(), "virtual");
        assert_eq!(Expectation::BareMetal.as_arg(), "bare-metal");
    }

    #[test]
    fn parse_check_env() {
        let cli = Cli::try_parse_from(["xtask", "--release", "check-env", "--expect", "virtual"])
            .unwrap();
        assert!(cli.release);
        assert!(matches!(
            cli.command,
            Commands::CheckEnv {
                expect: Expectation::Virtual
            }
        ));
        assert!(Cli::try_parse_from(["xtask", "check-env"]).is_err());
    }
}
