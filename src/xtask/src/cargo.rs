use std::{env, process::Command};

use anyhow::{Result, ensure};

use crate::project_root_dir;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Action {
    Build,
    Clippy,
    Test,
}

impl Action {
    fn subcommand(self) -> &'static str {
        match self {
            Action::Build => "build",
            Action::Clippy => "clippy",
            Action::Test => "test",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Package {
    Vmchecker,
    CheckHv,
    Xtask,
}

impl Package {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Package::Vmchecker => "vmchecker",
            Package::CheckHv => "check_hv",
            Package::Xtask => "xtask",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Profile {
    Debug,
    Release,
}

impl Profile {
    pub(crate) fn dir_name(self) -> &'static str {
        match self {
            Profile::Debug => "debug",
            Profile::Release => "release",
        }
    }
}

pub(crate) fn cargo_run(action: Action, package: Package, profile: Profile) -> Result<()> {
    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut command = Command::new(cargo);
    let _ = command.args(cargo_args(action, package, profile));
    let ok = command.current_dir(project_root_dir()?).status()?.success();
    ensure!(ok, "cargo {} failed", action.subcommand());
    Ok(())
}

fn cargo_args(action: Action, package: Package, profile: Profile) -> Vec<&'static str> {
    let mut args = vec![action.subcommand(), "--package", package.name()];
    if profile == Profile::Release {
        args.push("--release");
    }
    args
}
