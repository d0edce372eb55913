//! Prerequisite check: which configured diagnostic binaries are missing.

use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::CommandsConfig;

/// A configured binary that could not be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCommand {
    pub command: String,
    pub package: &'static str,
}

/// Check every configured command against `$PATH`.
pub fn missing_commands(commands: &CommandsConfig) -> Vec<MissingCommand> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    missing_in(commands, &path)
}

/// Check every configured command against an explicit search path.
pub fn missing_in(commands: &CommandsConfig, search_path: &OsStr) -> Vec<MissingCommand> {
    let mut missing: Vec<MissingCommand> = Vec::new();
    for (command, package) in commands.required() {
        if find_executable(command, search_path).is_some() {
            continue;
        }
        if missing.iter().any(|m| m.command == command) {
            continue;
        }
        missing.push(MissingCommand {
            command: command.to_string(),
            package,
        });
    }
    missing
}

/// Resolve `command` like a shell would. Names containing `/` are taken as paths.
pub fn find_executable(command: &str, search_path: &OsStr) -> Option<PathBuf> {
    if command.contains('/') {
        let path = Path::new(command);
        return is_executable(path).then(|| path.to_path_buf());
    }
    std::env::split_paths(search_path)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Install hint lines for the packages behind `missing`.
pub fn install_hints(missing: &[MissingCommand]) -> Vec<String> {
    let mut packages: Vec<&str> = missing.iter().map(|m| m.package).collect();
    packages.sort_unstable();
    packages.dedup();

    let debian = packages.join(" ");
    let redhat = packages
        .iter()
        .map(|p| if *p == "procps" { "procps-ng" } else { p })
        .collect::<Vec<_>>()
        .join(" ");

    vec![
        format!("Please install the {} package(s):", packages.join(", ")),
        format!("  Ubuntu/Debian: sudo apt install {debian}"),
        format!("  RHEL/CentOS: sudo yum install {redhat}"),
    ]
}
