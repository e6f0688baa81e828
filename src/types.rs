//! Core types shared by the prober, resolver, executor and orchestrator

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Operating system family, as classified by the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    Darwin,
    Windows,
    Unknown,
}

impl OsFamily {
    pub const ALL: [OsFamily; 4] = [
        OsFamily::Linux,
        OsFamily::Darwin,
        OsFamily::Windows,
        OsFamily::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Darwin => "darwin",
            OsFamily::Windows => "windows",
            OsFamily::Unknown => "unknown",
        }
    }
}

/// System package manager found on a Linux host
///
/// `NotApplicable` is reported for every non-Linux family; `None` means a
/// Linux host where no supported package manager was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Pacman,
    Apt,
    None,
    NotApplicable,
}

impl PackageManager {
    pub const ALL: [PackageManager; 4] = [
        PackageManager::Pacman,
        PackageManager::Apt,
        PackageManager::None,
        PackageManager::NotApplicable,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PackageManager::Pacman => "pacman",
            PackageManager::Apt => "apt",
            PackageManager::None => "none",
            PackageManager::NotApplicable => "n/a",
        }
    }
}

/// What the prober learned about the host. Built once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostProfile {
    pub os_family: OsFamily,
    pub package_manager: PackageManager,
}

impl HostProfile {
    pub fn new(os_family: OsFamily, package_manager: PackageManager) -> Self {
        Self {
            os_family,
            package_manager,
        }
    }
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.os_family.label(),
            self.package_manager.label()
        )
    }
}

/// A single external command: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// `sh -c <script>`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Wrap the command in a privilege-escalation program (e.g. `sudo`).
    /// `None` or an empty string leaves the command untouched.
    pub fn elevated(self, privilege: Option<&str>) -> Self {
        match privilege.map(str::trim) {
            Some(p) if !p.is_empty() => {
                let mut args = Vec::with_capacity(self.args.len() + 1);
                args.push(self.program);
                args.extend(self.args);
                Self {
                    program: p.to_string(),
                    args,
                    cwd: self.cwd,
                }
            }
            _ => self,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        format!("'{}'", s.replace('\'', r"'\''"))
    } else {
        s.to_string()
    }
}

/// Kind of install action produced by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    InstallToolchain,
    UpdatePackageIndex,
    InstallNativePackages,
    /// Terminal: the run must end with the action's message and exit 1
    ExitUnsupported,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::InstallToolchain => "toolchain install",
            ActionKind::UpdatePackageIndex => "package index update",
            ActionKind::InstallNativePackages => "native packages",
            ActionKind::ExitUnsupported => "unsupported environment",
        }
    }
}

/// One step of the install plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAction {
    pub kind: ActionKind,
    /// Human-readable one-liner shown while the action runs
    pub summary: String,
    /// Commands run in order; the first non-zero exit fails the action
    pub commands: Vec<CommandSpec>,
    /// Directory prepended to PATH for later steps once this action succeeds
    pub provides_path: Option<PathBuf>,
    /// Executable whose presence means the action has nothing to do
    pub skip_if_present: Option<String>,
    /// Manual instructions carried by `ExitUnsupported`
    pub message: Option<String>,
}

impl InstallAction {
    pub fn new(kind: ActionKind, summary: impl Into<String>, commands: Vec<CommandSpec>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            commands,
            provides_path: None,
            skip_if_present: None,
            message: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ActionKind::ExitUnsupported,
            summary: ActionKind::ExitUnsupported.label().to_string(),
            commands: Vec::new(),
            provides_path: None,
            skip_if_present: None,
            message: Some(message),
        }
    }

    pub fn providing_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.provides_path = Some(dir.into());
        self
    }

    pub fn skip_if_present(mut self, executable: impl Into<String>) -> Self {
        self.skip_if_present = Some(executable.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == ActionKind::ExitUnsupported
    }
}

/// Environment changes made by earlier steps, threaded explicitly into
/// later ones instead of mutating the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDelta {
    path_prepend: Vec<PathBuf>,
}

impl EnvDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prepend_path(dir);
        self
    }

    /// Put `dir` at the front of the search path. Re-adding moves it forward.
    pub fn prepend_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.path_prepend.retain(|p| p != &dir);
        self.path_prepend.insert(0, dir);
    }

    pub fn path_entries(&self) -> &[PathBuf] {
        &self.path_prepend
    }

    pub fn contains_path(&self, dir: &Path) -> bool {
        self.path_prepend.iter().any(|p| p == dir)
    }

    pub fn is_empty(&self) -> bool {
        self.path_prepend.is_empty()
    }

    /// The PATH value to hand to a child process, built from `base`.
    /// Returns `None` when there is nothing to change or an entry cannot be
    /// represented in PATH.
    pub fn path_value(&self, base: Option<&OsStr>) -> Option<OsString> {
        if self.is_empty() {
            return None;
        }
        let inherited = base
            .map(|b| std::env::split_paths(b).collect::<Vec<_>>())
            .unwrap_or_default();
        let entries = self
            .path_prepend
            .iter()
            .cloned()
            .chain(inherited.into_iter().filter(|p| !self.contains_path(p)));
        std::env::join_paths(entries).ok()
    }
}

/// Outcome of running one install action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub action: InstallAction,
    pub succeeded: bool,
    /// Exit code of the last command run; `None` if nothing ran or the
    /// process was killed by a signal or never spawned
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr of every command run for this action
    pub output: String,
    /// True when `skip_if_present` matched and no command ran
    pub skipped: bool,
}
