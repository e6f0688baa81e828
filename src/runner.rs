//! Command capability: the single seam to the outside world
//!
//! Package managers, the toolchain installer, `git`, the build command and
//! `uname` are all black boxes reached through [`CommandRunner`]. The
//! executor and orchestrator only ever see exit codes and captured output,
//! so they can be driven by [`ScriptedRunner`] in tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CommandSpec, EnvDelta};

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// stdout followed by stderr, lossily decoded
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            output: output.into(),
        }
    }

    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands and resolves executables
///
/// `run` returns `Err` only when the process could not be started; a
/// non-zero exit is reported through [`CommandOutput::exit_code`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion with `env` applied on top of the inherited environment
    async fn run(&self, cmd: &CommandSpec, env: &EnvDelta) -> Result<CommandOutput>;

    /// Resolve `name` against PATH with `env` applied
    fn find_executable(&self, name: &str, env: &EnvDelta) -> Option<PathBuf>;

    /// Runner name (e.g. "system", "scripted")
    fn name(&self) -> &str;
}

/// Runs commands on the host through `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn search_path(env: &EnvDelta) -> Option<std::ffi::OsString> {
        let inherited = std::env::var_os("PATH");
        env.path_value(inherited.as_deref()).or(inherited)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &CommandSpec, env: &EnvDelta) -> Result<CommandOutput> {
        // Resolve against the delta so freshly installed tools are found
        let program = if env.is_empty() {
            PathBuf::from(&cmd.program)
        } else {
            self.find_executable(&cmd.program, env)
                .unwrap_or_else(|| PathBuf::from(&cmd.program))
        };

        let mut command = tokio::process::Command::new(program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        match env.path_value(std::env::var_os("PATH").as_deref()) {
            Some(path) => {
                command.env("PATH", path);
            }
            None if !env.is_empty() => tracing::warn!(
                "cannot put {:?} on PATH for '{cmd}'; running with the inherited PATH",
                env.path_entries()
            ),
            None => {}
        }

        tracing::debug!("exec: {cmd}");
        let out = command.output().await?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        tracing::debug!(
            "exit {:?} from '{}' ({} bytes of output)",
            out.status.code(),
            cmd.program,
            output.len()
        );

        Ok(CommandOutput {
            exit_code: out.status.code(),
            output,
        })
    }

    fn find_executable(&self, name: &str, env: &EnvDelta) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(name, Self::search_path(env), cwd).ok()
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// A command the scripted runner was asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: CommandSpec,
    pub env: EnvDelta,
}

impl RecordedCall {
    pub fn line(&self) -> String {
        self.command.to_string()
    }
}

/// In-process runner for tests and rehearsals
///
/// Every command succeeds with empty output unless a failure pattern
/// matches its rendered command line. `uname` answers with the configured
/// OS name. Executables are resolvable when registered up front or when a
/// command registered with [`ScriptedRunner::installs`] has succeeded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    os_name: Option<String>,
    executables: Mutex<HashSet<String>>,
    failures: Vec<(String, i32)>,
    installs: Vec<(String, String)>,
    unspawnable: Vec<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    /// Runner whose `uname -s` prints `os_name`
    pub fn new(os_name: impl Into<String>) -> Self {
        Self {
            os_name: Some(os_name.into()),
            ..Self::default()
        }
    }

    /// Runner on which `uname` cannot be found
    pub fn without_uname() -> Self {
        Self::default()
    }

    pub fn with_executable(self, name: impl Into<String>) -> Self {
        self.executables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
        self
    }

    /// Commands whose line contains `needle` exit with `code`
    pub fn fail_on(mut self, needle: impl Into<String>, code: i32) -> Self {
        self.failures.push((needle.into(), code));
        self
    }

    /// Once a command containing `needle` succeeds, `executable` resolves
    pub fn installs(mut self, needle: impl Into<String>, executable: impl Into<String>) -> Self {
        self.installs.push((needle.into(), executable.into()));
        self
    }

    /// Commands whose program is `program` fail to spawn
    pub fn unspawnable(mut self, program: impl Into<String>) -> Self {
        self.unspawnable.push(program.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered command lines, in call order
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::line).collect()
    }

    /// True if any recorded command line contains `needle`
    pub fn ran(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    fn record(&self, cmd: &CommandSpec, env: &EnvDelta) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                command: cmd.clone(),
                env: env.clone(),
            });
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: &CommandSpec, env: &EnvDelta) -> Result<CommandOutput> {
        self.record(cmd, env);

        if self.unspawnable.iter().any(|p| p == &cmd.program) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: command not found", cmd.program),
            )
            .into());
        }

        if cmd.program == "uname" {
            return Ok(match &self.os_name {
                Some(name) => CommandOutput::ok(format!("{name}\n")),
                None => CommandOutput::failed(127, "uname: command not found"),
            });
        }

        let line = cmd.to_string();
        if let Some((_, code)) = self.failures.iter().find(|(n, _)| line.contains(n.as_str())) {
            return Ok(CommandOutput::failed(*code, format!("scripted failure: {line}")));
        }

        for (needle, exe) in &self.installs {
            if line.contains(needle.as_str()) {
                self.executables
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(exe.clone());
            }
        }

        Ok(CommandOutput::ok(String::new()))
    }

    fn find_executable(&self, name: &str, _env: &EnvDelta) -> Option<PathBuf> {
        self.executables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
