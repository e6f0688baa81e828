//! Build orchestrator: fetch → compile → locate → place → chmod → PATH.
//!
//! Every step is a guarded call whose failure aborts the run with the step
//! named. Nothing is retried.

use std::path::{Path, PathBuf};

use colored::Colorize;
use tokio::fs;

use crate::config::{BootstrapConfig, InstallTarget};
use crate::error::{BootstrapError, BuildStep, Result};
use crate::executor::ExecutionReport;
use crate::path;
use crate::runner::{CommandOutput, CommandRunner};
use crate::types::{CommandSpec, EnvDelta};

/// Lines of command output quoted in a build error
pub const OUTPUT_TAIL_LINES: usize = 15;

/// Everything the orchestrator needs to know about the project
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub repository: String,
    pub branch: Option<String>,
    pub checkout: PathBuf,
    pub build_command: String,
    /// Relative to `checkout`
    pub artifact: PathBuf,
    pub binary: String,
    pub target: InstallTarget,
    pub install_dir: PathBuf,
    pub profile: PathBuf,
    pub privilege: Option<String>,
}

impl BuildPlan {
    pub fn from_config(cfg: &BootstrapConfig) -> Self {
        Self {
            repository: cfg.source.repository.clone(),
            branch: cfg.source.branch.clone(),
            checkout: cfg.checkout_dir(),
            build_command: cfg.build.command.clone(),
            artifact: cfg.build.artifact.clone(),
            binary: cfg.build.binary.clone(),
            target: cfg.install.target,
            install_dir: cfg.install_dir(),
            profile: cfg.profile_path(),
            privilege: cfg.privilege().map(str::to_string),
        }
    }

    pub fn destination(&self) -> PathBuf {
        self.install_dir.join(&self.binary)
    }
}

/// What a successful build left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// The artifact inside the checkout
    pub artifact: PathBuf,
    /// Where the binary was installed
    pub installed: PathBuf,
    /// True if the user's shell profile was changed
    pub path_updated: bool,
}

pub struct BuildOrchestrator<'a> {
    runner: &'a dyn CommandRunner,
    plan: BuildPlan,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, plan: BuildPlan) -> Self {
        Self { runner, plan }
    }

    /// Fetch, build and install. `report` must describe a fully successful
    /// install run; its environment delta is applied to every command.
    pub async fn run(&self, report: &ExecutionReport) -> Result<BuildResult> {
        if !report.succeeded() {
            return Err(BootstrapError::build(
                BuildStep::Precondition,
                "install actions did not all succeed; refusing to fetch or build",
            ));
        }
        let env = &report.env;

        println!("{} fetching {}...", "→".cyan(), self.plan.repository.cyan());
        self.fetch(env).await?;

        println!("{} building ({})...", "→".cyan(), self.plan.build_command);
        self.compile(env).await?;

        let artifact = self.locate().await?;
        let installed = self.place(&artifact, env).await?;

        let path_updated = match self.plan.target {
            InstallTarget::User => path::ensure_path_entry(&self.plan.profile, &self.plan.install_dir)
                .await
                .map_err(|e| BootstrapError::build(BuildStep::Path, e.to_string()))?,
            InstallTarget::System => false,
        };

        println!(
            "{} installed {} to {}",
            "✓".green(),
            self.plan.binary.cyan(),
            installed.display()
        );
        if path_updated {
            println!(
                "  {} added {} to PATH in {}; open a new shell to pick it up",
                "·".dimmed(),
                self.plan.install_dir.display(),
                self.plan.profile.display()
            );
        }

        Ok(BuildResult {
            artifact,
            installed,
            path_updated,
        })
    }

    async fn fetch(&self, env: &EnvDelta) -> Result<()> {
        let checkout = &self.plan.checkout;
        let cmd = if fs::metadata(checkout.join(".git")).await.is_ok() {
            tracing::info!("{} already cloned; fast-forwarding", checkout.display());
            CommandSpec::new("git")
                .arg("-C")
                .arg(checkout.display().to_string())
                .args(["pull", "--ff-only"])
        } else {
            let mut cmd = CommandSpec::new("git").args(["clone", "--depth", "1"]);
            if let Some(branch) = &self.plan.branch {
                cmd = cmd.arg("--branch").arg(branch.clone());
            }
            cmd.arg(self.plan.repository.clone())
                .arg(checkout.display().to_string())
        };
        self.step(BuildStep::Fetch, &cmd, env).await
    }

    async fn compile(&self, env: &EnvDelta) -> Result<()> {
        let parts = split_cmd(&self.plan.build_command);
        let Some((program, args)) = parts.split_first() else {
            return Err(BootstrapError::build(BuildStep::Compile, "build command is empty"));
        };
        let cmd = CommandSpec::new(program.clone())
            .args(args.iter().cloned())
            .current_dir(self.plan.checkout.clone());
        self.step(BuildStep::Compile, &cmd, env).await
    }

    async fn locate(&self) -> Result<PathBuf> {
        let artifact = self.plan.checkout.join(&self.plan.artifact);
        match fs::metadata(&artifact).await {
            Ok(meta) if meta.is_file() => Ok(artifact),
            Ok(_) => Err(BootstrapError::build(
                BuildStep::Locate,
                format!("{} is not a file", artifact.display()),
            )),
            Err(e) => Err(BootstrapError::build(
                BuildStep::Locate,
                format!("expected build artifact at {}: {e}", artifact.display()),
            )),
        }
    }

    /// Copy the artifact into the install directory and mark it executable.
    async fn place(&self, artifact: &Path, env: &EnvDelta) -> Result<PathBuf> {
        let dest = self.plan.destination();
        match self.plan.target {
            InstallTarget::System => self.place_elevated(artifact, &dest, env).await?,
            InstallTarget::User => {
                let staged = self.plan.install_dir.join(format!("{}.new", self.plan.binary));
                place_local(artifact, &self.plan.install_dir, &staged, &dest).await?
            }
        }
        Ok(dest)
    }

    async fn place_elevated(&self, artifact: &Path, dest: &Path, env: &EnvDelta) -> Result<()> {
        let privilege = self.plan.privilege.as_deref();
        let dir = &self.plan.install_dir;

        if fs::metadata(dir).await.is_err() {
            let mkdir = CommandSpec::new("mkdir")
                .arg("-p")
                .arg(dir.display().to_string())
                .elevated(privilege);
            self.step(BuildStep::Place, &mkdir, env).await?;
        }

        let cp = CommandSpec::new("cp")
            .arg(artifact.display().to_string())
            .arg(dest.display().to_string())
            .elevated(privilege);
        self.step(BuildStep::Place, &cp, env).await?;

        let chmod = CommandSpec::new("chmod")
            .arg("755")
            .arg(dest.display().to_string())
            .elevated(privilege);
        self.step(BuildStep::Permissions, &chmod, env).await
    }

    async fn step(&self, step: BuildStep, cmd: &CommandSpec, env: &EnvDelta) -> Result<()> {
        let out = self
            .runner
            .run(cmd, env)
            .await
            .map_err(|e| BootstrapError::build(step, format!("could not run '{cmd}': {e}")))?;
        if out.success() {
            return Ok(());
        }
        Err(BootstrapError::build(step, failure_reason(cmd, &out)))
    }
}

/// Copy without elevation: write next to the destination, chmod, then rename
/// over it so a running copy of the old binary is never truncated.
async fn place_local(artifact: &Path, dir: &Path, staged: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dir).await.map_err(|e| {
        BootstrapError::build(BuildStep::Place, format!("create {}: {e}", dir.display()))
    })?;

    fs::copy(artifact, staged).await.map_err(|e| {
        BootstrapError::build(
            BuildStep::Place,
            format!("copy {} to {}: {e}", artifact.display(), staged.display()),
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(|e| {
                BootstrapError::build(
                    BuildStep::Permissions,
                    format!("chmod {}: {e}", staged.display()),
                )
            })?;
    }

    fs::rename(staged, dest).await.map_err(|e| {
        BootstrapError::build(
            BuildStep::Place,
            format!("move {} into place: {e}", dest.display()),
        )
    })
}

fn failure_reason(cmd: &CommandSpec, out: &CommandOutput) -> String {
    let code = out
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let tail = output_tail(&out.output, OUTPUT_TAIL_LINES);
    if tail.is_empty() {
        format!("'{cmd}' exited with {code}")
    } else {
        format!("'{cmd}' exited with {code}:\n{tail}")
    }
}

/// Last `n` non-empty lines of `output`
pub fn output_tail(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Shell-style command splitting: handles single/double quotes and backslash escapes.
/// e.g. `cargo build --features 'a b'` → ["cargo", "build", "--features", "a b"]
pub fn split_cmd(cmd: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = cmd.chars();
    let mut in_single = false;
    let mut in_double = false;
    let mut pending = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if !in_single => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    pending = true;
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                pending = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                pending = true;
            }
            ' ' | '\t' if !in_single && !in_double => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            _ => {
                current.push(ch);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}
