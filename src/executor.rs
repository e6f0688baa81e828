//! Action executor
//!
//! Runs an install plan strictly in order and stops at the first command
//! that fails. Later actions assume earlier ones succeeded (the native
//! packages step needs an up-to-date index, the build needs the toolchain),
//! so nothing past a failure is ever attempted.

use colored::Colorize;

use crate::error::{BootstrapError, Result};
use crate::runner::CommandRunner;
use crate::types::{EnvDelta, ExecutionResult, InstallAction};

/// How a plan execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every action succeeded
    Completed,
    /// An action's command exited non-zero or could not be started
    Failed { command: String },
    /// A terminal `ExitUnsupported` action was reached
    Unsupported { message: String },
}

/// Results of every attempted action plus the environment they produced
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub results: Vec<ExecutionResult>,
    pub env: EnvDelta,
    pub outcome: ExecutionOutcome,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == ExecutionOutcome::Completed
    }

    /// The result of the action that stopped the run, if one failed
    pub fn failed_result(&self) -> Option<&ExecutionResult> {
        match self.outcome {
            ExecutionOutcome::Failed { .. } => self.results.last(),
            _ => None,
        }
    }

    /// The error that ends the run, if the outcome was not `Completed`
    pub fn error(&self) -> Option<BootstrapError> {
        match &self.outcome {
            ExecutionOutcome::Completed => None,
            ExecutionOutcome::Unsupported { message } => {
                Some(BootstrapError::Unsupported(message.clone()))
            }
            ExecutionOutcome::Failed { command } => {
                let last = self.results.last();
                Some(BootstrapError::ActionFailed {
                    action: last
                        .map(|r| r.action.summary.clone())
                        .unwrap_or_else(|| "install action".to_string()),
                    command: command.clone(),
                    exit_code: last.and_then(|r| r.exit_code),
                    output: last.map(|r| r.output.clone()).unwrap_or_default(),
                })
            }
        }
    }

    /// Turn the outcome into the environment delta for later steps, or the
    /// error that ends the run.
    pub fn into_env(self) -> Result<EnvDelta> {
        match self.error() {
            Some(e) => Err(e),
            None => Ok(self.env),
        }
    }
}

/// Runs install actions one after another through a [`CommandRunner`]
pub struct Executor<'a> {
    runner: &'a dyn CommandRunner,
    env: EnvDelta,
}

impl<'a> Executor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            env: EnvDelta::new(),
        }
    }

    pub async fn execute(mut self, actions: &[InstallAction]) -> ExecutionReport {
        let mut results = Vec::with_capacity(actions.len());
        let mut outcome = ExecutionOutcome::Completed;

        for action in actions {
            if action.is_terminal() {
                let message = action.message.clone().unwrap_or_default();
                tracing::info!("reached terminal action: {message}");
                results.push(ExecutionResult {
                    action: action.clone(),
                    succeeded: true,
                    exit_code: None,
                    output: message.clone(),
                    skipped: false,
                });
                outcome = ExecutionOutcome::Unsupported { message };
                break;
            }

            if let Some(exe) = &action.skip_if_present {
                if let Some(found) = self.runner.find_executable(exe, &self.env) {
                    println!(
                        "  {} {} ({} already at {})",
                        "✓".green(),
                        action.summary,
                        exe.cyan(),
                        found.display()
                    );
                    if let Some(dir) = &action.provides_path {
                        self.env.prepend_path(dir.clone());
                    }
                    results.push(ExecutionResult {
                        action: action.clone(),
                        succeeded: true,
                        exit_code: None,
                        output: String::new(),
                        skipped: true,
                    });
                    continue;
                }
            }

            println!("{} {}...", "→".cyan(), action.summary);
            let (result, failed_command) = self.run_action(action).await;

            if let Some(command) = failed_command {
                println!("  {} {}", "✗".red(), action.summary);
                results.push(result);
                outcome = ExecutionOutcome::Failed { command };
                break;
            }

            if let Some(dir) = &action.provides_path {
                tracing::debug!("adding {} to PATH for later steps", dir.display());
                self.env.prepend_path(dir.clone());
            }
            println!("  {} {}", "✓".green(), action.summary);
            results.push(result);
        }

        ExecutionReport {
            results,
            env: self.env,
            outcome,
        }
    }

    /// Run every command of `action`; returns the result and, on failure,
    /// the command line that failed.
    async fn run_action(&self, action: &InstallAction) -> (ExecutionResult, Option<String>) {
        let mut output = String::new();
        let mut exit_code = None;
        let mut failed = None;

        for cmd in &action.commands {
            match self.runner.run(cmd, &self.env).await {
                Ok(out) => {
                    output.push_str(&out.output);
                    exit_code = out.exit_code;
                    if !out.success() {
                        tracing::warn!("'{cmd}' exited with {:?}", out.exit_code);
                        failed = Some(cmd.to_string());
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("'{cmd}' could not be started: {e}");
                    output.push_str(&e.to_string());
                    exit_code = None;
                    failed = Some(cmd.to_string());
                    break;
                }
            }
        }

        let result = ExecutionResult {
            action: action.clone(),
            succeeded: failed.is_none(),
            exit_code,
            output,
            skipped: false,
        };
        (result, failed)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::resolve::{resolve, Resolver};
    use crate::runner::ScriptedRunner;
    use crate::types::{ActionKind, CommandSpec, HostProfile, OsFamily, PackageManager};

    fn step(name: &str) -> InstallAction {
        InstallAction::new(
            ActionKind::InstallNativePackages,
            name,
            vec![CommandSpec::new("step").arg(name)],
        )
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let runner = ScriptedRunner::new("Linux");
        let report = Executor::new(&runner)
            .execute(&[step("one"), step("two"), step("three")])
            .await;
        assert!(report.succeeded());
        assert_eq!(report.results.len(), 3);
        assert!(report.results.iter().all(|r| r.succeeded));
        assert_eq!(runner.lines(), vec!["step one", "step two", "step three"]);
    }

    #[tokio::test]
    async fn test_halts_at_first_failure() {
        let runner = ScriptedRunner::new("Linux").fail_on("step two", 2);
        let report = Executor::new(&runner)
            .execute(&[step("one"), step("two"), step("three")])
            .await;

        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].succeeded);
        assert!(!report.results[1].succeeded);
        assert_eq!(report.results[1].exit_code, Some(2));
        assert!(!runner.ran("step three"));
        assert_eq!(
            report.outcome,
            ExecutionOutcome::Failed {
                command: "step two".into()
            }
        );
        assert_eq!(report.failed_result().unwrap().action.summary, "two");
    }

    #[tokio::test]
    async fn test_failure_in_first_command_skips_rest_of_action() {
        let runner = ScriptedRunner::new("Linux").fail_on("first", 1);
        let action = InstallAction::new(
            ActionKind::InstallNativePackages,
            "multi",
            vec![CommandSpec::new("first"), CommandSpec::new("second")],
        );
        let report = Executor::new(&runner).execute(&[action]).await;
        assert!(!report.succeeded());
        assert_eq!(runner.lines(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_action_failure() {
        let runner = ScriptedRunner::new("Darwin").unspawnable("brew");
        let plan = resolve(&HostProfile::new(
            OsFamily::Darwin,
            PackageManager::NotApplicable,
        ));
        let report = Executor::new(&runner).execute(&plan).await;
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[1].exit_code, None);
        assert!(report.results[1].output.contains("command not found"));

        let err = report.into_env().unwrap_err();
        assert!(matches!(err, BootstrapError::ActionFailed { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_is_terminal_and_succeeds_as_action() {
        let runner = ScriptedRunner::new("Linux");
        let report = Executor::new(&runner)
            .execute(&[InstallAction::unsupported("install manually"), step("never")])
            .await;

        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].succeeded);
        assert!(runner.calls().is_empty());
        assert_eq!(
            report.outcome,
            ExecutionOutcome::Unsupported {
                message: "install manually".into()
            }
        );
        match report.into_env() {
            Err(BootstrapError::Unsupported(msg)) => assert_eq!(msg, "install manually"),
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_toolchain_path_threads_into_later_commands() {
        let runner = ScriptedRunner::new("Linux");
        let resolver = Resolver::new(Some("sudo"), "https://sh.rustup.rs", "/home/u/.cargo/bin");
        let plan = resolver.resolve(&HostProfile::new(OsFamily::Linux, PackageManager::Pacman));

        let report = Executor::new(&runner).execute(&plan).await;
        assert!(report.succeeded());

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].env.is_empty());
        assert_eq!(
            calls[1].env.path_entries(),
            &[PathBuf::from("/home/u/.cargo/bin")]
        );
        assert_eq!(
            report.into_env().unwrap().path_entries(),
            &[PathBuf::from("/home/u/.cargo/bin")]
        );
    }

    #[tokio::test]
    async fn test_toolchain_skipped_when_already_installed() {
        let runner = ScriptedRunner::new("Linux").with_executable("cargo");
        let plan = resolve(&HostProfile::new(OsFamily::Linux, PackageManager::Pacman));

        let report = Executor::new(&runner).execute(&plan).await;
        assert!(report.succeeded());
        assert!(report.results[0].skipped);
        assert!(!runner.ran("rustup"));
        assert!(runner.ran("pacman"));
    }

    #[tokio::test]
    async fn test_empty_plan_completes() {
        let runner = ScriptedRunner::new("Linux");
        let report = Executor::new(&runner).execute(&[]).await;
        assert!(report.succeeded());
        assert!(report.results.is_empty());
    }
}
