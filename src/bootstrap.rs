//! The whole run: probe → resolve → execute → build.

use colored::Colorize;

use crate::build::{BuildOrchestrator, BuildPlan, BuildResult};
use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::executor::{ExecutionOutcome, ExecutionReport, Executor};
use crate::probe;
use crate::resolve::Resolver;
use crate::runner::CommandRunner;
use crate::state::{Lifecycle, RunState};
use crate::types::HostProfile;

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct Installed {
    pub host: HostProfile,
    pub report: ExecutionReport,
    pub build: BuildResult,
}

/// Process exit status for a finished run: 0 on success, 1 for any error,
/// including a stop on an unsupported host.
pub fn exit_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Drives a single bootstrap run through its lifecycle.
///
/// A `Bootstrap` is single-shot: once `run` has returned, the lifecycle is
/// in a terminal state and calling `run` again fails with
/// [`crate::BootstrapError::InvalidTransition`].
pub struct Bootstrap<'a> {
    config: BootstrapConfig,
    runner: &'a dyn CommandRunner,
    lifecycle: Lifecycle,
}

impl<'a> Bootstrap<'a> {
    pub fn new(config: BootstrapConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.lifecycle.current()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub async fn run(&mut self) -> Result<Installed> {
        let result = self.drive().await;
        if let Err(e) = &result {
            tracing::debug!("run failed in phase '{}': {e}", e.phase());
            if !self.lifecycle.current().is_terminal() {
                self.lifecycle.advance(RunState::Failed)?;
            }
        }
        result
    }

    async fn drive(&mut self) -> Result<Installed> {
        tracing::debug!("starting run with the {} runner", self.runner.name());
        let host = probe::probe(self.runner).await;
        self.lifecycle.advance(RunState::Probed)?;
        println!("{} host: {}", "→".cyan(), host.to_string().cyan());

        let plan = Resolver::from_config(&self.config).resolve(&host);
        self.lifecycle.advance(RunState::Resolved)?;
        for (i, action) in plan.iter().enumerate() {
            tracing::info!("plan[{i}] {}: {}", action.kind.label(), action.summary);
        }

        self.lifecycle.advance(RunState::Executing)?;
        let report = Executor::new(self.runner).execute(&plan).await;

        if let Some(e) = report.error() {
            if matches!(report.outcome, ExecutionOutcome::Unsupported { .. }) {
                self.lifecycle.advance(RunState::Unsupported)?;
            }
            return Err(e);
        }

        let orchestrator = BuildOrchestrator::new(self.runner, BuildPlan::from_config(&self.config));
        let build = orchestrator.run(&report).await?;
        self.lifecycle.advance(RunState::Built)?;

        Ok(Installed {
            host,
            report,
            build,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;
    use crate::runner::ScriptedRunner;

    #[tokio::test]
    async fn test_unknown_os_ends_unsupported_without_commands() {
        let runner = ScriptedRunner::new("FreeBSD");
        let mut bootstrap = Bootstrap::new(BootstrapConfig::default(), &runner);

        let err = bootstrap.run().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Unsupported(_)));
        assert_eq!(bootstrap.state(), RunState::Unsupported);
        assert_eq!(runner.lines(), vec!["uname -s"]);
    }

    #[tokio::test]
    async fn test_action_failure_ends_failed() {
        let runner = ScriptedRunner::new("Linux")
            .with_executable("apt-get")
            .fail_on("apt-get update", 100);
        let mut bootstrap = Bootstrap::new(BootstrapConfig::default(), &runner);

        let err = bootstrap.run().await.unwrap_err();
        assert_eq!(err.phase(), "install");
        assert_eq!(bootstrap.state(), RunState::Failed);
        assert_eq!(
            bootstrap.lifecycle().history(),
            &[
                RunState::Start,
                RunState::Probed,
                RunState::Resolved,
                RunState::Executing,
                RunState::Failed
            ]
        );
        assert!(!runner.ran("apt-get install"));
        assert!(!runner.ran("git"));
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(&Ok::<(), BootstrapError>(())), 0);
        assert_eq!(exit_code::<()>(&Err(BootstrapError::Unsupported("x".into()))), 1);
        assert_eq!(exit_code::<()>(&Err(BootstrapError::Config("bad".into()))), 1);
    }

    #[tokio::test]
    async fn test_run_is_single_shot() {
        let runner = ScriptedRunner::new("Windows_NT");
        let mut bootstrap = Bootstrap::new(BootstrapConfig::default(), &runner);
        assert!(bootstrap.run().await.is_err());

        let err = bootstrap.run().await.unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidTransition { .. }));
        assert_eq!(bootstrap.state(), RunState::Unsupported);
    }
}
