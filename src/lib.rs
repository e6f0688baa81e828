//! # a3s-bootstrap
//!
//! One-shot installer that takes a bare developer machine to a working
//! `wp-spotlight` binary on `PATH`.
//!
//! ## Overview
//!
//! A run probes the host (OS family and system package manager), resolves
//! an ordered install plan from a fixed decision table, executes that plan
//! command by command, and finally fetches, compiles and installs the tool.
//! Every step either succeeds or ends the run with a non-zero exit; nothing
//! is retried and nothing past a failure is attempted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a3s_bootstrap::{Bootstrap, BootstrapConfig, SystemRunner};
//!
//! # async fn example() -> a3s_bootstrap::Result<()> {
//! let config = BootstrapConfig::load()?;
//! let runner = SystemRunner::new();
//! let installed = Bootstrap::new(config, &runner).run().await?;
//! println!("installed at {}", installed.build.installed.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **probe** builds a [`HostProfile`] from `uname -s` and the package managers on `PATH`
//! - **resolve** maps a profile to [`InstallAction`]s; pure, no I/O
//! - **executor** runs actions in order, threading an [`EnvDelta`] between them
//! - **build** fetches the source, compiles it and places the binary
//! - **CommandRunner** trait is the only seam to the outside world; tests use [`ScriptedRunner`]
//!
//! Runs are strictly sequential and hold no locks. Two runs against the same
//! checkout or install directory at once are not supported.

pub mod bootstrap;
pub mod build;
pub mod config;
pub mod error;
pub mod executor;
pub mod path;
pub mod probe;
pub mod resolve;
pub mod runner;
pub mod state;
pub mod types;

// Re-export core types
pub use bootstrap::{exit_code, Bootstrap, Installed};
pub use build::{BuildOrchestrator, BuildPlan, BuildResult};
pub use config::{BootstrapConfig, InstallTarget};
pub use error::{BootstrapError, BuildStep, Result};
pub use executor::{ExecutionOutcome, ExecutionReport, Executor};
pub use resolve::Resolver;
pub use runner::{CommandOutput, CommandRunner, ScriptedRunner, SystemRunner};
pub use state::{Lifecycle, RunState};
pub use types::{
    ActionKind, CommandSpec, EnvDelta, ExecutionResult, HostProfile, InstallAction, OsFamily,
    PackageManager,
};
