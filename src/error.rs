//! Error types for a3s-bootstrap

use thiserror::Error;

use crate::state::RunState;

/// Build step that failed inside the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    /// Install actions must all have succeeded first
    Precondition,
    /// Source checkout (clone or fast-forward pull)
    Fetch,
    /// The configured build command
    Compile,
    /// Looking for the produced artifact
    Locate,
    /// Copying the artifact into the install directory
    Place,
    /// Marking the installed binary executable
    Permissions,
    /// Appending the install directory to the shell profile
    Path,
}

impl BuildStep {
    pub fn label(&self) -> &'static str {
        match self {
            BuildStep::Precondition => "precondition",
            BuildStep::Fetch => "fetch",
            BuildStep::Compile => "compile",
            BuildStep::Locate => "locate",
            BuildStep::Place => "place",
            BuildStep::Permissions => "permissions",
            BuildStep::Path => "path",
        }
    }
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that end a bootstrap run
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// OS or package manager not recognized; carries manual instructions
    #[error("unsupported environment: {0}")]
    Unsupported(String),

    /// An install action's command exited non-zero or could not be spawned
    #[error("{action} failed (exit code {}): {command}", display_code(.exit_code))]
    ActionFailed {
        action: String,
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// Fetch, compile, or artifact placement failed
    #[error("build step '{step}' failed: {reason}")]
    Build { step: BuildStep, reason: String },

    /// Configuration file unreadable or invalid
    #[error("config error: {0}")]
    Config(String),

    /// Lifecycle misuse
    #[error("invalid state transition: {} -> {}", .from.label(), .to.label())]
    InvalidTransition { from: RunState, to: RunState },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}

impl BootstrapError {
    /// Short name of the phase that failed, for the user-facing diagnostic
    pub fn phase(&self) -> &'static str {
        match self {
            BootstrapError::Unsupported(_) => "environment",
            BootstrapError::ActionFailed { .. } => "install",
            BootstrapError::Build { .. } => "build",
            BootstrapError::Config(_) => "config",
            BootstrapError::InvalidTransition { .. } => "internal",
            BootstrapError::Io(_) => "io",
        }
    }

    pub(crate) fn build(step: BuildStep, reason: impl Into<String>) -> Self {
        BootstrapError::Build {
            step,
            reason: reason.into(),
        }
    }
}

/// Result type alias for bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_failed_display() {
        let err = BootstrapError::ActionFailed {
            action: "native packages".into(),
            command: "sudo pacman -S base-devel".into(),
            exit_code: Some(1),
            output: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "native packages failed (exit code 1): sudo pacman -S base-devel"
        );
        assert_eq!(err.phase(), "install");
    }

    #[test]
    fn test_action_failed_without_code() {
        let err = BootstrapError::ActionFailed {
            action: "toolchain".into(),
            command: "sh".into(),
            exit_code: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("exit code none"));
    }

    #[test]
    fn test_build_error_names_step() {
        let err = BootstrapError::build(BuildStep::Locate, "no artifact");
        assert_eq!(err.to_string(), "build step 'locate' failed: no artifact");
        assert_eq!(err.phase(), "build");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = BootstrapError::InvalidTransition {
            from: RunState::Built,
            to: RunState::Probed,
        };
        assert_eq!(err.to_string(), "invalid state transition: built -> probed");
    }
}
