//! Run lifecycle
//!
//! A bootstrap run is single-shot and moves strictly forward:
//!
//! ```text
//! Start → Probed → Resolved → Executing → { Built | Failed | Unsupported }
//! ```
//!
//! Any non-terminal state may fall to `Failed`. `Built` and `Unsupported`
//! are only reachable from `Executing`.

use crate::error::{BootstrapError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Probed,
    Resolved,
    Executing,
    Built,
    Failed,
    Unsupported,
}

impl RunState {
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Start => "start",
            RunState::Probed => "probed",
            RunState::Resolved => "resolved",
            RunState::Executing => "executing",
            RunState::Built => "built",
            RunState::Failed => "failed",
            RunState::Unsupported => "unsupported",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Built | RunState::Failed | RunState::Unsupported
        )
    }

    pub fn can_advance_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Start, Probed) | (Probed, Resolved) | (Resolved, Executing) => true,
            (Executing, Built) | (Executing, Unsupported) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks the current state of a run and the path it took.
#[derive(Debug)]
pub struct Lifecycle {
    current: RunState,
    history: Vec<RunState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            current: RunState::Start,
            history: vec![RunState::Start],
        }
    }

    pub fn current(&self) -> RunState {
        self.current
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.current.can_advance_to(next) {
            return Err(BootstrapError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!("state {} -> {}", self.current.label(), next.label());
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut lc = Lifecycle::new();
        for s in [
            RunState::Probed,
            RunState::Resolved,
            RunState::Executing,
            RunState::Built,
        ] {
            lc.advance(s).unwrap();
        }
        assert_eq!(lc.current(), RunState::Built);
        assert_eq!(lc.history().len(), 5);
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut lc = Lifecycle::new();
        assert!(lc.advance(RunState::Executing).is_err());
        assert_eq!(lc.current(), RunState::Start);
    }

    #[test]
    fn test_no_reentry() {
        let mut lc = Lifecycle::new();
        lc.advance(RunState::Probed).unwrap();
        lc.advance(RunState::Resolved).unwrap();
        assert!(lc.advance(RunState::Probed).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [RunState::Built, RunState::Failed, RunState::Unsupported] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_advance_to(RunState::Failed));
            assert!(!terminal.can_advance_to(RunState::Start));
        }
    }

    #[test]
    fn test_failure_from_any_live_state() {
        for live in [
            RunState::Start,
            RunState::Probed,
            RunState::Resolved,
            RunState::Executing,
        ] {
            assert!(live.can_advance_to(RunState::Failed), "{}", live.label());
        }
    }

    #[test]
    fn test_unsupported_only_from_executing() {
        assert!(RunState::Executing.can_advance_to(RunState::Unsupported));
        assert!(!RunState::Resolved.can_advance_to(RunState::Unsupported));
        assert!(!RunState::Probed.can_advance_to(RunState::Built));
    }
}
