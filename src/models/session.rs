//! Session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one interactive execution session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Client attached; descriptor not yet claimed.
    AwaitingArtifact,
    /// Descriptor claimed; process being spawned.
    Launching,
    /// Process running with pumps attached.
    Running,
    /// Flagged process force-killed after the bounded wait.
    TimedOut,
    /// Process exited on its own.
    Exited,
    /// No usable artifact, or the spawn failed.
    LaunchFailed,
    /// All resources released.
    TornDown,
}

impl SessionState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingArtifact, Self::Launching | Self::LaunchFailed)
                | (
                    Self::Launching,
                    Self::Running | Self::TimedOut | Self::Exited | Self::LaunchFailed
                )
                | (Self::Running, Self::TimedOut | Self::Exited)
                | (
                    Self::AwaitingArtifact
                        | Self::Launching
                        | Self::Running
                        | Self::TimedOut
                        | Self::Exited
                        | Self::LaunchFailed,
                    Self::TornDown
                )
        )
    }

    /// `true` once nothing else can happen to the session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::TornDown
    }
}
