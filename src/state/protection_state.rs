/// Protection states for a single page evaluation
///
/// One instance walks through these states per fetched page; it is never
/// persisted.
use std::fmt;

/// Represents where a page stands with respect to bot protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionState {
    /// No challenge markers found; normal extraction proceeds
    Clear,

    /// A challenge marker or HTTP 403 was observed
    Challenged,

    /// Waiting for a person to solve the challenge in a visible browser
    AwaitingHuman,

    /// The challenge could not be passed
    Blocked,
}

impl ProtectionState {
    /// State entered after inspecting a freshly loaded page
    pub fn inspect(challenged: bool) -> Self {
        if challenged {
            Self::Challenged
        } else {
            Self::Clear
        }
    }

    /// State entered from `Challenged`, depending on whether a human can help
    pub fn escalate(self, interactive: bool) -> Self {
        match self {
            Self::Challenged if interactive => Self::AwaitingHuman,
            Self::Challenged => Self::Blocked,
            other => other,
        }
    }

    /// State entered from `AwaitingHuman` once polling finishes
    pub fn resolve(self, solved: bool) -> Self {
        match self {
            Self::AwaitingHuman if solved => Self::Clear,
            Self::AwaitingHuman => Self::Blocked,
            other => other,
        }
    }

    /// Returns true if extraction may run against the page
    pub fn allows_extraction(&self) -> bool {
        matches!(self, Self::Clear)
    }

    /// Returns true if no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Clear | Self::Blocked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Challenged => "challenged",
            Self::AwaitingHuman => "awaiting_human",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ProtectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
