/// Phases of a crawl session
///
/// The orchestrator walks `Init → FetchPage → ProtectionCheck → OnPageActions →
/// Extract → Paginate` and loops back to `FetchPage` until the queue drains or
/// the page ceiling is hit.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Init,
    FetchPage,
    ProtectionCheck,
    OnPageActions,
    Extract,
    Paginate,
    Done,
}

impl SessionPhase {
    /// Returns true if moving from `self` to `next` is a legal step
    ///
    /// Any phase may end the session; a page can also be abandoned part way
    /// through (failed fetch, blocked challenge, over the ceiling), which moves
    /// straight back to `FetchPage`.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;

        if next == Done {
            return *self != Done;
        }

        matches!(
            (self, next),
            (Init, FetchPage)
                | (FetchPage, ProtectionCheck)
                | (FetchPage, FetchPage)
                | (ProtectionCheck, OnPageActions)
                | (ProtectionCheck, FetchPage)
                | (OnPageActions, Extract)
                | (Extract, Paginate)
                | (Extract, FetchPage)
                | (Paginate, FetchPage)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::FetchPage => "fetch_page",
            Self::ProtectionCheck => "protection_check",
            Self::OnPageActions => "on_page_actions",
            Self::Extract => "extract",
            Self::Paginate => "paginate",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
