//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ProtectionState`: where a single page stands with respect to bot protection
//! - `SessionPhase`: the orchestrator's position in its per-page loop

mod protection_state;
mod session_phase;

// Re-export main types
pub use protection_state::ProtectionState;
pub use session_phase::SessionPhase;
