//! Editor-lifetime state machines around the local cache: periodic autosave,
//! recovery on open, and the unsaved-changes guard on exit.

pub mod autosave;
pub mod drafts;
pub mod exit_guard;
pub mod recovery;

pub use autosave::{AutosaveDriver, AutosaveTick, DriverState, IntervalTimer};
pub use drafts::{save_draft, DraftOutcome, DraftRequest, DRAFT_FALLBACK_TITLE};
pub use exit_guard::{ExitDecision, ExitGuard, ExitGuardState};
pub use recovery::{RecoveryFlow, RecoveryOutcome, RecoveryPrompt, RecoveryState};
