use crate::cache::{EntryFields, LocalCacheStore};
use crate::storage::KeyValueStore;

use super::autosave::AutosaveDriver;
use super::drafts::{DraftOutcome, DraftRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitGuardState {
    Idle,
    Confirming { saving: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Nothing changed since mount; navigate away now.
    Leave,
    Prompted,
}

/// Holds navigation while there are unsaved changes.
#[derive(Debug)]
pub struct ExitGuard {
    state: ExitGuardState,
}

impl Default for ExitGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitGuard {
    pub fn new() -> Self {
        Self {
            state: ExitGuardState::Idle,
        }
    }

    pub fn state(&self) -> ExitGuardState {
        self.state
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self.state, ExitGuardState::Confirming { .. })
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.state, ExitGuardState::Confirming { saving: true })
    }

    pub fn request_exit(&mut self, driver: &AutosaveDriver, current: &EntryFields) -> ExitDecision {
        if self.is_confirming() {
            return ExitDecision::Prompted;
        }
        if !driver.has_unsaved_changes(current) {
            return ExitDecision::Leave;
        }
        tracing::debug!(slot = %driver.slot(), "unsaved changes, confirming exit");
        self.state = ExitGuardState::Confirming { saving: false };
        ExitDecision::Prompted
    }

    /// Clears the slot's snapshot; true when navigation may proceed.
    pub fn discard_and_exit<S: KeyValueStore>(
        &mut self,
        driver: &mut AutosaveDriver,
        cache: &LocalCacheStore<S>,
        current: &EntryFields,
    ) -> bool {
        if self.state != (ExitGuardState::Confirming { saving: false }) {
            return false;
        }
        driver.clear_cache(cache, current);
        self.state = ExitGuardState::Idle;
        tracing::info!(slot = %driver.slot(), "discarded changes on exit");
        true
    }

    pub fn continue_editing(&mut self) -> bool {
        if self.state != (ExitGuardState::Confirming { saving: false }) {
            return false;
        }
        self.state = ExitGuardState::Idle;
        true
    }

    pub fn begin_save_as_draft(&mut self, current: &EntryFields) -> Option<DraftRequest> {
        if self.state != (ExitGuardState::Confirming { saving: false }) {
            return None;
        }
        self.state = ExitGuardState::Confirming { saving: true };
        Some(DraftRequest::from_fields(current))
    }

    /// True when the draft was saved and navigation may proceed.
    pub fn complete_save_as_draft<S: KeyValueStore>(
        &mut self,
        driver: &mut AutosaveDriver,
        cache: &LocalCacheStore<S>,
        current: &EntryFields,
        outcome: &DraftOutcome,
    ) -> bool {
        if !self.is_saving() {
            return false;
        }
        match outcome {
            DraftOutcome::Saved { entry_id } => {
                driver.clear_cache(cache, current);
                self.state = ExitGuardState::Idle;
                tracing::info!(slot = %driver.slot(), entry_id, "saved draft on exit");
                true
            }
            DraftOutcome::Failed { message } => {
                self.state = ExitGuardState::Confirming { saving: false };
                tracing::warn!(slot = %driver.slot(), %message, "draft save on exit failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSlot;
    use crate::config::AutoSaveConfig;
    use crate::storage::MemoryStore;
    use std::time::{Duration, Instant};

    fn fields(title: &str) -> EntryFields {
        EntryFields {
            title: title.into(),
            notebook_id: Some(4),
            ..EntryFields::default()
        }
    }

    fn mounted(slot: CacheSlot, initial: &EntryFields) -> AutosaveDriver {
        let mut driver = AutosaveDriver::new(slot, &AutoSaveConfig::default());
        driver.mount(Instant::now(), initial);
        driver
    }

    #[test]
    fn unchanged_editor_leaves_without_prompt() {
        let driver = mounted(CacheSlot::New, &fields(""));
        let mut guard = ExitGuard::new();
        assert_eq!(guard.request_exit(&driver, &fields("")), ExitDecision::Leave);
        assert!(!guard.is_confirming());
    }

    #[test]
    fn continue_editing_cancels_navigation() {
        let driver = mounted(CacheSlot::New, &fields(""));
        let mut guard = ExitGuard::new();
        assert_eq!(guard.request_exit(&driver, &fields("typed")), ExitDecision::Prompted);
        assert!(guard.continue_editing());
        assert_eq!(guard.state(), ExitGuardState::Idle);
    }

    #[test]
    fn discard_clears_the_slot() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        let start = Instant::now();
        let mut driver = AutosaveDriver::new(CacheSlot::Editing(3), &AutoSaveConfig::default());
        driver.mount(start, &fields("v1"));
        driver.tick(&cache, start + Duration::from_millis(500), &fields("v2"));
        assert!(cache.get(CacheSlot::Editing(3)).is_some());

        let mut guard = ExitGuard::new();
        guard.request_exit(&driver, &fields("v2"));
        assert!(guard.discard_and_exit(&mut driver, &cache, &fields("v2")));
        assert_eq!(cache.get(CacheSlot::Editing(3)), None);
    }

    #[test]
    fn failed_draft_keeps_modal_open_and_cache_intact() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        let mut driver = mounted(CacheSlot::New, &fields(""));
        let current = fields("half written");
        driver.force_save(&cache, &current);

        let mut guard = ExitGuard::new();
        guard.request_exit(&driver, &current);
        let request = guard.begin_save_as_draft(&current).expect("confirming");
        assert_eq!(request.fields(), &current);
        assert!(!guard.continue_editing());

        let failed = DraftOutcome::Failed {
            message: "timeout".into(),
        };
        assert!(!guard.complete_save_as_draft(&mut driver, &cache, &current, &failed));
        assert_eq!(guard.state(), ExitGuardState::Confirming { saving: false });
        assert!(cache.get(CacheSlot::New).is_some());

        guard.begin_save_as_draft(&current).expect("retry");
        let saved = DraftOutcome::Saved { entry_id: 5 };
        assert!(guard.complete_save_as_draft(&mut driver, &cache, &current, &saved));
        assert_eq!(cache.get(CacheSlot::New), None);
    }
}
