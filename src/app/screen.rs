use std::time::Instant;

use crate::api::{DiaryApi, Entry, EntryPayload};
use crate::cache::{now_millis, CacheSlot, EntryFields, LocalCacheStore};
use crate::config::AutoSaveConfig;
use crate::editor::EditorState;
use crate::journaling::{
    save_draft, AutosaveDriver, AutosaveTick, DraftOutcome, DraftRequest, ExitDecision, ExitGuard,
    RecoveryFlow, RecoveryOutcome, RecoveryPrompt,
};
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    Continue,
    SaveDraft,
    Discard,
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitChoice {
    SaveDraft,
    Discard,
    Continue,
}

/// Which modal asked for a draft save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOrigin {
    Recovery,
    Exit,
}

/// Work the host performs on behalf of the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCommand {
    SaveDraft {
        origin: DraftOrigin,
        request: DraftRequest,
    },
    Publish {
        entry_id: Option<i64>,
        payload: EntryPayload,
    },
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    DraftSaved {
        origin: DraftOrigin,
        outcome: DraftOutcome,
    },
    /// Id of the saved entry, or the error message.
    Published(Result<i64, String>),
}

impl ScreenCommand {
    pub fn is_close(&self) -> bool {
        matches!(self, ScreenCommand::Close)
    }

    pub fn needs_network(&self) -> bool {
        !self.is_close()
    }

    /// Runs the network part of the command; `Close` has none.
    pub fn execute<A: DiaryApi + ?Sized>(self, api: &A) -> Option<ApiOutcome> {
        match self {
            ScreenCommand::SaveDraft { origin, request } => {
                let result = save_draft(api, &request);
                Some(ApiOutcome::DraftSaved {
                    origin,
                    outcome: DraftOutcome::from(&result),
                })
            }
            ScreenCommand::Publish { entry_id, payload } => {
                let result = match entry_id {
                    Some(id) => api.update_entry(id, &payload),
                    None => api.create_entry(&payload),
                };
                Some(ApiOutcome::Published(
                    result.map(|entry| entry.id).map_err(|err| err.to_string()),
                ))
            }
            ScreenCommand::Close => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// One open editor: recovery on open, autosave while mounted, guarded exit.
pub struct EditorScreen<S> {
    cache: LocalCacheStore<S>,
    slot: CacheSlot,
    entry_date: Option<String>,
    initial: EntryFields,
    editor: EditorState,
    driver: AutosaveDriver,
    recovery: RecoveryFlow,
    exit_guard: ExitGuard,
    publishing: bool,
    closed: bool,
    notices: Vec<Notice>,
}

impl<S: KeyValueStore> EditorScreen<S> {
    pub fn open_new(
        cache: LocalCacheStore<S>,
        config: &AutoSaveConfig,
        notebook_id: Option<i64>,
        now: Instant,
    ) -> Self {
        let initial = EntryFields {
            notebook_id,
            ..EntryFields::default()
        };
        let driver = AutosaveDriver::new(CacheSlot::New, config);
        Self::open(cache, CacheSlot::New, None, initial, driver, now)
    }

    pub fn open_existing(
        cache: LocalCacheStore<S>,
        config: &AutoSaveConfig,
        entry: &Entry,
        now: Instant,
    ) -> Self {
        let slot = CacheSlot::Editing(entry.id);
        let driver =
            AutosaveDriver::new(slot, config).with_original_created_at(entry.date.clone());
        Self::open(cache, slot, entry.date.clone(), entry.fields(), driver, now)
    }

    fn open(
        cache: LocalCacheStore<S>,
        slot: CacheSlot,
        entry_date: Option<String>,
        initial: EntryFields,
        driver: AutosaveDriver,
        now: Instant,
    ) -> Self {
        let recovery = RecoveryFlow::start(slot, &cache);
        let mut screen = Self {
            editor: EditorState::from_fields(&initial),
            cache,
            slot,
            entry_date,
            initial,
            driver,
            recovery,
            exit_guard: ExitGuard::new(),
            publishing: false,
            closed: false,
            notices: Vec::new(),
        };
        if !screen.recovery.is_prompting() {
            screen.mount_editor(now);
        }
        screen
    }

    pub fn slot(&self) -> CacheSlot {
        self.slot
    }

    pub fn cache(&self) -> &LocalCacheStore<S> {
        &self.cache
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    /// Mutable editor while it is mounted and accepting input. Input is refused
    /// until a pending restore has injected its content.
    pub fn editor_mut(&mut self) -> Option<&mut EditorState> {
        if self.is_recovering()
            || self.is_restoring()
            || self.closed
            || self.exit_guard.is_confirming()
        {
            return None;
        }
        Some(&mut self.editor)
    }

    pub fn driver(&self) -> &AutosaveDriver {
        &self.driver
    }

    pub fn is_recovering(&self) -> bool {
        self.recovery.is_prompting()
    }

    pub fn is_restoring(&self) -> bool {
        self.driver.is_restoring()
    }

    pub fn recovery_outcome(&self) -> Option<&RecoveryOutcome> {
        self.recovery.outcome()
    }

    pub fn recovery_prompt(&self, now_ms: i64) -> Option<RecoveryPrompt> {
        self.recovery.prompt(now_ms)
    }

    pub fn is_confirming_exit(&self) -> bool {
        self.exit_guard.is_confirming()
    }

    /// A network call started by this screen has not reported back yet.
    pub fn is_busy(&self) -> bool {
        self.publishing || self.recovery.is_saving() || self.exit_guard.is_saving()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.driver.has_unsaved_changes(&self.editor.fields())
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn on_tick(&mut self, now: Instant) -> AutosaveTick {
        if self.closed || self.is_recovering() {
            return AutosaveTick::Idle;
        }
        let tick = self.driver.tick(&self.cache, now, &self.editor.fields());
        if let AutosaveTick::RestoreDue(snapshot) = &tick {
            self.editor.apply_restored_content(&snapshot.content);
            self.driver.finish_restore(&self.editor.fields());
            tracing::debug!(slot = %self.slot, "restored content injected");
            self.notices.push(Notice::info("Draft restored"));
        }
        tick
    }

    pub fn choose_recovery(&mut self, choice: RecoveryChoice, now: Instant) -> Option<ScreenCommand> {
        match choice {
            RecoveryChoice::Continue => {
                let snapshot = self.recovery.continue_editing()?;
                self.editor = EditorState::from_fields(&self.initial);
                self.editor.apply_restored_metadata(&snapshot);
                self.driver.mount_restoring(now, snapshot);
                None
            }
            RecoveryChoice::SaveDraft => {
                let request = self.recovery.begin_save_as_draft()?;
                Some(ScreenCommand::SaveDraft {
                    origin: DraftOrigin::Recovery,
                    request,
                })
            }
            RecoveryChoice::Discard => {
                if self.recovery.discard(&self.cache) {
                    self.mount_editor(now);
                }
                None
            }
            RecoveryChoice::Dismiss => {
                if self.recovery.dismiss() {
                    self.mount_editor(now);
                }
                None
            }
        }
    }

    pub fn request_exit(&mut self) -> Option<ScreenCommand> {
        if self.closed || self.is_busy() || self.is_recovering() {
            return None;
        }
        match self.exit_guard.request_exit(&self.driver, &self.editor.fields()) {
            ExitDecision::Leave => Some(self.close()),
            ExitDecision::Prompted => None,
        }
    }

    pub fn choose_exit(&mut self, choice: ExitChoice) -> Option<ScreenCommand> {
        match choice {
            ExitChoice::SaveDraft => {
                let request = self.exit_guard.begin_save_as_draft(&self.editor.fields())?;
                Some(ScreenCommand::SaveDraft {
                    origin: DraftOrigin::Exit,
                    request,
                })
            }
            ExitChoice::Discard => {
                let fields = self.editor.fields();
                if self
                    .exit_guard
                    .discard_and_exit(&mut self.driver, &self.cache, &fields)
                {
                    Some(self.close())
                } else {
                    None
                }
            }
            ExitChoice::Continue => {
                self.exit_guard.continue_editing();
                None
            }
        }
    }

    pub fn publish(&mut self) -> Option<ScreenCommand> {
        if self.closed
            || self.is_busy()
            || self.is_recovering()
            || self.is_restoring()
            || self.is_confirming_exit()
        {
            return None;
        }
        let fields = self.editor.fields();
        if fields.title.trim().is_empty() {
            self.notices.push(Notice::error("Title required"));
            return None;
        }
        let Some(notebook_id) = fields.notebook_id else {
            self.notices.push(Notice::error("Please select a notebook"));
            return None;
        };
        self.publishing = true;
        let payload = EntryPayload::from_fields(&fields, notebook_id).with_date(self.entry_date.clone());
        Some(ScreenCommand::Publish {
            entry_id: self.slot.entry_id(),
            payload,
        })
    }

    pub fn apply_outcome(&mut self, outcome: ApiOutcome, now: Instant) -> Option<ScreenCommand> {
        match outcome {
            ApiOutcome::DraftSaved { origin, outcome } => self.on_draft_saved(origin, &outcome, now),
            ApiOutcome::Published(result) => self.on_published(result),
        }
    }

    pub fn on_draft_saved(
        &mut self,
        origin: DraftOrigin,
        outcome: &DraftOutcome,
        now: Instant,
    ) -> Option<ScreenCommand> {
        let done = match origin {
            DraftOrigin::Recovery => {
                let resolved = self.recovery.complete_save_as_draft(&self.cache, outcome);
                if resolved {
                    self.mount_editor(now);
                }
                resolved
            }
            DraftOrigin::Exit => {
                let fields = self.editor.fields();
                self.exit_guard
                    .complete_save_as_draft(&mut self.driver, &self.cache, &fields, outcome)
            }
        };
        match outcome {
            DraftOutcome::Saved { .. } if done => self.notices.push(Notice::info("Draft saved")),
            DraftOutcome::Failed { .. } => self.notices.push(Notice::error("Failed to save draft")),
            DraftOutcome::Saved { .. } => {}
        }
        if done && origin == DraftOrigin::Exit {
            Some(self.close())
        } else {
            None
        }
    }

    /// A successful save writes the final state and then clears it, in that order,
    /// so no pending tick can leave a stale snapshot behind.
    pub fn on_published(&mut self, result: Result<i64, String>) -> Option<ScreenCommand> {
        if !self.publishing {
            return None;
        }
        self.publishing = false;
        match result {
            Ok(entry_id) => {
                let fields = self.editor.fields();
                self.driver.force_save(&self.cache, &fields);
                self.driver.clear_cache(&self.cache, &fields);
                tracing::info!(slot = %self.slot, entry_id, "entry saved");
                self.notices.push(Notice::info("Diary saved"));
                Some(self.close())
            }
            Err(message) => {
                tracing::warn!(slot = %self.slot, %message, "entry save failed, keeping cache");
                self.notices
                    .push(Notice::error(format!("Failed to save diary: {message}")));
                None
            }
        }
    }

    /// Leaves without the exit guard. Unsaved state is written first so the
    /// next open offers to recover it.
    pub fn abandon(&mut self) -> ScreenCommand {
        if !self.closed && !self.is_recovering() && self.has_unsaved_changes() {
            let fields = self.editor.fields();
            self.driver.force_save(&self.cache, &fields);
        }
        self.close()
    }

    pub fn last_cached_label(&self) -> Option<String> {
        self.driver
            .last_cached_at()
            .map(|ts| crate::cache::format_cache_time(ts, now_millis()))
    }

    fn mount_editor(&mut self, now: Instant) {
        self.editor = EditorState::from_fields(&self.initial);
        self.driver.mount(now, &self.editor.fields());
    }

    fn close(&mut self) -> ScreenCommand {
        self.driver.unmount();
        self.closed = true;
        ScreenCommand::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;

    type Store = Arc<MemoryStore>;

    fn open_new(backend: &Store, now: Instant) -> EditorScreen<Store> {
        EditorScreen::open_new(
            LocalCacheStore::new(backend.clone()),
            &AutoSaveConfig::default(),
            Some(1),
            now,
        )
    }

    fn type_title(screen: &mut EditorScreen<Store>, text: &str) {
        let editor = screen.editor_mut().expect("editor mounted");
        for ch in text.chars() {
            editor.active_mut().insert_char(ch);
        }
    }

    #[test]
    fn publish_requires_title_and_notebook() {
        let backend = Store::default();
        let now = Instant::now();
        let mut screen = EditorScreen::open_new(
            LocalCacheStore::new(backend.clone()),
            &AutoSaveConfig::default(),
            None,
            now,
        );
        assert_eq!(screen.publish(), None);
        type_title(&mut screen, "Hi");
        assert_eq!(screen.publish(), None);
        let messages: Vec<_> = screen.take_notices().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["Title required", "Please select a notebook"]);
    }

    #[test]
    fn failed_publish_keeps_the_cache() {
        let backend = Store::default();
        let now = Instant::now();
        let mut screen = open_new(&backend, now);
        type_title(&mut screen, "Keep");
        screen.on_tick(now + Duration::from_millis(500));
        assert_matches!(screen.publish(), Some(ScreenCommand::Publish { entry_id: None, .. }));
        assert!(screen.is_busy());
        assert_eq!(screen.on_published(Err("offline".into())), None);
        assert!(screen.cache().get(CacheSlot::New).is_some());
        assert!(!screen.is_closed());
    }

    #[test]
    fn dismissed_recovery_mounts_with_initial_state() {
        let backend = Store::default();
        let now = Instant::now();
        let mut first = open_new(&backend, now);
        type_title(&mut first, "Later");
        first.on_tick(now + Duration::from_millis(500));

        let mut second = open_new(&backend, now);
        assert!(second.is_recovering());
        assert!(second.editor_mut().is_none());
        assert_eq!(second.choose_recovery(RecoveryChoice::Dismiss, now), None);
        assert_eq!(second.editor().title().text(), "");
        assert!(second.cache().get(CacheSlot::New).is_some());
        assert_eq!(second.recovery_outcome(), Some(&RecoveryOutcome::Dismissed));
    }

    #[test]
    fn continue_editing_restores_content_after_delay() {
        let backend = Store::default();
        let now = Instant::now();
        let mut first = open_new(&backend, now);
        type_title(&mut first, "Title");
        first.editor_mut().expect("mounted").toggle_focus();
        type_title(&mut first, "body text");
        first.on_tick(now + Duration::from_millis(500));

        let mut second = open_new(&backend, now);
        second.choose_recovery(RecoveryChoice::Continue, now);
        assert_eq!(second.editor().title().text(), "Title");
        assert_eq!(second.editor().body().text(), "");
        assert!(second.editor_mut().is_none());
        second.on_tick(now + Duration::from_millis(50));
        assert_eq!(second.editor().body().text(), "");
        assert!(second.take_notices().is_empty());
        assert_matches!(
            second.on_tick(now + Duration::from_millis(100)),
            AutosaveTick::RestoreDue(_)
        );
        assert_eq!(second.editor().body().text(), "body text");
        assert!(!second.has_unsaved_changes());
        assert!(second.editor_mut().is_some());
        assert_eq!(second.take_notices(), vec![Notice::info("Draft restored")]);
    }

    #[test]
    fn leaving_before_the_restore_lands_is_not_guarded() {
        let backend = Store::default();
        let now = Instant::now();
        let mut first = open_new(&backend, now);
        type_title(&mut first, "Pending");
        first.on_tick(now + Duration::from_millis(500));

        let mut second = open_new(&backend, now);
        assert_eq!(second.choose_recovery(RecoveryChoice::Continue, now), None);
        assert!(second.is_restoring());
        assert!(!second.has_unsaved_changes());
        assert_eq!(second.publish(), None);
        assert_eq!(second.request_exit(), Some(ScreenCommand::Close));
        assert!(!second.is_confirming_exit());
        assert_eq!(
            second.cache().get(CacheSlot::New).map(|s| s.title),
            Some("Pending".to_string())
        );
    }

    #[test]
    fn recovery_draft_save_failure_keeps_prompt_open() {
        let backend = Store::default();
        let now = Instant::now();
        let mut first = open_new(&backend, now);
        type_title(&mut first, "Draft me");
        first.on_tick(now + Duration::from_millis(500));

        let mut second = open_new(&backend, now);
        assert_matches!(
            second.choose_recovery(RecoveryChoice::SaveDraft, now),
            Some(ScreenCommand::SaveDraft { origin: DraftOrigin::Recovery, .. })
        );
        assert!(second.is_busy());
        assert_eq!(second.choose_recovery(RecoveryChoice::Discard, now), None);
        assert!(second.cache().get(CacheSlot::New).is_some());

        let failed = DraftOutcome::Failed { message: "down".into() };
        second.on_draft_saved(DraftOrigin::Recovery, &failed, now);
        assert!(second.is_recovering());
        assert_eq!(
            second.take_notices(),
            vec![Notice::error("Failed to save draft")]
        );
    }

    #[test]
    fn abandon_caches_unsaved_state_before_closing() {
        let backend = Store::default();
        let now = Instant::now();
        let mut screen = open_new(&backend, now);
        type_title(&mut screen, "Unfinished");
        assert_eq!(screen.abandon(), ScreenCommand::Close);
        assert!(screen.is_closed());
        let cached = screen.cache().get(CacheSlot::New).expect("cached on abandon");
        assert_eq!(cached.title, "Unfinished");
    }
}
