use crate::cache::{format_cache_time, CacheSlot, EntrySnapshot, LocalCacheStore};
use crate::storage::KeyValueStore;

use super::drafts::{DraftOutcome, DraftRequest};

const PREVIEW_TAGS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Nothing worth recovering was cached.
    Fresh,
    Restored(Box<EntrySnapshot>),
    DraftSaved { entry_id: i64 },
    Discarded,
    /// Closed without a choice; the snapshot stays cached.
    Dismissed,
}

impl RecoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryOutcome::Fresh => "fresh",
            RecoveryOutcome::Restored(_) => "restored",
            RecoveryOutcome::DraftSaved { .. } => "draft_saved",
            RecoveryOutcome::Discarded => "discarded",
            RecoveryOutcome::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryState {
    Checking,
    PromptShown {
        snapshot: Box<EntrySnapshot>,
        saving: bool,
    },
    Resolved(RecoveryOutcome),
}

/// Decides what happens to a cached snapshot when an editor screen opens.
#[derive(Debug)]
pub struct RecoveryFlow {
    slot: CacheSlot,
    state: RecoveryState,
}

impl RecoveryFlow {
    pub fn new(slot: CacheSlot) -> Self {
        Self {
            slot,
            state: RecoveryState::Checking,
        }
    }

    /// Creates the flow and runs the cache check in one step.
    pub fn start<S: KeyValueStore>(slot: CacheSlot, cache: &LocalCacheStore<S>) -> Self {
        let mut flow = Self::new(slot);
        flow.check(cache);
        flow
    }

    pub fn check<S: KeyValueStore>(&mut self, cache: &LocalCacheStore<S>) -> &RecoveryState {
        if matches!(self.state, RecoveryState::Checking) {
            self.state = match cache.get(self.slot) {
                Some(snapshot) if !snapshot.is_empty() => {
                    tracing::info!(slot = %self.slot, cached_at = snapshot.cached_at, "found recoverable snapshot");
                    RecoveryState::PromptShown {
                        snapshot: Box::new(snapshot),
                        saving: false,
                    }
                }
                _ => RecoveryState::Resolved(RecoveryOutcome::Fresh),
            };
        }
        &self.state
    }

    pub fn slot(&self) -> CacheSlot {
        self.slot
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    pub fn is_prompting(&self) -> bool {
        matches!(self.state, RecoveryState::PromptShown { .. })
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.state, RecoveryState::PromptShown { saving: true, .. })
    }

    pub fn outcome(&self) -> Option<&RecoveryOutcome> {
        match &self.state {
            RecoveryState::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&EntrySnapshot> {
        match &self.state {
            RecoveryState::PromptShown { snapshot, .. } => Some(&**snapshot),
            _ => None,
        }
    }

    pub fn prompt(&self, now_ms: i64) -> Option<RecoveryPrompt> {
        self.snapshot()
            .map(|snapshot| RecoveryPrompt::from_snapshot(snapshot, now_ms))
    }

    /// Resolves to `Restored`, handing back the snapshot to inject.
    pub fn continue_editing(&mut self) -> Option<EntrySnapshot> {
        let snapshot = self.take_idle_prompt()?;
        self.state = RecoveryState::Resolved(RecoveryOutcome::Restored(snapshot.clone()));
        self.log_resolution();
        Some(*snapshot)
    }

    pub fn discard<S: KeyValueStore>(&mut self, cache: &LocalCacheStore<S>) -> bool {
        if self.take_idle_prompt().is_none() {
            return false;
        }
        cache.remove(self.slot);
        self.state = RecoveryState::Resolved(RecoveryOutcome::Discarded);
        self.log_resolution();
        true
    }

    pub fn dismiss(&mut self) -> bool {
        if self.take_idle_prompt().is_none() {
            return false;
        }
        self.state = RecoveryState::Resolved(RecoveryOutcome::Dismissed);
        self.log_resolution();
        true
    }

    pub fn begin_save_as_draft(&mut self) -> Option<DraftRequest> {
        match &mut self.state {
            RecoveryState::PromptShown { snapshot, saving } if !*saving => {
                *saving = true;
                Some(DraftRequest::from_snapshot(&**snapshot))
            }
            _ => None,
        }
    }

    /// Returns true when the flow resolved. A failed save reopens the prompt
    /// with the cache untouched.
    pub fn complete_save_as_draft<S: KeyValueStore>(
        &mut self,
        cache: &LocalCacheStore<S>,
        outcome: &DraftOutcome,
    ) -> bool {
        let RecoveryState::PromptShown { saving, .. } = &mut self.state else {
            return false;
        };
        if !*saving {
            return false;
        }
        match outcome {
            DraftOutcome::Saved { entry_id } => {
                cache.remove(self.slot);
                self.state = RecoveryState::Resolved(RecoveryOutcome::DraftSaved {
                    entry_id: *entry_id,
                });
                self.log_resolution();
                true
            }
            DraftOutcome::Failed { message } => {
                *saving = false;
                tracing::warn!(slot = %self.slot, %message, "draft save from recovery failed");
                false
            }
        }
    }

    fn take_idle_prompt(&self) -> Option<Box<EntrySnapshot>> {
        match &self.state {
            RecoveryState::PromptShown {
                snapshot,
                saving: false,
            } => Some(snapshot.clone()),
            _ => None,
        }
    }

    fn log_resolution(&self) {
        if let Some(outcome) = self.outcome() {
            tracing::info!(slot = %self.slot, outcome = outcome.as_str(), "recovery resolved");
        }
    }
}

/// Everything the recovery modal shows about a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPrompt {
    pub heading: &'static str,
    pub relative_time: String,
    pub title: String,
    pub subtitle: String,
    pub mood_emoji: Option<String>,
    pub tags: Vec<String>,
    pub extra_tags: usize,
}

impl RecoveryPrompt {
    pub fn from_snapshot(snapshot: &EntrySnapshot, now_ms: i64) -> Self {
        let slot = snapshot.slot();
        let (heading, subtitle) = match slot {
            CacheSlot::New => ("Unsaved Draft", "New diary entry".to_string()),
            CacheSlot::Editing(id) => ("Unsaved Changes", format!("Editing diary #{id}")),
        };
        let title = match snapshot.title.trim() {
            "" => "Untitled".to_string(),
            title => title.to_string(),
        };
        let mood_emoji = snapshot
            .mood
            .as_ref()
            .and_then(|mood| mood.get("emoji"))
            .and_then(|emoji| emoji.as_str())
            .map(str::to_string);
        Self {
            heading,
            relative_time: format_cache_time(snapshot.cached_at, now_ms),
            title,
            subtitle,
            mood_emoji,
            tags: snapshot.tags.iter().take(PREVIEW_TAGS).cloned().collect(),
            extra_tags: snapshot.tags.len().saturating_sub(PREVIEW_TAGS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryFields;
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn cached(cache: &LocalCacheStore<MemoryStore>, slot: CacheSlot, title: &str) -> EntrySnapshot {
        let fields = EntryFields {
            title: title.into(),
            notebook_id: Some(2),
            mood: Some(json!({"emoji": "🥳", "label": "Celebrate"})),
            tags: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            ..EntryFields::default()
        };
        let snapshot = EntrySnapshot::capture(slot, &fields, 1_000, None).expect("valid");
        cache.put(&snapshot);
        snapshot
    }

    #[test]
    fn empty_or_missing_cache_resolves_fresh() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        let flow = RecoveryFlow::start(CacheSlot::New, &cache);
        assert_eq!(flow.outcome(), Some(&RecoveryOutcome::Fresh));

        cached(&cache, CacheSlot::New, " ");
        let flow = RecoveryFlow::start(CacheSlot::New, &cache);
        assert_eq!(flow.outcome(), Some(&RecoveryOutcome::Fresh));
    }

    #[test]
    fn continue_editing_hands_back_the_snapshot() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        let snapshot = cached(&cache, CacheSlot::Editing(8), "Keep me");
        let mut flow = RecoveryFlow::start(CacheSlot::Editing(8), &cache);
        assert!(flow.is_prompting());
        assert_eq!(flow.continue_editing(), Some(snapshot));
        assert_matches!(flow.outcome(), Some(RecoveryOutcome::Restored(_)));
        assert_eq!(flow.continue_editing(), None);
    }

    #[test]
    fn dismiss_keeps_the_snapshot_cached() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        cached(&cache, CacheSlot::New, "Someday");
        let mut flow = RecoveryFlow::start(CacheSlot::New, &cache);
        assert!(flow.dismiss());
        assert_eq!(flow.outcome(), Some(&RecoveryOutcome::Dismissed));
        assert!(cache.get(CacheSlot::New).is_some());
    }

    #[test]
    fn failed_draft_save_reopens_prompt_and_keeps_cache() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        cached(&cache, CacheSlot::New, "Precious");
        let mut flow = RecoveryFlow::start(CacheSlot::New, &cache);

        let request = flow.begin_save_as_draft().expect("prompt idle");
        assert_eq!(request.fields().title, "Precious");
        assert!(flow.is_saving());
        assert!(flow.begin_save_as_draft().is_none());
        assert!(!flow.discard(&cache));
        assert!(!flow.dismiss());

        let failed = DraftOutcome::Failed {
            message: "offline".into(),
        };
        assert!(!flow.complete_save_as_draft(&cache, &failed));
        assert!(flow.is_prompting());
        assert!(!flow.is_saving());
        assert!(cache.get(CacheSlot::New).is_some());

        flow.begin_save_as_draft().expect("retry allowed");
        assert!(flow.complete_save_as_draft(&cache, &DraftOutcome::Saved { entry_id: 77 }));
        assert_eq!(
            flow.outcome(),
            Some(&RecoveryOutcome::DraftSaved { entry_id: 77 })
        );
        assert_eq!(cache.get(CacheSlot::New), None);
    }

    #[test]
    fn prompt_previews_title_mood_and_three_tags() {
        let cache = LocalCacheStore::new(MemoryStore::new());
        cached(&cache, CacheSlot::Editing(12), "");
        let mut snapshot = cache.get(CacheSlot::Editing(12)).expect("cached");
        snapshot.title.clear();
        let prompt = RecoveryPrompt::from_snapshot(&snapshot, 1_000 + 3 * 60_000);
        assert_eq!(prompt.heading, "Unsaved Changes");
        assert_eq!(prompt.subtitle, "Editing diary #12");
        assert_eq!(prompt.title, "Untitled");
        assert_eq!(prompt.relative_time, "3 mins ago");
        assert_eq!(prompt.mood_emoji.as_deref(), Some("🥳"));
        assert_eq!(prompt.tags, vec!["a", "b", "c"]);
        assert_eq!(prompt.extra_tags, 2);
    }
}
