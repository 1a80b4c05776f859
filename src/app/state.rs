use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::api::Notebook;
use crate::editor::Mood;

use super::screen::{Notice, NoticeLevel};

const MAX_TOASTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    NotebookPicker { selected: usize },
    MoodPicker { selected: usize },
    TagInput { input: String },
    Help,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub level: NoticeLevel,
    pub message: String,
    expires_at: Instant,
}

/// Transient notifications, newest last.
#[derive(Debug)]
pub struct Toasts {
    items: VecDeque<Toast>,
    ttl: Duration,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            ttl,
        }
    }

    /// A repeat of a visible toast only extends its lifetime.
    pub fn push(&mut self, notice: Notice, now: Instant) {
        if let Some(live) = self
            .items
            .iter_mut()
            .find(|toast| toast.level == notice.level && toast.message == notice.message)
        {
            live.expires_at = now + self.ttl;
            return;
        }
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            level: notice.level,
            message: notice.message,
            expires_at: now + self.ttl,
        });
    }

    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|toast| toast.expires_at > now);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Terminal-side state that is not part of the entry itself.
#[derive(Debug)]
pub struct UiState {
    notebooks: Vec<Notebook>,
    overlay: Option<Overlay>,
    pub toasts: Toasts,
    /// Label of the request the worker is running.
    pub in_flight: Option<&'static str>,
}

impl UiState {
    pub fn new(notebooks: Vec<Notebook>, toast_ttl: Duration) -> Self {
        Self {
            notebooks,
            overlay: None,
            toasts: Toasts::new(toast_ttl),
            in_flight: None,
        }
    }

    pub fn notebooks(&self) -> &[Notebook] {
        &self.notebooks
    }

    pub fn notebook_name(&self, id: i64) -> Option<&str> {
        self.notebooks
            .iter()
            .find(|notebook| notebook.id == id)
            .map(|notebook| notebook.name.as_str())
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut Overlay> {
        self.overlay.as_mut()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_notebook_picker(&mut self, current: Option<i64>) -> bool {
        if self.notebooks.is_empty() {
            return false;
        }
        let selected = current
            .and_then(|id| self.notebooks.iter().position(|n| n.id == id))
            .unwrap_or(0);
        self.overlay = Some(Overlay::NotebookPicker { selected });
        true
    }

    pub fn open_mood_picker(&mut self, current: Option<Mood>) {
        let selected = current
            .and_then(|mood| Mood::all().iter().position(|m| *m == mood))
            .unwrap_or(0);
        self.overlay = Some(Overlay::MoodPicker { selected });
    }

    pub fn open_tag_input(&mut self) {
        self.overlay = Some(Overlay::TagInput {
            input: String::new(),
        });
    }

    pub fn open_help(&mut self) {
        self.overlay = Some(Overlay::Help);
    }

    /// Moves the picker cursor, wrapping at both ends.
    pub fn move_selection(&mut self, delta: isize) {
        let len = match &self.overlay {
            Some(Overlay::NotebookPicker { .. }) => self.notebooks.len(),
            Some(Overlay::MoodPicker { .. }) => Mood::all().len(),
            _ => return,
        };
        if len == 0 {
            return;
        }
        if let Some(Overlay::NotebookPicker { selected } | Overlay::MoodPicker { selected }) =
            self.overlay.as_mut()
        {
            let next = (*selected as isize + delta).rem_euclid(len as isize);
            *selected = next as usize;
        }
    }

    pub fn selected_notebook(&self) -> Option<&Notebook> {
        match &self.overlay {
            Some(Overlay::NotebookPicker { selected }) => self.notebooks.get(*selected),
            _ => None,
        }
    }

    pub fn selected_mood(&self) -> Option<Mood> {
        match &self.overlay {
            Some(Overlay::MoodPicker { selected }) => Mood::all().get(*selected).copied(),
            _ => None,
        }
    }
}
