//! In-memory state of the entry being written.

use indexmap::IndexSet;
use serde_json::Value;

use crate::cache::{EntryFields, EntrySnapshot};
use crate::document::{document_to_text, empty_document, is_plain_text_document, text_to_document};

mod buffer;
mod mood;

pub use buffer::TextBuffer;
pub use mood::{describe_mood, Mood};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Title,
    Body,
}

#[derive(Debug, Clone)]
pub struct EditorState {
    title: TextBuffer,
    body: TextBuffer,
    focus: Focus,
    notebook_id: Option<i64>,
    mood: Option<Value>,
    location: Option<Value>,
    weather: Option<Value>,
    tags: IndexSet<String>,
    /// Document the body was loaded from, and its plain-text rendering.
    source_document: Value,
    source_text: String,
}

impl EditorState {
    pub fn blank(notebook_id: Option<i64>) -> Self {
        Self::from_fields(&EntryFields {
            notebook_id,
            ..EntryFields::default()
        })
    }

    pub fn from_fields(fields: &EntryFields) -> Self {
        let source_text = document_to_text(&fields.content);
        let mut body = TextBuffer::multi_line(&source_text);
        body.set_read_only(!is_plain_text_document(&fields.content));
        Self {
            title: TextBuffer::single_line(&fields.title),
            body,
            focus: if fields.title.is_empty() {
                Focus::Title
            } else {
                Focus::Body
            },
            notebook_id: fields.notebook_id,
            mood: fields.mood.clone(),
            location: fields.location.clone(),
            weather: fields.weather.clone(),
            tags: fields.tags.iter().cloned().collect(),
            source_document: fields.content.clone(),
            source_text,
        }
    }

    /// Current editable state. The loaded document is passed through untouched
    /// until the body text diverges from it.
    pub fn fields(&self) -> EntryFields {
        let content = if self.body.text() == self.source_text {
            self.source_document.clone()
        } else {
            text_to_document(self.body.text())
        };
        EntryFields {
            title: self.title.text().to_string(),
            content,
            notebook_id: self.notebook_id,
            mood: self.mood.clone(),
            location: self.location.clone(),
            tags: self.tags.iter().cloned().collect(),
            weather: self.weather.clone(),
        }
    }

    /// Title, notebook, mood, location, weather and tags of a recovered snapshot.
    /// Content follows separately through [`EditorState::apply_restored_content`].
    pub fn apply_restored_metadata(&mut self, snapshot: &EntrySnapshot) {
        self.title.reset(&snapshot.title);
        self.notebook_id = Some(snapshot.notebook_id);
        self.mood = snapshot.mood.clone();
        self.location = snapshot.location.clone();
        self.weather = snapshot.weather.clone();
        self.tags = snapshot.tags.iter().cloned().collect();
    }

    pub fn apply_restored_content(&mut self, content: &Value) {
        let content = if content.is_null() {
            empty_document()
        } else {
            content.clone()
        };
        self.source_text = document_to_text(&content);
        self.body.reset(&self.source_text);
        self.body.set_read_only(!is_plain_text_document(&content));
        self.source_document = content;
    }

    /// The body came from a document plain text cannot reproduce, so it is
    /// shown but not edited. Title and metadata stay editable.
    pub fn body_is_read_only(&self) -> bool {
        self.body.is_read_only()
    }

    pub fn title(&self) -> &TextBuffer {
        &self.title
    }

    pub fn body(&self) -> &TextBuffer {
        &self.body
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Title => Focus::Body,
            Focus::Body => Focus::Title,
        };
    }

    pub fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    pub fn active_mut(&mut self) -> &mut TextBuffer {
        match self.focus {
            Focus::Title => &mut self.title,
            Focus::Body => &mut self.body,
        }
    }

    /// Enter in the title moves to the body; in the body it splits the line.
    pub fn enter(&mut self) -> bool {
        match self.focus {
            Focus::Title => {
                self.focus = Focus::Body;
                true
            }
            Focus::Body => self.body.insert_newline(),
        }
    }

    pub fn notebook_id(&self) -> Option<i64> {
        self.notebook_id
    }

    pub fn set_notebook(&mut self, notebook_id: Option<i64>) {
        self.notebook_id = notebook_id;
    }

    pub fn mood(&self) -> Option<&Value> {
        self.mood.as_ref()
    }

    pub fn set_mood(&mut self, mood: Option<Mood>) {
        self.mood = mood.map(Mood::to_value);
    }

    pub fn location(&self) -> Option<&Value> {
        self.location.as_ref()
    }

    pub fn weather(&self) -> Option<&Value> {
        self.weather.as_ref()
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    /// Adds a trimmed tag; returns false for blanks and duplicates.
    pub fn add_tag(&mut self, raw: &str) -> bool {
        let tag = raw.trim().trim_start_matches('#').trim();
        if tag.is_empty() {
            return false;
        }
        self.tags.insert(tag.to_string())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.shift_remove(tag)
    }

    pub fn pop_tag(&mut self) -> Option<String> {
        self.tags.pop()
    }
}
