use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::emptiness::is_blank_entry;
use crate::document::empty_document;

pub const CACHE_KEY_PREFIX: &str = "journey_diary_cache_";
const NEW_CACHE_ID: &str = "new";
const EDIT_CACHE_ID_PREFIX: &str = "edit_";

/// Storage slot of a snapshot: the singleton new-entry slot or one slot per edited entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    New,
    Editing(i64),
}

impl CacheSlot {
    pub fn resolve(is_new: bool, entry_id: Option<i64>) -> Self {
        match entry_id {
            Some(id) if !is_new => CacheSlot::Editing(id),
            _ => CacheSlot::New,
        }
    }

    pub fn for_entry(entry_id: Option<i64>) -> Self {
        Self::resolve(entry_id.is_none(), entry_id)
    }

    pub fn cache_id(self) -> String {
        match self {
            CacheSlot::New => NEW_CACHE_ID.to_string(),
            CacheSlot::Editing(id) => format!("{EDIT_CACHE_ID_PREFIX}{id}"),
        }
    }

    pub fn storage_key(self) -> String {
        format!("{CACHE_KEY_PREFIX}{}", self.cache_id())
    }

    pub fn from_cache_id(cache_id: &str) -> Option<Self> {
        if cache_id == NEW_CACHE_ID {
            return Some(CacheSlot::New);
        }
        cache_id
            .strip_prefix(EDIT_CACHE_ID_PREFIX)?
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(CacheSlot::Editing)
    }

    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::from_cache_id(key.strip_prefix(CACHE_KEY_PREFIX)?)
    }

    pub fn is_new(self) -> bool {
        matches!(self, CacheSlot::New)
    }

    pub fn entry_id(self) -> Option<i64> {
        match self {
            CacheSlot::New => None,
            CacheSlot::Editing(id) => Some(id),
        }
    }
}

impl fmt::Display for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_id())
    }
}

/// The editable part of an entry; its serialized form drives change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    pub title: String,
    pub content: Value,
    pub notebook_id: Option<i64>,
    pub mood: Option<Value>,
    pub location: Option<Value>,
    pub tags: Vec<String>,
    pub weather: Option<Value>,
}

impl Default for EntryFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: empty_document(),
            notebook_id: None,
            mood: None,
            location: None,
            tags: Vec::new(),
            weather: None,
        }
    }
}

impl EntryFields {
    pub fn digest(&self) -> StateDigest {
        StateDigest(serde_json::to_string(self).unwrap_or_default())
    }

    pub fn is_empty(&self) -> bool {
        is_blank_entry(&self.title, &self.content)
    }
}

/// Serialized editor state, compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDigest(String);

impl StateDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub cache_id: String,
    pub entry_id: Option<i64>,
    pub title: String,
    pub content: Value,
    pub notebook_id: i64,
    pub mood: Option<Value>,
    pub location: Option<Value>,
    pub weather: Option<Value>,
    pub tags: Vec<String>,
    /// Epoch milliseconds.
    pub cached_at: i64,
    pub is_new_diary: bool,
    pub original_created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    cache_id: Option<String>,
    entry_id: Option<i64>,
    title: Option<String>,
    #[serde(default)]
    content: Value,
    notebook_id: Option<i64>,
    mood: Option<Value>,
    location: Option<Value>,
    weather: Option<Value>,
    tags: Option<Vec<String>>,
    cached_at: Option<i64>,
    is_new_diary: Option<bool>,
    original_created_at: Option<String>,
}

impl EntrySnapshot {
    /// Builds a snapshot of `fields` for `slot`; `None` when no notebook is selected,
    /// since such a snapshot could never be loaded back.
    pub fn capture(
        slot: CacheSlot,
        fields: &EntryFields,
        cached_at: i64,
        original_created_at: Option<String>,
    ) -> Option<Self> {
        let notebook_id = fields.notebook_id.filter(|id| *id != 0)?;
        Some(Self {
            cache_id: slot.cache_id(),
            entry_id: slot.entry_id(),
            title: fields.title.clone(),
            content: fields.content.clone(),
            notebook_id,
            mood: opaque(fields.mood.clone()),
            location: opaque(fields.location.clone()),
            weather: opaque(fields.weather.clone()),
            tags: fields.tags.clone(),
            cached_at,
            is_new_diary: slot.is_new(),
            original_created_at: if slot.is_new() {
                None
            } else {
                original_created_at
            },
        })
    }

    pub fn slot(&self) -> CacheSlot {
        CacheSlot::from_cache_id(&self.cache_id)
            .unwrap_or_else(|| CacheSlot::resolve(self.is_new_diary, self.entry_id))
    }

    pub fn fields(&self) -> EntryFields {
        EntryFields {
            title: self.title.clone(),
            content: self.content.clone(),
            notebook_id: Some(self.notebook_id),
            mood: self.mood.clone(),
            location: self.location.clone(),
            tags: self.tags.clone(),
            weather: self.weather.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        is_blank_entry(&self.title, &self.content)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a stored value. Malformed input and snapshots missing `notebookId`
    /// or `cachedAt` yield `None`.
    pub fn decode(raw: &str) -> Option<Self> {
        let parsed: RawSnapshot = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(%err, "ignoring unparsable cache snapshot");
                return None;
            }
        };
        let notebook_id = parsed.notebook_id.filter(|id| *id != 0)?;
        let cached_at = parsed.cached_at.filter(|ts| *ts > 0)?;
        let is_new_diary = parsed.is_new_diary.unwrap_or(parsed.entry_id.is_none());
        let cache_id = parsed
            .cache_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| CacheSlot::resolve(is_new_diary, parsed.entry_id).cache_id());
        Some(Self {
            cache_id,
            entry_id: parsed.entry_id,
            title: parsed.title.unwrap_or_default(),
            content: parsed.content,
            notebook_id,
            mood: opaque(parsed.mood),
            location: opaque(parsed.location),
            weather: opaque(parsed.weather),
            tags: parsed.tags.unwrap_or_default(),
            cached_at,
            is_new_diary,
            original_created_at: parsed.original_created_at,
        })
    }
}

fn opaque(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
