use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::cache::EntryFields;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A diary entry as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub notebook_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub mood: Option<Value>,
    #[serde(default)]
    pub location_snapshot: Option<Value>,
    #[serde(default)]
    pub weather_snapshot: Option<Value>,
    #[serde(default)]
    pub stats: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entry {
    /// Editable fields of the entry. Weather falls back to `stats.weather`
    /// for entries written before the snapshot column existed.
    pub fn fields(&self) -> EntryFields {
        let weather = self
            .weather_snapshot
            .clone()
            .filter(|w| !w.is_null())
            .or_else(|| {
                self.stats
                    .as_ref()
                    .and_then(|stats| stats.get("weather"))
                    .filter(|w| !w.is_null())
                    .cloned()
            });
        EntryFields {
            title: self.title.clone(),
            content: if self.content.is_null() {
                crate::document::empty_document()
            } else {
                self.content.clone()
            },
            notebook_id: Some(self.notebook_id),
            mood: self.mood.clone().filter(|m| !m.is_null()),
            location: self.location_snapshot.clone().filter(|l| !l.is_null()),
            tags: self.tags.clone(),
            weather,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPayload {
    pub title: String,
    pub content: Value,
    pub notebook_id: i64,
    pub date: Option<String>,
    pub mood: Option<Value>,
    pub location: Option<Value>,
    pub tags: Vec<String>,
    pub stats: EntryStats,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryStats {
    pub weather: Option<Value>,
}

impl EntryPayload {
    pub fn from_fields(fields: &EntryFields, notebook_id: i64) -> Self {
        Self {
            title: fields.title.trim().to_string(),
            content: fields.content.clone(),
            notebook_id,
            date: None,
            mood: fields.mood.clone(),
            location: fields.location.clone(),
            tags: fields.tags.clone(),
            stats: EntryStats {
                weather: fields.weather.clone(),
            },
        }
    }

    pub fn with_date(mut self, date: Option<String>) -> Self {
        self.date = date;
        self
    }
}
