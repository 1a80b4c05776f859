use crate::api::{ApiError, DiaryApi, Entry, EntryPayload};
use crate::cache::{EntryFields, EntrySnapshot};

pub const DRAFT_FALLBACK_TITLE: &str = "Untitled Draft";

/// Content to file as a brand-new entry in the drafts notebook.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRequest {
    fields: EntryFields,
}

impl DraftRequest {
    pub fn from_fields(fields: &EntryFields) -> Self {
        Self {
            fields: fields.clone(),
        }
    }

    pub fn from_snapshot(snapshot: &EntrySnapshot) -> Self {
        Self {
            fields: snapshot.fields(),
        }
    }

    pub fn fields(&self) -> &EntryFields {
        &self.fields
    }

    pub fn payload(&self, drafts_notebook_id: i64) -> EntryPayload {
        let mut payload = EntryPayload::from_fields(&self.fields, drafts_notebook_id);
        if payload.title.trim().is_empty() {
            payload.title = DRAFT_FALLBACK_TITLE.to_string();
        }
        payload
    }
}

/// Files `request` under the drafts notebook. Never touches the entry being edited.
pub fn save_draft<A: DiaryApi + ?Sized>(api: &A, request: &DraftRequest) -> Result<Entry, ApiError> {
    let notebook = api.ensure_drafts_notebook()?;
    let entry = api.create_entry(&request.payload(notebook.id))?;
    tracing::info!(entry_id = entry.id, notebook_id = notebook.id, "saved draft");
    Ok(entry)
}

/// Result of a draft save as reported back to the flow that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftOutcome {
    Saved { entry_id: i64 },
    Failed { message: String },
}

impl From<&Result<Entry, ApiError>> for DraftOutcome {
    fn from(result: &Result<Entry, ApiError>) -> Self {
        match result {
            Ok(entry) => DraftOutcome::Saved { entry_id: entry.id },
            Err(err) => DraftOutcome::Failed {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_title_falls_back_to_untitled_draft() {
        let request = DraftRequest::from_fields(&EntryFields {
            title: "   ".into(),
            notebook_id: Some(3),
            mood: Some(json!({"emoji": "🤔", "label": "Thoughtful"})),
            tags: vec!["idea".into()],
            ..EntryFields::default()
        });
        let payload = request.payload(99);
        assert_eq!(payload.title, DRAFT_FALLBACK_TITLE);
        assert_eq!(payload.notebook_id, 99);
        assert_eq!(payload.tags, vec!["idea".to_string()]);
        assert!(payload.mood.is_some());
        assert_eq!(payload.date, None);
    }

    #[test]
    fn draft_title_is_sent_trimmed() {
        let request = DraftRequest::from_fields(&EntryFields {
            title: "  Night ferry \n".into(),
            notebook_id: Some(3),
            ..EntryFields::default()
        });
        assert_eq!(request.payload(99).title, "Night ferry");
        assert_eq!(request.fields().title, "  Night ferry \n");
    }

    #[test]
    fn outcome_reports_failures_as_messages() {
        let failed: Result<Entry, ApiError> = Err(ApiError::Status {
            status: 503,
            body: "down".into(),
        });
        assert_eq!(
            DraftOutcome::from(&failed),
            DraftOutcome::Failed {
                message: "server returned HTTP 503: down".into()
            }
        );
    }
}
