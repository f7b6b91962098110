use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Comment, News, Note};

/// Submitted field values plus the per-field error lists shown next to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub data: BTreeMap<String, String>,
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Errors not tied to a single field are filed under this key.
pub const NON_FIELD_ERRORS: &str = "__all__";

impl FormState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            data: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            errors: BTreeMap::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Everything a view can render, tagged by view name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "context", rename_all = "snake_case")]
pub enum Page {
    NewsHome {
        news: Vec<News>,
    },
    NewsDetail {
        news: News,
        comments: Vec<Comment>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        form: Option<FormState>,
    },
    CommentEdit {
        comment: Comment,
        form: FormState,
    },
    CommentDelete {
        comment: Comment,
    },
    NotesHome,
    NotesList {
        notes: Vec<Note>,
    },
    NoteForm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<Note>,
        form: FormState,
    },
    NoteDetail {
        note: Note,
    },
    NoteDelete {
        note: Note,
    },
    NotesDone,
    Signup {
        form: FormState,
    },
    Login {
        form: FormState,
    },
    LoggedOut,
}

impl Page {
    pub fn form(&self) -> Option<&FormState> {
        match self {
            Page::NewsDetail { form, .. } => form.as_ref(),
            Page::CommentEdit { form, .. }
            | Page::NoteForm { form, .. }
            | Page::Signup { form }
            | Page::Login { form } => Some(form),
            _ => None,
        }
    }
}
