use async_trait::async_trait;
use serde::Deserialize;
use shared::{
    domain::NoteId,
    error::DuplicateSlug,
    protocol::FormState,
};
use storage::{NoteFields, Storage};

use crate::SiteSettings;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_SLUG: &str =
    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.";
pub const UNDERIVABLE_SLUG: &str = "Could not derive a slug from the title.";
pub const TITLE_MAX_CHARS: usize = 100;
pub const SLUG_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn state(&self) -> FormState {
        FormState::with_data([("text", self.text.as_str())])
    }

    /// Returns the cleaned text, or the form re-populated with its errors.
    pub fn validate(&self, settings: &SiteSettings) -> Result<String, FormState> {
        let text = self.text.trim();
        let mut state = self.state();
        if text.is_empty() {
            state.add_error("text", REQUIRED);
        } else if contains_banned_word(text, &settings.banned_words) {
            state.add_error("text", settings.comment_warning.clone());
        }

        if state.is_valid() {
            Ok(text.to_string())
        } else {
            Err(state)
        }
    }
}

/// Case-insensitive substring match against the banned list.
pub fn contains_banned_word(text: &str, banned_words: &[String]) -> bool {
    let lowered = text.to_lowercase();
    banned_words
        .iter()
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .any(|word| lowered.contains(&word))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl NoteForm {
    pub fn state(&self) -> FormState {
        FormState::with_data([
            ("title", self.title.as_str()),
            ("text", self.text.as_str()),
            ("slug", self.slug.as_deref().unwrap_or_default()),
        ])
    }

    /// Field rules that need no store access. The slug is derived from the
    /// title when none was submitted.
    pub fn clean(&self) -> Result<NoteFields, FormState> {
        let mut state = self.state();
        let title = self.title.trim();
        let text = self.text.trim();

        if title.is_empty() {
            state.add_error("title", REQUIRED);
        } else if title.chars().count() > TITLE_MAX_CHARS {
            state.add_error(
                "title",
                format!(
                    "Ensure this value has at most {TITLE_MAX_CHARS} characters (it has {}).",
                    title.chars().count()
                ),
            );
        }
        if text.is_empty() {
            state.add_error("text", REQUIRED);
        }

        let submitted = self
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty());
        let slug = match submitted {
            Some(slug) if !is_valid_slug(slug) => {
                state.add_error("slug", INVALID_SLUG);
                None
            }
            Some(slug) => Some(slug.to_string()),
            None if title.is_empty() => None,
            None => {
                let derived = slug_from_title(title);
                if derived.is_empty() {
                    state.add_error("slug", UNDERIVABLE_SLUG);
                    None
                } else {
                    Some(derived)
                }
            }
        };

        match slug {
            Some(slug) if state.is_valid() => Ok(NoteFields {
                title: title.to_string(),
                text: text.to_string(),
                slug,
            }),
            _ => Err(state),
        }
    }

    /// Full validation including the global slug uniqueness check. `editing`
    /// is the note being changed, which may keep its own slug.
    ///
    /// The outer error is a store failure; the inner one a rejected form.
    pub async fn validate(
        &self,
        lookup: &dyn SlugLookup,
        editing: Option<NoteId>,
        settings: &SiteSettings,
    ) -> anyhow::Result<Result<NoteFields, FormState>> {
        let fields = match self.clean() {
            Ok(fields) => fields,
            Err(state) => return Ok(Err(state)),
        };
        if lookup.slug_taken(&fields.slug, editing).await? {
            return Ok(Err(self.duplicate_slug(&fields.slug, settings)));
        }
        Ok(Ok(fields))
    }

    pub fn duplicate_slug(&self, slug: &str, settings: &SiteSettings) -> FormState {
        let mut state = self.state();
        state.add_error("slug", format!("{slug}{}", settings.slug_warning));
        state
    }

    /// Turns a store-level slug collision into the same form error the
    /// lookup would have produced.
    pub fn store_conflict(
        &self,
        err: &anyhow::Error,
        settings: &SiteSettings,
    ) -> Option<FormState> {
        err.downcast_ref::<DuplicateSlug>()
            .map(|duplicate| self.duplicate_slug(&duplicate.slug, settings))
    }
}

#[async_trait]
pub trait SlugLookup: Send + Sync {
    async fn slug_taken(&self, slug: &str, exclude: Option<NoteId>) -> anyhow::Result<bool>;
}

#[async_trait]
impl SlugLookup for Storage {
    async fn slug_taken(&self, slug: &str, exclude: Option<NoteId>) -> anyhow::Result<bool> {
        Storage::slug_taken(self, slug, exclude).await
    }
}

/// Lowercase ASCII slug with non-Latin scripts transliterated.
pub fn slug_from_title(title: &str) -> String {
    let slug = slug::slugify(title);
    slug.chars()
        .take(SLUG_MAX_CHARS)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.chars().count() <= SLUG_MAX_CHARS
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
