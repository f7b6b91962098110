use shared::{
    domain::{CommentId, NewsId},
    error::{ApiError, ErrorCode},
    protocol::Page,
};
use storage::Storage;

pub mod accounts;
pub mod forms;
pub mod news;
pub mod notes;
pub mod policy;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub settings: SiteSettings,
}

/// Content rules shared by every view. Injected at construction; handlers
/// never read process-wide state.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub news_count_on_home_page: u32,
    pub banned_words: Vec<String>,
    pub comment_warning: String,
    /// Appended to the offending slug, e.g. `"my-slug - such slug ..."`.
    pub slug_warning: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            news_count_on_home_page: 10,
            banned_words: vec!["редиска".into(), "негодяй".into()],
            comment_warning: "Don't swear!".into(),
            slug_warning: " - such slug already exists, please choose a unique value!".into(),
        }
    }
}

/// What a write view decided: show a page (GET, or a rejected form) or move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Render(Page),
    Redirect(String),
}

pub fn news_home_route() -> &'static str {
    "/news/"
}

pub fn news_detail_route(news_id: NewsId) -> String {
    format!("/news/{}/", news_id.0)
}

pub fn news_comments_anchor(news_id: NewsId) -> String {
    format!("{}#comments", news_detail_route(news_id))
}

pub fn comment_edit_route(comment_id: CommentId) -> String {
    format!("/news/comments/{}/edit/", comment_id.0)
}

pub fn comment_delete_route(comment_id: CommentId) -> String {
    format!("/news/comments/{}/delete/", comment_id.0)
}

pub fn notes_home_route() -> &'static str {
    "/notes/"
}

pub fn notes_list_route() -> &'static str {
    "/notes/list/"
}

pub fn notes_add_route() -> &'static str {
    "/notes/add/"
}

pub fn notes_done_route() -> &'static str {
    "/notes/done/"
}

pub fn note_detail_route(slug: &str) -> String {
    format!("/notes/note/{slug}/")
}

pub fn note_edit_route(slug: &str) -> String {
    format!("/notes/edit/{slug}/")
}

pub fn note_delete_route(slug: &str) -> String {
    format!("/notes/delete/{slug}/")
}

pub fn login_route() -> &'static str {
    "/auth/login/"
}

pub fn logout_route() -> &'static str {
    "/auth/logout/"
}

pub fn signup_route() -> &'static str {
    "/auth/signup/"
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod support;
