use serde::Deserialize;
use shared::{
    domain::{Actor, User, UserId},
    error::{ApiError, DuplicateUsername},
    protocol::{FormState, Page, NON_FIELD_ERRORS},
};
use tracing::{info, warn};

use crate::{forms::REQUIRED, internal, login_route, news_home_route, ApiContext, Outcome};

pub const USERNAME_MAX_CHARS: usize = 150;
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const UNKNOWN_USER: &str = "Please enter a correct username.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// A successful login hands the user back so the caller can open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn { user: User, next: String },
    Rejected(Page),
}

/// Maps a session's user id back to an actor. Sessions of deleted users
/// count as anonymous.
pub async fn resolve_actor(ctx: &ApiContext, user_id: Option<UserId>) -> Result<Actor, ApiError> {
    let Some(user_id) = user_id else {
        return Ok(Actor::Anonymous);
    };
    let user = ctx.storage.user(user_id).await.map_err(internal)?;
    Ok(user.map_or(Actor::Anonymous, Actor::User))
}

pub fn signup_form() -> Page {
    Page::Signup {
        form: FormState::empty(),
    }
}

pub async fn signup(ctx: &ApiContext, form: &SignupForm) -> Result<Outcome, ApiError> {
    let username = form.username.trim();
    let mut state = FormState::with_data([("username", username)]);
    if let Some(message) = username_problem(username) {
        state.add_error("username", message);
        return Ok(Outcome::Render(Page::Signup { form: state }));
    }

    let existing = ctx
        .storage
        .user_by_username(username)
        .await
        .map_err(internal)?;
    if existing.is_some() {
        state.add_error("username", USERNAME_TAKEN);
        return Ok(Outcome::Render(Page::Signup { form: state }));
    }

    create_account(ctx, username, state).await
}

/// A username registered since the lookup gets the same field error.
async fn create_account(
    ctx: &ApiContext,
    username: &str,
    mut state: FormState,
) -> Result<Outcome, ApiError> {
    match ctx.storage.create_user(username).await {
        Ok(user_id) => {
            info!(user_id = user_id.0, "user signed up");
            Ok(Outcome::Redirect(login_route().to_string()))
        }
        Err(err) if err.downcast_ref::<DuplicateUsername>().is_some() => {
            state.add_error("username", USERNAME_TAKEN);
            Ok(Outcome::Render(Page::Signup { form: state }))
        }
        Err(err) => Err(internal(err)),
    }
}

pub fn login_form(next: Option<&str>) -> Page {
    let mut form = FormState::empty();
    if let Some(next) = next.filter(|next| is_local_path(next)) {
        form.data.insert("next".into(), next.to_string());
    }
    Page::Login { form }
}

pub async fn login(ctx: &ApiContext, form: &LoginForm) -> Result<LoginOutcome, ApiError> {
    let username = form.username.trim();
    let next = form
        .next
        .as_deref()
        .filter(|next| is_local_path(next))
        .unwrap_or(news_home_route());
    let mut state = FormState::with_data([("username", username), ("next", next)]);

    if username.is_empty() {
        state.add_error("username", REQUIRED);
        return Ok(LoginOutcome::Rejected(Page::Login { form: state }));
    }

    match ctx
        .storage
        .user_by_username(username)
        .await
        .map_err(internal)?
    {
        Some(user) => {
            info!(user_id = user.id.0, "user logged in");
            Ok(LoginOutcome::LoggedIn {
                user,
                next: next.to_string(),
            })
        }
        None => {
            warn!("login attempt for unknown username");
            state.add_error(NON_FIELD_ERRORS, UNKNOWN_USER);
            Ok(LoginOutcome::Rejected(Page::Login { form: state }))
        }
    }
}

pub fn logged_out() -> Page {
    Page::LoggedOut
}

fn username_problem(username: &str) -> Option<String> {
    if username.is_empty() {
        return Some(REQUIRED.to_string());
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Some(format!(
            "Ensure this value has at most {USERNAME_MAX_CHARS} characters."
        ));
    }
    let allowed = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_' | ' '));
    if !allowed {
        return Some("Enter a valid username.".to_string());
    }
    None
}

/// Only same-site absolute paths are accepted as redirect targets.
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
#[path = "tests/accounts_tests.rs"]
mod tests;
