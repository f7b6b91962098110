use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use server_api::{
    accounts::{self, LoginForm, LoginOutcome, SignupForm},
    forms::{CommentForm, NoteForm},
    login_route, logout_route, news, news_home_route, notes, notes_add_route, notes_done_route,
    notes_home_route, notes_list_route, signup_route, ApiContext, Outcome,
};
use shared::{
    domain::{CommentId, NewsId},
    error::{ApiError, ErrorCode},
    protocol::Page,
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod session;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use session::{clear_session_cookie, mint_session_token, session_cookie, CurrentActor};

const MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        settings: settings.site(),
    };
    let state = AppState {
        api,
        sessions: settings.sessions(),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(news_home_route(), get(http_news_home))
        .route(
            "/news/:news_id/",
            get(http_news_detail).post(http_post_comment),
        )
        .route(
            "/news/comments/:comment_id/edit/",
            get(http_edit_comment_form).post(http_edit_comment),
        )
        .route(
            "/news/comments/:comment_id/delete/",
            get(http_delete_comment_confirm)
                .post(http_delete_comment)
                .delete(http_delete_comment),
        )
        .route(notes_home_route(), get(http_notes_home))
        .route(notes_list_route(), get(http_list_notes))
        .route(notes_add_route(), get(http_add_note_form).post(http_add_note))
        .route(notes_done_route(), get(http_notes_done))
        .route("/notes/note/:slug/", get(http_note_detail))
        .route(
            "/notes/edit/:slug/",
            get(http_edit_note_form).post(http_edit_note),
        )
        .route(
            "/notes/delete/:slug/",
            get(http_delete_note_confirm)
                .post(http_delete_note)
                .delete(http_delete_note),
        )
        .route(signup_route(), get(http_signup_form).post(http_signup))
        .route(login_route(), get(http_login_form).post(http_login))
        .route(logout_route(), get(http_logout).post(http_logout))
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turns a view decision into HTTP. Anonymous access to a login-only route
/// becomes a redirect that remembers where the user was going.
fn respond(uri: &Uri, result: Result<Outcome, ApiError>) -> Response {
    match result {
        Ok(Outcome::Render(page)) => render(page),
        Ok(Outcome::Redirect(location)) => redirect(location),
        Err(error) => match error.code {
            ErrorCode::Unauthenticated => redirect(login_redirect(uri)),
            ErrorCode::NotFound => (StatusCode::NOT_FOUND, Json(error)).into_response(),
            ErrorCode::Internal => {
                error!(path = %uri.path(), error = %error.message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            }
        },
    }
}

fn respond_page(uri: &Uri, result: Result<Page, ApiError>) -> Response {
    respond(uri, result.map(Outcome::Render))
}

fn render(page: Page) -> Response {
    (StatusCode::OK, Json(page)).into_response()
}

fn redirect(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn login_redirect(uri: &Uri) -> String {
    let next = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={encoded}", login_route())
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_news_home(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    respond_page(&uri, news::news_home(&state.api).await)
}

async fn http_news_detail(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(news_id): Path<i64>,
) -> Response {
    respond_page(
        &uri,
        news::news_detail(&state.api, &actor, NewsId(news_id)).await,
    )
}

async fn http_post_comment(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(news_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    respond(
        &uri,
        news::post_comment(&state.api, &actor, NewsId(news_id), &form).await,
    )
}

async fn http_edit_comment_form(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(comment_id): Path<i64>,
) -> Response {
    respond_page(
        &uri,
        news::edit_comment_form(&state.api, &actor, CommentId(comment_id)).await,
    )
}

async fn http_edit_comment(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(comment_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    respond(
        &uri,
        news::edit_comment(&state.api, &actor, CommentId(comment_id), &form).await,
    )
}

async fn http_delete_comment_confirm(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(comment_id): Path<i64>,
) -> Response {
    respond_page(
        &uri,
        news::delete_comment_confirm(&state.api, &actor, CommentId(comment_id)).await,
    )
}

async fn http_delete_comment(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(comment_id): Path<i64>,
) -> Response {
    respond(
        &uri,
        news::delete_comment(&state.api, &actor, CommentId(comment_id)).await,
    )
}

async fn http_notes_home() -> Response {
    render(notes::notes_home())
}

async fn http_list_notes(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
) -> Response {
    respond_page(&uri, notes::list_notes(&state.api, &actor).await)
}

async fn http_add_note_form(CurrentActor(actor): CurrentActor, uri: Uri) -> Response {
    respond_page(&uri, notes::add_note_form(&actor))
}

async fn http_add_note(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Form(form): Form<NoteForm>,
) -> Response {
    respond(&uri, notes::add_note(&state.api, &actor, &form).await)
}

async fn http_notes_done(CurrentActor(actor): CurrentActor, uri: Uri) -> Response {
    respond_page(&uri, notes::notes_done(&actor))
}

async fn http_note_detail(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    respond_page(&uri, notes::note_detail(&state.api, &actor, &slug).await)
}

async fn http_edit_note_form(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    respond_page(&uri, notes::edit_note_form(&state.api, &actor, &slug).await)
}

async fn http_edit_note(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(slug): Path<String>,
    Form(form): Form<NoteForm>,
) -> Response {
    respond(
        &uri,
        notes::edit_note(&state.api, &actor, &slug, &form).await,
    )
}

async fn http_delete_note_confirm(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    respond_page(
        &uri,
        notes::delete_note_confirm(&state.api, &actor, &slug).await,
    )
}

async fn http_delete_note(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    uri: Uri,
    Path(slug): Path<String>,
) -> Response {
    respond(&uri, notes::delete_note(&state.api, &actor, &slug).await)
}

async fn http_signup_form() -> Response {
    render(accounts::signup_form())
}

async fn http_signup(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Form(form): Form<SignupForm>,
) -> Response {
    respond(&uri, accounts::signup(&state.api, &form).await)
}

async fn http_login_form(Query(q): Query<NextQuery>) -> Response {
    render(accounts::login_form(q.next.as_deref()))
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Response {
    let (user, next) = match accounts::login(&state.api, &form).await {
        Ok(LoginOutcome::LoggedIn { user, next }) => (user, next),
        Ok(LoginOutcome::Rejected(page)) => return render(page),
        Err(error) => return respond(&uri, Err(error)),
    };

    match mint_session_token(&state.sessions, &user) {
        Ok(token) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, next),
                (header::SET_COOKIE, session_cookie(&state.sessions, &token)),
            ],
        )
            .into_response(),
        Err(e) => respond(
            &uri,
            Err(ApiError::new(
                ErrorCode::Internal,
                format!("session token mint failed: {e}"),
            )),
        ),
    }
}

async fn http_logout() -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(accounts::logged_out()),
    )
        .into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
