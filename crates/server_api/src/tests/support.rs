use chrono::{Duration, Utc};
use shared::domain::{Actor, NewsId, User};
use storage::{NoteFields, Storage};

use crate::{ApiContext, SiteSettings};

pub(crate) async fn context() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext {
        storage,
        settings: SiteSettings::default(),
    }
}

pub(crate) async fn actor(ctx: &ApiContext, username: &str) -> Actor {
    let id = ctx.storage.create_user(username).await.expect("user");
    Actor::User(User {
        id,
        username: username.to_string(),
    })
}

pub(crate) fn user_of(actor: &Actor) -> &User {
    actor.user().expect("authenticated actor")
}

pub(crate) async fn news(ctx: &ApiContext, title: &str) -> NewsId {
    ctx.storage
        .create_news(title, "Just text.", Utc::now().date_naive())
        .await
        .expect("news")
}

pub(crate) async fn news_feed(ctx: &ApiContext, count: i64) {
    let today = Utc::now().date_naive();
    for index in 0..count {
        ctx.storage
            .create_news(
                &format!("News {index}"),
                "Just text.",
                today - Duration::days(index),
            )
            .await
            .expect("news");
    }
}

pub(crate) fn note_fields(title: &str, slug: &str) -> NoteFields {
    NoteFields {
        title: title.to_string(),
        text: "Text".to_string(),
        slug: slug.to_string(),
    }
}
