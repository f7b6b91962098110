use chrono::Utc;
use shared::{
    domain::{Actor, Comment, CommentId, NewsId},
    error::ApiError,
    protocol::{FormState, Page},
};
use tracing::info;

use crate::{
    forms::CommentForm,
    internal, news_comments_anchor,
    policy::{authorize, require_user, OwnerOnly},
    ApiContext, Outcome,
};

pub async fn news_home(ctx: &ApiContext) -> Result<Page, ApiError> {
    let news = ctx
        .storage
        .list_latest_news(ctx.settings.news_count_on_home_page)
        .await
        .map_err(internal)?;
    Ok(Page::NewsHome { news })
}

/// Anyone may read a news item; only logged-in actors get a comment form.
pub async fn news_detail(
    ctx: &ApiContext,
    actor: &Actor,
    news_id: NewsId,
) -> Result<Page, ApiError> {
    let form = actor.is_authenticated().then(FormState::empty);
    detail_page(ctx, news_id, form).await
}

pub async fn post_comment(
    ctx: &ApiContext,
    actor: &Actor,
    news_id: NewsId,
    form: &CommentForm,
) -> Result<Outcome, ApiError> {
    let user = require_user(actor)?;
    let news = ctx
        .storage
        .news(news_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("news"))?;

    let text = match form.validate(&ctx.settings) {
        Ok(text) => text,
        Err(state) => {
            info!(user_id = user.id.0, news_id = news.id.0, "comment rejected");
            return detail_page(ctx, news.id, Some(state)).await.map(Outcome::Render);
        }
    };

    let comment_id = ctx
        .storage
        .insert_comment(news.id, user.id, &text, Utc::now())
        .await
        .map_err(internal)?;
    info!(
        user_id = user.id.0,
        news_id = news.id.0,
        comment_id = comment_id.0,
        "comment created"
    );
    Ok(Outcome::Redirect(news_comments_anchor(news.id)))
}

pub async fn edit_comment_form(
    ctx: &ApiContext,
    actor: &Actor,
    comment_id: CommentId,
) -> Result<Page, ApiError> {
    let comment = owned_comment(ctx, actor, comment_id).await?;
    let form = CommentForm {
        text: comment.text.clone(),
    }
    .state();
    Ok(Page::CommentEdit { comment, form })
}

pub async fn edit_comment(
    ctx: &ApiContext,
    actor: &Actor,
    comment_id: CommentId,
    form: &CommentForm,
) -> Result<Outcome, ApiError> {
    let comment = owned_comment(ctx, actor, comment_id).await?;
    let text = match form.validate(&ctx.settings) {
        Ok(text) => text,
        Err(state) => return Ok(Outcome::Render(Page::CommentEdit { comment, form: state })),
    };

    ctx.storage
        .update_comment_text(comment.id, &text)
        .await
        .map_err(internal)?;
    info!(comment_id = comment.id.0, "comment edited");
    Ok(Outcome::Redirect(news_comments_anchor(comment.news_id)))
}

pub async fn delete_comment_confirm(
    ctx: &ApiContext,
    actor: &Actor,
    comment_id: CommentId,
) -> Result<Page, ApiError> {
    let comment = owned_comment(ctx, actor, comment_id).await?;
    Ok(Page::CommentDelete { comment })
}

pub async fn delete_comment(
    ctx: &ApiContext,
    actor: &Actor,
    comment_id: CommentId,
) -> Result<Outcome, ApiError> {
    let comment = owned_comment(ctx, actor, comment_id).await?;
    ctx.storage
        .delete_comment(comment.id)
        .await
        .map_err(internal)?;
    info!(comment_id = comment.id.0, "comment deleted");
    Ok(Outcome::Redirect(news_comments_anchor(comment.news_id)))
}

async fn owned_comment(
    ctx: &ApiContext,
    actor: &Actor,
    comment_id: CommentId,
) -> Result<Comment, ApiError> {
    let user = require_user(actor)?;
    let comment = ctx.storage.comment(comment_id).await.map_err(internal)?;
    authorize(&OwnerOnly, user, comment, "comment")
}

async fn detail_page(
    ctx: &ApiContext,
    news_id: NewsId,
    form: Option<FormState>,
) -> Result<Page, ApiError> {
    let news = ctx
        .storage
        .news(news_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("news"))?;
    let comments = ctx
        .storage
        .list_comments_for_news(news.id)
        .await
        .map_err(internal)?;
    Ok(Page::NewsDetail {
        news,
        comments,
        form,
    })
}

#[cfg(test)]
#[path = "tests/news_tests.rs"]
mod tests;
