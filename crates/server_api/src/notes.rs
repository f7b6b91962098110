use shared::{
    domain::{Actor, Note, User},
    error::ApiError,
    protocol::{FormState, Page},
};
use tracing::info;

use storage::NoteFields;

use crate::{
    forms::NoteForm,
    internal, notes_done_route,
    policy::{authorize, require_user, OwnerOnly},
    ApiContext, Outcome,
};

/// Public landing page.
pub fn notes_home() -> Page {
    Page::NotesHome
}

pub fn notes_done(actor: &Actor) -> Result<Page, ApiError> {
    require_user(actor)?;
    Ok(Page::NotesDone)
}

/// The actor's own notes, sorted by slug.
pub async fn list_notes(ctx: &ApiContext, actor: &Actor) -> Result<Page, ApiError> {
    let user = require_user(actor)?;
    let notes = ctx
        .storage
        .list_notes_for_author(user.id)
        .await
        .map_err(internal)?;
    Ok(Page::NotesList { notes })
}

pub fn add_note_form(actor: &Actor) -> Result<Page, ApiError> {
    require_user(actor)?;
    Ok(Page::NoteForm {
        note: None,
        form: FormState::empty(),
    })
}

pub async fn add_note(
    ctx: &ApiContext,
    actor: &Actor,
    form: &NoteForm,
) -> Result<Outcome, ApiError> {
    let user = require_user(actor)?;
    let fields = match form
        .validate(&ctx.storage, None, &ctx.settings)
        .await
        .map_err(internal)?
    {
        Ok(fields) => fields,
        Err(state) => return Ok(rejected(None, state)),
    };
    store_new_note(ctx, user, form, &fields).await
}

/// Inserts validated fields. A slug claimed since validation re-renders the
/// form with the usual duplicate-slug error.
async fn store_new_note(
    ctx: &ApiContext,
    user: &User,
    form: &NoteForm,
    fields: &NoteFields,
) -> Result<Outcome, ApiError> {
    match ctx.storage.create_note(user.id, fields).await {
        Ok(note_id) => {
            info!(user_id = user.id.0, note_id = note_id.0, slug = %fields.slug, "note created");
            Ok(Outcome::Redirect(notes_done_route().to_string()))
        }
        Err(err) => match form.store_conflict(&err, &ctx.settings) {
            Some(state) => Ok(rejected(None, state)),
            None => Err(internal(err)),
        },
    }
}

pub async fn note_detail(ctx: &ApiContext, actor: &Actor, slug: &str) -> Result<Page, ApiError> {
    let note = owned_note(ctx, actor, slug).await?;
    Ok(Page::NoteDetail { note })
}

pub async fn edit_note_form(
    ctx: &ApiContext,
    actor: &Actor,
    slug: &str,
) -> Result<Page, ApiError> {
    let note = owned_note(ctx, actor, slug).await?;
    let form = NoteForm {
        title: note.title.clone(),
        text: note.text.clone(),
        slug: Some(note.slug.clone()),
    }
    .state();
    Ok(Page::NoteForm {
        note: Some(note),
        form,
    })
}

pub async fn edit_note(
    ctx: &ApiContext,
    actor: &Actor,
    slug: &str,
    form: &NoteForm,
) -> Result<Outcome, ApiError> {
    let note = owned_note(ctx, actor, slug).await?;
    let fields = match form
        .validate(&ctx.storage, Some(note.id), &ctx.settings)
        .await
        .map_err(internal)?
    {
        Ok(fields) => fields,
        Err(state) => return Ok(rejected(Some(note), state)),
    };
    store_note_edit(ctx, note, form, &fields).await
}

async fn store_note_edit(
    ctx: &ApiContext,
    note: Note,
    form: &NoteForm,
    fields: &NoteFields,
) -> Result<Outcome, ApiError> {
    match ctx.storage.update_note(note.id, fields).await {
        Ok(_) => {
            info!(note_id = note.id.0, slug = %fields.slug, "note edited");
            Ok(Outcome::Redirect(notes_done_route().to_string()))
        }
        Err(err) => match form.store_conflict(&err, &ctx.settings) {
            Some(state) => Ok(rejected(Some(note), state)),
            None => Err(internal(err)),
        },
    }
}

pub async fn delete_note_confirm(
    ctx: &ApiContext,
    actor: &Actor,
    slug: &str,
) -> Result<Page, ApiError> {
    let note = owned_note(ctx, actor, slug).await?;
    Ok(Page::NoteDelete { note })
}

pub async fn delete_note(ctx: &ApiContext, actor: &Actor, slug: &str) -> Result<Outcome, ApiError> {
    let note = owned_note(ctx, actor, slug).await?;
    ctx.storage.delete_note(note.id).await.map_err(internal)?;
    info!(note_id = note.id.0, slug = %note.slug, "note deleted");
    Ok(Outcome::Redirect(notes_done_route().to_string()))
}

async fn owned_note(ctx: &ApiContext, actor: &Actor, slug: &str) -> Result<Note, ApiError> {
    let user = require_user(actor)?;
    let note = ctx.storage.note_by_slug(slug).await.map_err(internal)?;
    authorize(&OwnerOnly, user, note, "note")
}

fn rejected(note: Option<Note>, form: FormState) -> Outcome {
    Outcome::Render(Page::NoteForm { note, form })
}

#[cfg(test)]
#[path = "tests/notes_tests.rs"]
mod tests;
