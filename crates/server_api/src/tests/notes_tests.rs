use super::*;
use shared::error::ErrorCode;

use crate::{
    forms::slug_from_title,
    support::{actor, context, note_fields, user_of},
};

const TITLE: &str = "Title";
const TEXT: &str = "Text";

fn form(title: &str, text: &str, slug: Option<&str>) -> NoteForm {
    NoteForm {
        title: title.to_string(),
        text: text.to_string(),
        slug: slug.map(str::to_string),
    }
}

async fn seeded_note(ctx: &ApiContext) -> (Actor, Actor, Note) {
    let author = actor(ctx, "author").await;
    let reader = actor(ctx, "reader").await;
    let note_id = ctx
        .storage
        .create_note(user_of(&author).id, &note_fields(TITLE, &slug_from_title(TITLE)))
        .await
        .expect("note");
    let note = ctx
        .storage
        .note(note_id)
        .await
        .expect("load")
        .expect("exists");
    (author, reader, note)
}

#[tokio::test]
async fn user_can_create_note() {
    let ctx = context().await;
    let (author, _, _) = seeded_note(&ctx).await;

    let outcome = add_note(&ctx, &author, &form("New title", TEXT, None))
        .await
        .expect("create");
    assert_eq!(outcome, Outcome::Redirect(notes_done_route().to_string()));
    assert_eq!(ctx.storage.count_notes().await.expect("count"), 2);

    let created = ctx
        .storage
        .note_by_slug("new-title")
        .await
        .expect("lookup")
        .expect("created");
    assert_eq!(created.title, "New title");
    assert_eq!(created.text, TEXT);
    assert_eq!(created.author, *user_of(&author));
}

#[tokio::test]
async fn anonymous_user_cannot_create_note() {
    let ctx = context().await;
    let err = add_note(&ctx, &Actor::Anonymous, &form("New title", TEXT, None))
        .await
        .expect_err("anonymous");
    assert_eq!(err.code, ErrorCode::Unauthenticated);
    assert_eq!(ctx.storage.count_notes().await.expect("count"), 0);
    assert_eq!(
        add_note_form(&Actor::Anonymous).expect_err("anonymous").code,
        ErrorCode::Unauthenticated
    );
}

#[tokio::test]
async fn non_unique_slug_is_rejected() {
    let ctx = context().await;
    let (author, reader, note) = seeded_note(&ctx).await;

    // Uniqueness is global: another user cannot reuse the slug either.
    for who in [&author, &reader] {
        let outcome = add_note(&ctx, who, &form(TITLE, TEXT, Some(note.slug.as_str())))
            .await
            .expect("rendered");
        let Outcome::Render(page) = outcome else {
            panic!("expected the form to be re-rendered");
        };
        let errors = page.form().expect("form").field_errors("slug");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(ctx.settings.slug_warning.as_str()));
    }
    assert_eq!(ctx.storage.count_notes().await.expect("count"), 1);
}

#[tokio::test]
async fn duplicate_titles_are_fine_with_distinct_slugs() {
    let ctx = context().await;
    let (author, _, _) = seeded_note(&ctx).await;

    let outcome = add_note(&ctx, &author, &form(TITLE, TEXT, Some("title-2")))
        .await
        .expect("create");
    assert!(matches!(outcome, Outcome::Redirect(_)));
}

#[tokio::test]
async fn slug_is_generated_if_not_provided() {
    let ctx = context().await;
    let author = actor(&ctx, "author").await;

    add_note(&ctx, &author, &form("Новая заметка", TEXT, None))
        .await
        .expect("create");
    let Page::NotesList { notes } = list_notes(&ctx, &author).await.expect("list") else {
        panic!("expected list page");
    };
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].slug, slug_from_title("Новая заметка"));
    assert!(!notes[0].slug.is_empty());
}

#[tokio::test]
async fn notes_list_is_sorted_and_scoped_to_owner() {
    let ctx = context().await;
    let user = actor(&ctx, "testuser").await;
    let other = actor(&ctx, "otheruser").await;
    for index in (0..10).rev() {
        let title = format!("Note {index}");
        ctx.storage
            .create_note(user_of(&user).id, &note_fields(&title, &slug_from_title(&title)))
            .await
            .expect("note");
    }
    ctx.storage
        .create_note(user_of(&other).id, &note_fields("Other user's note", "other-slug"))
        .await
        .expect("note");

    let Page::NotesList { notes } = list_notes(&ctx, &user).await.expect("list") else {
        panic!("expected list page");
    };
    assert_eq!(notes.len(), 10);
    let slugs: Vec<_> = notes.iter().map(|n| n.slug.clone()).collect();
    let mut sorted = slugs.clone();
    sorted.sort();
    assert_eq!(slugs, sorted);
    assert!(notes.iter().all(|n| n.author.id == user_of(&user).id));
}

#[tokio::test]
async fn author_can_delete_note() {
    let ctx = context().await;
    let (author, _, note) = seeded_note(&ctx).await;

    let outcome = delete_note(&ctx, &author, &note.slug).await.expect("delete");
    assert_eq!(outcome, Outcome::Redirect(notes_done_route().to_string()));
    assert_eq!(ctx.storage.count_notes().await.expect("count"), 0);
}

#[tokio::test]
async fn reader_cant_delete_note() {
    let ctx = context().await;
    let (_, reader, note) = seeded_note(&ctx).await;

    let err = delete_note(&ctx, &reader, &note.slug)
        .await
        .expect_err("not owner");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(ctx.storage.count_notes().await.expect("count"), 1);
}

#[tokio::test]
async fn author_can_edit_note() {
    let ctx = context().await;
    let (author, _, note) = seeded_note(&ctx).await;

    let outcome = edit_note(&ctx, &author, &note.slug, &form("New title", "New text", None))
        .await
        .expect("edit");
    assert_eq!(outcome, Outcome::Redirect(notes_done_route().to_string()));

    let edited = ctx
        .storage
        .note(note.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(edited.title, "New title");
    assert_eq!(edited.text, "New text");
    assert_eq!(edited.author.id, note.author.id);
}

#[tokio::test]
async fn editing_may_keep_the_same_slug() {
    let ctx = context().await;
    let (author, _, note) = seeded_note(&ctx).await;

    let same_slug = form(TITLE, "New text", Some(note.slug.as_str()));
    let outcome = edit_note(&ctx, &author, &note.slug, &same_slug)
        .await
        .expect("edit");
    assert!(matches!(outcome, Outcome::Redirect(_)));
}

fn slug_errors(outcome: Outcome) -> Vec<String> {
    let Outcome::Render(page) = outcome else {
        panic!("expected the form to be re-rendered");
    };
    page.form().expect("form").field_errors("slug").to_vec()
}

#[tokio::test]
async fn editing_onto_another_notes_slug_is_rejected() {
    let ctx = context().await;
    let (author, reader, note) = seeded_note(&ctx).await;
    ctx.storage
        .create_note(user_of(&reader).id, &note_fields("Other", "other"))
        .await
        .expect("reader note");

    let outcome = edit_note(&ctx, &author, &note.slug, &form(TITLE, "x", Some("other")))
        .await
        .expect("rendered");
    let errors = slug_errors(outcome);
    assert_eq!(errors, [format!("other{}", ctx.settings.slug_warning)]);

    let unchanged = ctx
        .storage
        .note(note.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(unchanged, note);
}

#[tokio::test]
async fn slug_claimed_after_validation_rerenders_new_note_form() {
    let ctx = context().await;
    let (_, reader, note) = seeded_note(&ctx).await;

    let submitted = form("Copy", TEXT, Some(note.slug.as_str()));
    let outcome = store_new_note(
        &ctx,
        user_of(&reader),
        &submitted,
        &note_fields("Copy", &note.slug),
    )
    .await
    .expect("rendered");
    let errors = slug_errors(outcome);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(ctx.settings.slug_warning.as_str()));
    assert_eq!(ctx.storage.count_notes().await.expect("count"), 1);
}

#[tokio::test]
async fn slug_claimed_after_validation_rerenders_edit_form() {
    let ctx = context().await;
    let (_, reader, note) = seeded_note(&ctx).await;
    ctx.storage
        .create_note(user_of(&reader).id, &note_fields("Other", "other"))
        .await
        .expect("reader note");

    let submitted = form(TITLE, TEXT, Some("other"));
    let outcome = store_note_edit(&ctx, note.clone(), &submitted, &note_fields(TITLE, "other"))
        .await
        .expect("rendered");
    let Outcome::Render(Page::NoteForm { note: shown, form }) = outcome else {
        panic!("expected the edit form");
    };
    assert_eq!(shown.as_ref(), Some(&note));
    assert_eq!(
        form.field_errors("slug"),
        [format!("other{}", ctx.settings.slug_warning)]
    );

    let unchanged = ctx
        .storage
        .note(note.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(unchanged.slug, note.slug);
}

#[tokio::test]
async fn reader_cant_edit_note() {
    let ctx = context().await;
    let (_, reader, note) = seeded_note(&ctx).await;

    let err = edit_note(&ctx, &reader, &note.slug, &form("New title", "New text", None))
        .await
        .expect_err("not owner");
    assert_eq!(err.code, ErrorCode::NotFound);

    let unchanged = ctx
        .storage
        .note(note.id)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(unchanged.title, TITLE);
    assert_eq!(unchanged.text, TEXT);
}

#[tokio::test]
async fn edit_form_is_prefilled_for_author() {
    let ctx = context().await;
    let (author, reader, note) = seeded_note(&ctx).await;

    let page = edit_note_form(&ctx, &author, &note.slug).await.expect("form");
    let form = page.form().expect("form");
    assert_eq!(form.data.get("title").map(String::as_str), Some(TITLE));
    assert_eq!(form.data.get("slug").map(String::as_str), Some(note.slug.as_str()));

    assert_eq!(
        edit_note_form(&ctx, &reader, &note.slug)
            .await
            .expect_err("reader")
            .code,
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn detail_and_delete_confirmation_are_owner_only() {
    let ctx = context().await;
    let (author, reader, note) = seeded_note(&ctx).await;

    assert!(note_detail(&ctx, &author, &note.slug).await.is_ok());
    assert!(delete_note_confirm(&ctx, &author, &note.slug).await.is_ok());
    assert_eq!(
        note_detail(&ctx, &reader, &note.slug)
            .await
            .expect_err("reader")
            .code,
        ErrorCode::NotFound
    );
    assert_eq!(
        note_detail(&ctx, &Actor::Anonymous, &note.slug)
            .await
            .expect_err("anonymous")
            .code,
        ErrorCode::Unauthenticated
    );
    assert_eq!(
        note_detail(&ctx, &author, "missing")
            .await
            .expect_err("missing")
            .code,
        ErrorCode::NotFound
    );
}

#[test]
fn done_page_needs_login() {
    assert!(notes_done(&Actor::Anonymous).is_err());
    assert_eq!(notes_home(), Page::NotesHome);
}
