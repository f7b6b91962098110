use chrono::{Duration, Utc};
use shared::error::DuplicateSlug;
use storage::{NoteFields, Storage};

fn fields(title: &str, slug: &str) -> NoteFields {
    NoteFields {
        title: title.to_string(),
        text: "Text".to_string(),
        slug: slug.to_string(),
    }
}

#[tokio::test]
async fn note_lifecycle_across_two_authors_acceptance() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = storage.create_user("alice").await.expect("alice");
    let bob = storage.create_user("bob").await.expect("bob");

    let first = storage
        .create_note(alice, &fields("Groceries", "groceries"))
        .await
        .expect("first note");
    storage
        .create_note(alice, &fields("Books", "books"))
        .await
        .expect("second note");

    let err = storage
        .create_note(bob, &fields("Groceries", "groceries"))
        .await
        .expect_err("slug is global");
    assert_eq!(
        err.downcast_ref::<DuplicateSlug>().map(|d| d.slug.as_str()),
        Some("groceries")
    );
    storage
        .create_note(bob, &fields("Groceries", "bobs-groceries"))
        .await
        .expect("same title, other slug");

    let alice_slugs: Vec<_> = storage
        .list_notes_for_author(alice)
        .await
        .expect("alice notes")
        .into_iter()
        .map(|n| n.slug)
        .collect();
    assert_eq!(alice_slugs, ["books", "groceries"]);

    assert!(storage
        .update_note(first, &fields("Weekly groceries", "weekly"))
        .await
        .expect("rename"));
    assert!(storage.note_by_slug("groceries").await.expect("old").is_none());
    let renamed = storage
        .note_by_slug("weekly")
        .await
        .expect("new")
        .expect("exists");
    assert_eq!(renamed.author.id, alice);
    assert!(!storage.slug_taken("weekly", Some(first)).await.expect("own slug"));
    assert!(storage.slug_taken("weekly", None).await.expect("taken"));

    assert!(storage.delete_note(first).await.expect("delete"));
    assert!(!storage.delete_note(first).await.expect("second delete"));
    assert_eq!(storage.count_notes().await.expect("count"), 2);
}

#[tokio::test]
async fn news_feed_and_comment_thread_acceptance() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let author = storage.create_user("author").await.expect("author");
    let today = Utc::now().date_naive();

    let mut ids = Vec::new();
    for index in 0..12 {
        ids.push(
            storage
                .create_news(&format!("News {index}"), "Just text.", today - Duration::days(index))
                .await
                .expect("news"),
        );
    }
    let feed = storage.list_latest_news(10).await.expect("feed");
    assert_eq!(feed.len(), 10);
    assert_eq!(feed[0].id, ids[0]);
    assert_eq!(feed[9].id, ids[9]);

    let now = Utc::now();
    let later = storage
        .insert_comment(ids[0], author, "second", now + Duration::hours(1))
        .await
        .expect("later");
    let earlier = storage
        .insert_comment(ids[0], author, "first", now)
        .await
        .expect("earlier");
    let thread: Vec<_> = storage
        .list_comments_for_news(ids[0])
        .await
        .expect("thread")
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(thread, [earlier, later]);
    assert!(storage
        .list_comments_for_news(ids[1])
        .await
        .expect("other thread")
        .is_empty());
}
