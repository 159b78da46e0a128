//! Bookmarks, likes, shares, preferences and comment ownership rules
mod common;

use post_service::domain::{Caller, TagPreference};
use post_service::services::{CascadeScope, CommentRequest};
use post_service::store::memory::{Fault, Operation};
use post_service::store::Collection;
use post_service::AppError;

use common::{state, PostFixture};

fn text(value: &str) -> CommentRequest {
    serde_json::from_value(serde_json::json!({ "text": value })).unwrap()
}

#[tokio::test]
async fn duplicate_bookmark_is_a_conflict() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let alice = Caller::user("alice");

    let bookmark = state.bookmarks.create(post_id, &alice).await.unwrap();
    assert_eq!(bookmark.post_id, post_id.to_hex());
    assert_eq!(bookmark.user_id, "alice");

    let again = state.bookmarks.create(post_id, &alice).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(store.count(Collection::Bookmarks).await, 1);

    // another user may bookmark the same post
    state
        .bookmarks
        .create(post_id, &Caller::user("bob"))
        .await
        .unwrap();
    assert_eq!(store.count(Collection::Bookmarks).await, 2);
}

#[tokio::test]
async fn bookmarking_a_missing_post_is_not_found() {
    let (store, state) = state(CascadeScope::Split);

    let result = state
        .bookmarks
        .create(bson::oid::ObjectId::new(), &Caller::user("alice"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(store.count(Collection::Bookmarks).await, 0);
}

#[tokio::test]
async fn only_the_owner_removes_a_bookmark() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let bookmark = state
        .bookmarks
        .create(post_id, &Caller::user("alice"))
        .await
        .unwrap();
    let bookmark_id = bson::oid::ObjectId::parse_str(&bookmark.id).unwrap();

    let result = state.bookmarks.delete(bookmark_id, &Caller::user("bob")).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(store.count(Collection::Bookmarks).await, 1);

    state
        .bookmarks
        .delete(bookmark_id, &Caller::user("alice"))
        .await
        .unwrap();
    assert_eq!(store.count(Collection::Bookmarks).await, 0);

    let gone = state.bookmarks.delete(bookmark_id, &Caller::user("alice")).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn likes_and_shares_are_once_per_user() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let alice = Caller::user("alice");

    state.engagement.like(post_id, &alice).await.unwrap();
    assert!(matches!(
        state.engagement.like(post_id, &alice).await,
        Err(AppError::Conflict(_))
    ));
    state.engagement.share(post_id, &alice).await.unwrap();
    assert!(matches!(
        state.engagement.share(post_id, &alice).await,
        Err(AppError::Conflict(_))
    ));

    state.engagement.unlike(post_id, &alice).await.unwrap();
    assert_eq!(store.count(Collection::Likes).await, 0);
    assert!(matches!(
        state.engagement.unlike(post_id, &alice).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn comments_respect_allow_comment() {
    let (store, state) = state(CascadeScope::Split);
    let closed = PostFixture::by("dave").closed_to_comments().insert(&store).await;

    let result = state
        .comments
        .create(closed, &Caller::user("alice"), text("hi"))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let blank = state
        .comments
        .create(closed, &Caller::user("alice"), text("   "))
        .await;
    assert!(matches!(blank, Err(AppError::Validation(_))));
    assert_eq!(store.count(Collection::Comments).await, 0);
}

#[tokio::test]
async fn reply_removal_by_reply_author_or_comment_author() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let comment = state
        .comments
        .create(post_id, &Caller::user("alice"), text("question"))
        .await
        .unwrap();
    let comment_id = bson::oid::ObjectId::parse_str(&comment.id).unwrap();

    let first = state
        .comments
        .add_reply(comment_id, &Caller::user("bob"), text("answer"))
        .await
        .unwrap();
    let second = state
        .comments
        .add_reply(comment_id, &Caller::user("bob"), text("follow up"))
        .await
        .unwrap();
    let first_id = bson::oid::ObjectId::parse_str(&first.id).unwrap();
    let second_id = bson::oid::ObjectId::parse_str(&second.id).unwrap();

    let stranger = state
        .comments
        .delete_reply(comment_id, first_id, &Caller::user("carol"))
        .await;
    assert!(matches!(stranger, Err(AppError::Forbidden(_))));

    state
        .comments
        .delete_reply(comment_id, first_id, &Caller::user("bob"))
        .await
        .unwrap();
    state
        .comments
        .delete_reply(comment_id, second_id, &Caller::user("alice"))
        .await
        .unwrap();

    let stored = post_service::repository::comments::find_comment(&store, comment_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.reply.is_empty());

    let missing = state
        .comments
        .delete_reply(comment_id, first_id, &Caller::user("bob"))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn comment_delete_requires_author_or_admin() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let comment = state
        .comments
        .create(post_id, &Caller::user("alice"), text("mine"))
        .await
        .unwrap();
    let comment_id = bson::oid::ObjectId::parse_str(&comment.id).unwrap();

    let result = state.comments.delete(comment_id, &Caller::user("dave")).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    state
        .comments
        .delete(comment_id, &Caller::admin("root"))
        .await
        .unwrap();
    assert_eq!(store.count(Collection::Comments).await, 0);
}

fn weight(tag: &str, count: i64) -> TagPreference {
    TagPreference {
        tag: tag.to_string(),
        count,
    }
}

#[tokio::test]
async fn likes_fold_post_tags_into_preferences() {
    let (store, state) = state(CascadeScope::Split);
    let first = PostFixture::by("dave").tags(&["rust", "async"]).insert(&store).await;
    let second = PostFixture::by("erin").tags(&["async", "db"]).insert(&store).await;
    let alice = Caller::user("alice");

    assert!(matches!(
        state.preferences.get("alice").await,
        Err(AppError::NotFound(_))
    ));

    state.engagement.like(first, &alice).await.unwrap();
    let after_first = state.preferences.get("alice").await.unwrap();
    assert_eq!(after_first.tags, vec![weight("rust", 1), weight("async", 1)]);

    state.engagement.like(second, &alice).await.unwrap();
    let after_second = state.preferences.get("alice").await.unwrap();
    assert_eq!(
        after_second.tags,
        vec![weight("rust", 1), weight("async", 2), weight("db", 1)]
    );
    assert_eq!(store.count(Collection::Preferences).await, 1);

    // shares do not count towards preferences
    let third = PostFixture::by("dave").tags(&["web"]).insert(&store).await;
    state.engagement.share(third, &alice).await.unwrap();
    assert_eq!(state.preferences.get("alice").await.unwrap().tags.len(), 3);
}

#[tokio::test]
async fn like_without_tags_creates_empty_preferences() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").tags(&[]).insert(&store).await;

    state.engagement.like(post_id, &Caller::user("bob")).await.unwrap();

    let preferences = state.preferences.get("bob").await.unwrap();
    assert!(preferences.tags.is_empty());
}

#[tokio::test]
async fn preference_failure_does_not_undo_the_like() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").tags(&["rust"]).insert(&store).await;
    let alice = Caller::user("alice");
    store.fail_on(Fault::On(Collection::Preferences, Operation::SetFields));

    let like = state.engagement.like(post_id, &alice).await.unwrap();
    assert_eq!(like.user_id, "alice");
    assert_eq!(store.count(Collection::Likes).await, 1);

    let preferences = state.preferences.get("alice").await.unwrap();
    assert!(preferences.tags.is_empty());
}
