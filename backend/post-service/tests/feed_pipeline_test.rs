//! Feed reads over the in-process store
//!
//! Covers paging and totals, the engagement fields computed per viewer,
//! the public feed window and privacy filter, relation feeds (likes and
//! bookmarks), paged comments and trending tags.
mod common;

use chrono::{Duration, Utc};
use post_service::domain::Privacy;
use post_service::services::{CascadeScope, PageQuery, PublicFeedQuery};
use post_service::store::Collection;
use post_service::AppError;

use common::{act, comment, engage, photo, seed_posts, state, PostFixture};

#[tokio::test]
async fn pages_are_windowed_and_report_the_full_total() {
    let (store, state) = state(CascadeScope::Split);
    let ids = seed_posts(&store, "alice", 25).await;

    let first = state
        .feeds
        .user_feed("alice", "alice", &PageQuery::new(1, 10))
        .await
        .unwrap();
    assert_eq!(first.data.len(), 10);
    assert_eq!(first.total_data, 25);
    assert_eq!(first.page, 1);
    assert_eq!(first.limit, 10);
    assert!(first.data.iter().all(|row| row.total_data == 25));
    // newest first
    assert_eq!(first.data[0].post.id, ids[24].to_hex());
    assert_eq!(first.data[9].post.id, ids[15].to_hex());

    let last = state
        .feeds
        .user_feed("alice", "alice", &PageQuery::new(3, 10))
        .await
        .unwrap();
    assert_eq!(last.data.len(), 5);
    assert_eq!(last.total_data, 25);
    assert_eq!(last.data[4].post.id, ids[0].to_hex());
}

#[tokio::test]
async fn empty_feed_and_page_past_the_end_are_not_found() {
    let (store, state) = state(CascadeScope::Split);

    let empty = state
        .feeds
        .user_feed("alice", "alice", &PageQuery::default())
        .await;
    assert!(matches!(empty, Err(AppError::NotFound(_))));

    seed_posts(&store, "alice", 3).await;
    let past_end = state
        .feeds
        .user_feed("alice", "alice", &PageQuery::new(2, 10))
        .await;
    assert!(matches!(past_end, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn invalid_paging_is_a_validation_error() {
    let (_store, state) = state(CascadeScope::Split);

    for query in [PageQuery::new(0, 10), PageQuery::new(1, 0), PageQuery::new(1, 101)] {
        let result = state.feeds.user_feed("alice", "alice", &query).await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{:?}", query);
    }
}

#[tokio::test]
async fn engagement_counts_and_viewer_flags() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    engage(&store, post_id).await;
    // a like on another post must not leak into the counts
    let other = PostFixture::by("dave").aged(60).insert(&store).await;
    act(&store, Collection::Likes, other, "erin").await;

    let as_alice = state
        .feeds
        .user_feed("alice", "dave", &PageQuery::default())
        .await
        .unwrap();
    let row = &as_alice.data[0];
    assert_eq!(row.post.id, post_id.to_hex());
    assert_eq!(row.count_like, 2);
    assert_eq!(row.count_share, 1);
    assert_eq!(row.count_comment, 2);
    assert!(row.is_liked);
    assert!(!row.is_shared);

    let as_carol = state
        .feeds
        .user_feed("carol", "dave", &PageQuery::default())
        .await
        .unwrap();
    assert!(!as_carol.data[0].is_liked);
    assert!(as_carol.data[0].is_shared);
    assert_eq!(as_carol.data[1].count_like, 1);
    assert_eq!(as_carol.data[1].count_comment, 0);
}

#[tokio::test]
async fn replies_do_not_count_as_comments() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let comment_id = comment(&store, post_id, "bob", "first").await;

    for _ in 0..3 {
        state
            .comments
            .add_reply(
                comment_id,
                &common::caller("alice"),
                serde_json::from_value(serde_json::json!({ "text": "reply" })).unwrap(),
            )
            .await
            .unwrap();
    }

    let page = state
        .feeds
        .user_feed("dave", "dave", &PageQuery::default())
        .await
        .unwrap();
    assert_eq!(page.data[0].count_comment, 1);
}

#[tokio::test]
async fn media_feed_keeps_posts_with_media_only() {
    let (store, state) = state(CascadeScope::Split);
    let with_media = PostFixture::by("alice")
        .media(vec![photo("cat")])
        .insert(&store)
        .await;
    PostFixture::by("alice").aged(10).insert(&store).await;
    PostFixture::by("bob").media(vec![photo("dog")]).insert(&store).await;

    let page = state
        .feeds
        .media_feed("alice", "alice", &PageQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total_data, 1);
    assert_eq!(page.data[0].post.id, with_media.to_hex());
    assert_eq!(page.data[0].post.media[0].id, "cat");
}

#[tokio::test]
async fn public_feed_admits_recent_public_posts_only() {
    let (store, state) = state(CascadeScope::Split);
    let recent = PostFixture::by("alice").insert(&store).await;
    let yesterday = PostFixture::by("bob").aged(86_400).insert(&store).await;
    PostFixture::by("carol")
        .privacy(Privacy::Private)
        .insert(&store)
        .await;
    PostFixture::by("dave")
        .privacy(Privacy::FriendOnly)
        .insert(&store)
        .await;
    PostFixture::by("erin")
        .created_at(Utc::now() - Duration::days(30))
        .insert(&store)
        .await;

    let page = state
        .feeds
        .public_feed("alice", &PageQuery::default(), PublicFeedQuery::default())
        .await
        .unwrap();
    let ids: Vec<_> = page.data.iter().map(|row| row.post.id.clone()).collect();
    assert_eq!(ids, vec![recent.to_hex(), yesterday.to_hex()]);
    assert_eq!(page.total_data, 2);
}

#[tokio::test]
async fn public_feed_tags_and_authors_do_not_narrow() {
    let (store, state) = state(CascadeScope::Split);
    PostFixture::by("alice").tags(&["rust"]).insert(&store).await;
    PostFixture::by("bob").tags(&["go"]).aged(5).insert(&store).await;

    let narrowing = PublicFeedQuery {
        tags: vec!["rust".to_string()],
        user_ids: vec!["alice".to_string()],
    };
    let page = state
        .feeds
        .public_feed("carol", &PageQuery::default(), narrowing)
        .await
        .unwrap();
    assert_eq!(page.total_data, 2);
}

#[tokio::test]
async fn liked_feed_lists_liked_posts_with_live_counts() {
    let (store, state) = state(CascadeScope::Split);
    let older = PostFixture::by("dave").aged(100).insert(&store).await;
    let newer = PostFixture::by("dave").insert(&store).await;
    act(&store, Collection::Likes, older, "alice").await;
    act(&store, Collection::Likes, newer, "alice").await;
    act(&store, Collection::Likes, newer, "bob").await;

    let page = state
        .feeds
        .liked_feed("alice", "alice", &PageQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total_data, 2);
    // most recent like first
    assert_eq!(page.data[0].post.id, newer.to_hex());
    assert_eq!(page.data[0].count_like, 2);
    assert!(page.data.iter().all(|row| row.is_liked));

    let as_bob = state
        .feeds
        .liked_feed("bob", "alice", &PageQuery::default())
        .await
        .unwrap();
    assert!(as_bob.data[0].is_liked);
    assert!(!as_bob.data[1].is_liked);
}

#[tokio::test]
async fn bookmark_feed_is_oldest_first_and_skips_deleted_posts() {
    let (store, state) = state(CascadeScope::Split);
    let first = PostFixture::by("dave").insert(&store).await;
    let second = PostFixture::by("erin").aged(50).insert(&store).await;
    let gone = PostFixture::by("erin").aged(70).insert(&store).await;

    let alice = common::caller("alice");
    state.bookmarks.create(first, &alice).await.unwrap();
    state.bookmarks.create(second, &alice).await.unwrap();
    state.bookmarks.create(gone, &alice).await.unwrap();
    state.bookmarks.create(second, &common::caller("bob")).await.unwrap();

    post_service::repository::posts::delete_post(&store, gone, None)
        .await
        .unwrap();

    let page = state
        .feeds
        .bookmark_feed("alice", &PageQuery::default())
        .await
        .unwrap();
    let ids: Vec<_> = page.data.iter().map(|row| row.post.id.clone()).collect();
    assert_eq!(ids, vec![first.to_hex(), second.to_hex()]);
    // the dangling bookmark still counts towards the total
    assert_eq!(page.total_data, 3);
}

#[tokio::test]
async fn comments_page_newest_first_with_replies() {
    let (store, state) = state(CascadeScope::Split);
    let post_id = PostFixture::by("dave").insert(&store).await;
    let alice = common::caller("alice");
    let mut created = Vec::new();
    for text in ["one", "two", "three"] {
        let view = state
            .comments
            .create(
                post_id,
                &alice,
                serde_json::from_value(serde_json::json!({ "text": text })).unwrap(),
            )
            .await
            .unwrap();
        created.push(view.id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let comment_id = bson::oid::ObjectId::parse_str(&created[0]).unwrap();
    state
        .comments
        .add_reply(
            comment_id,
            &common::caller("bob"),
            serde_json::from_value(serde_json::json!({ "text": "hi" })).unwrap(),
        )
        .await
        .unwrap();

    let page = state
        .feeds
        .post_comments(post_id, &PageQuery::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total_data, 3);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].comment.text, "three");

    let rest = state
        .feeds
        .post_comments(post_id, &PageQuery::new(2, 2))
        .await
        .unwrap();
    assert_eq!(rest.data[0].comment.text, "one");
    assert_eq!(rest.data[0].comment.reply.len(), 1);
    assert_eq!(rest.data[0].comment.reply[0].user_id, "bob");
}

#[tokio::test]
async fn top_tags_rank_by_use_since_midnight() {
    let (store, state) = state(CascadeScope::Split);
    let a = PostFixture::by("alice").tags(&["rust", "mongo"]).insert(&store).await;
    let b = PostFixture::by("bob").tags(&["rust"]).insert(&store).await;
    PostFixture::by("carol")
        .tags(&["rust", "stale"])
        .created_at(Utc::now() - Duration::days(2))
        .insert(&store)
        .await;

    let tags = state.feeds.top_tags(&PageQuery::default()).await.unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].tag, "rust");
    assert_eq!(tags[0].count, 2);
    let mut posts = tags[0].posts.clone();
    posts.sort();
    let mut expected = vec![a.to_hex(), b.to_hex()];
    expected.sort();
    assert_eq!(posts, expected);
    assert_eq!(tags[1].tag, "mongo");
    assert_eq!(tags[1].count, 1);
}

#[tokio::test]
async fn top_tags_without_posts_today_is_not_found() {
    let (store, state) = state(CascadeScope::Split);
    PostFixture::by("alice")
        .created_at(Utc::now() - Duration::days(2))
        .insert(&store)
        .await;

    let result = state.feeds.top_tags(&PageQuery::default()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
