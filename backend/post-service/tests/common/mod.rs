//! Shared fixtures for the integration suites: an in-process store wired
//! into the same services the HTTP layer uses.
#![allow(dead_code)]

use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use post_service::config::FeedConfig;
use post_service::domain::{Caller, Comment, Media, Post, PostAction, Privacy};
use post_service::repository::{actions, comments, posts};
use post_service::services::CascadeScope;
use post_service::store::{Collection, MemoryStore};
use post_service::AppState;

pub fn feed_config() -> FeedConfig {
    FeedConfig {
        public_window_days: 3,
        max_limit: 100,
    }
}

pub fn state(scope: CascadeScope) -> (MemoryStore, AppState<MemoryStore>) {
    let store = MemoryStore::new();
    let state = AppState::new(Arc::new(store.clone()), feed_config(), scope);
    (store, state)
}

pub fn caller(user_id: &str) -> Caller {
    Caller::user(user_id)
}

pub fn photo(name: &str) -> Media {
    Media {
        url: format!("https://cdn.example.com/{}.jpg", name),
        kind: "image".to_string(),
        id: name.to_string(),
    }
}

/// Builder for posts inserted straight into the store.
pub struct PostFixture {
    post: Post,
}

impl PostFixture {
    pub fn by(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            post: Post {
                id: None,
                user_id: user_id.to_string(),
                text: "hello".to_string(),
                media: Vec::new(),
                privacy: Privacy::Public,
                allow_comment: true,
                tags: vec!["hello".to_string()],
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.post.text = text.to_string();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.post.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn media(mut self, media: Vec<Media>) -> Self {
        self.post.media = media;
        self
    }

    pub fn privacy(mut self, privacy: Privacy) -> Self {
        self.post.privacy = privacy;
        self
    }

    pub fn closed_to_comments(mut self) -> Self {
        self.post.allow_comment = false;
        self
    }

    /// Shift creation time back by `seconds`.
    pub fn aged(mut self, seconds: i64) -> Self {
        self.post.created_at = Utc::now() - Duration::seconds(seconds);
        self.post.updated_at = self.post.created_at;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.post.created_at = at;
        self.post.updated_at = at;
        self
    }

    pub async fn insert(self, store: &MemoryStore) -> ObjectId {
        posts::insert_post(store, &self.post).await.unwrap()
    }
}

/// Insert `count` public posts by `user_id`, the first one oldest.
pub async fn seed_posts(store: &MemoryStore, user_id: &str, count: usize) -> Vec<ObjectId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let id = PostFixture::by(user_id)
            .text(&format!("post {}", i))
            .aged((count - i) as i64)
            .insert(store)
            .await;
        ids.push(id);
    }
    ids
}

pub async fn act(store: &MemoryStore, collection: Collection, post_id: ObjectId, user_id: &str) -> ObjectId {
    actions::insert_action(store, collection, &PostAction::new(post_id, user_id))
        .await
        .unwrap()
}

pub async fn comment(store: &MemoryStore, post_id: ObjectId, user_id: &str, text: &str) -> ObjectId {
    let now = Utc::now();
    let comment = Comment {
        id: None,
        post_id,
        user_id: user_id.to_string(),
        text: text.to_string(),
        reply: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    comments::insert_comment(store, &comment).await.unwrap()
}

/// Attach likes, shares and comments to a post.
pub async fn engage(store: &MemoryStore, post_id: ObjectId) {
    act(store, Collection::Likes, post_id, "alice").await;
    act(store, Collection::Likes, post_id, "bob").await;
    act(store, Collection::Shares, post_id, "carol").await;
    comment(store, post_id, "bob", "nice").await;
    comment(store, post_id, "carol", "agreed").await;
}
