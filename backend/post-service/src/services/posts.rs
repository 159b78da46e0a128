use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::domain::{Caller, Media, Post, PostView, Privacy};
use crate::error::{AppError, Result};
use crate::repository::posts;
use crate::services::cascade::{CascadeDelete, DeleteReport};
use crate::store::EntityStore;

/// Characters treated as word separators when deriving tags.
const TAG_SEPARATORS: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', ')', '(', '_', '=', '+', '?', '.', ',', ';', ':', '\'',
];

/// Split post text into tags: separators become whitespace, words are kept
/// in first-seen order without duplicates.
pub fn derive_tags(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if TAG_SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    let mut tags: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace() {
        if !tags.iter().any(|t| t == word) {
            tags.push(word.to_string());
        }
    }
    tags
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub text: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub media: Vec<Media>,
    #[serde(default)]
    pub privacy: Option<String>,
    #[serde(default)]
    pub allow_comment: Option<bool>,
}

pub struct PostService<S: EntityStore> {
    store: Arc<S>,
    cascade: CascadeDelete<S>,
}

impl<S: EntityStore> PostService<S> {
    pub fn new(store: Arc<S>, cascade: CascadeDelete<S>) -> Self {
        Self { store, cascade }
    }

    pub async fn create_post(&self, caller: &Caller, req: CreatePostRequest) -> Result<PostView> {
        req.validate()?;
        if req.text.trim().is_empty() && req.media.is_empty() {
            return Err(AppError::Validation(
                "a post needs text or at least one media item".to_string(),
            ));
        }

        let privacy = match req.privacy.as_deref() {
            None => Privacy::default(),
            Some(raw) => Privacy::parse(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "privacy must be one of Public, Private, Friend Only; got '{}'",
                    raw
                ))
            })?,
        };

        let now = Utc::now();
        let mut post = Post {
            id: None,
            user_id: caller.user_id.clone(),
            tags: derive_tags(&req.text),
            text: req.text,
            media: req.media,
            privacy,
            allow_comment: req.allow_comment.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let id = posts::insert_post(self.store.as_ref(), &post).await?;
        post.id = Some(id);
        info!(post_id = %id, user_id = %caller.user_id, "Post created");

        Ok(PostView::from(post))
    }

    pub async fn get_post(&self, post_id: ObjectId) -> Result<PostView> {
        posts::find_post(self.store.as_ref(), post_id)
            .await?
            .map(PostView::from)
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))
    }

    pub async fn delete_post(&self, post_id: ObjectId, caller: &Caller) -> Result<DeleteReport> {
        self.cascade.delete_post(post_id, caller).await
    }
}
