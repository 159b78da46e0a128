use std::sync::Arc;

use bson::oid::ObjectId;
use tracing::{info, warn};

use crate::domain::{ActionView, Caller, Post, PostAction};
use crate::error::{AppError, Result};
use crate::repository::{actions, posts};
use crate::services::PreferenceService;
use crate::store::{Collection, EntityStore};

/// Likes and shares. A user can like or share a post at most once.
pub struct EngagementService<S: EntityStore> {
    store: Arc<S>,
    preferences: PreferenceService<S>,
}

impl<S: EntityStore> EngagementService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            preferences: PreferenceService::new(Arc::clone(&store)),
            store,
        }
    }

    /// Like a post and fold its tags into the caller's preferences.
    /// A failed preference update is logged and does not undo the like.
    pub async fn like(&self, post_id: ObjectId, caller: &Caller) -> Result<ActionView> {
        let (post, like) = self.record(Collection::Likes, post_id, caller).await?;
        if let Err(err) = self.preferences.record_tags(&caller.user_id, &post.tags).await {
            warn!(post_id = %post_id, user_id = %caller.user_id, error = %err, "Failed to update preferences");
        }
        Ok(like)
    }

    pub async fn unlike(&self, post_id: ObjectId, caller: &Caller) -> Result<()> {
        let removed =
            actions::delete_action(self.store.as_ref(), Collection::Likes, post_id, &caller.user_id)
                .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "post {} is not liked by this user",
                post_id
            )));
        }
        info!(post_id = %post_id, user_id = %caller.user_id, "Post unliked");
        Ok(())
    }

    pub async fn share(&self, post_id: ObjectId, caller: &Caller) -> Result<ActionView> {
        let (_, share) = self.record(Collection::Shares, post_id, caller).await?;
        Ok(share)
    }

    /// Same read-then-insert duplicate check as bookmarks; not atomic across
    /// concurrent requests.
    async fn record(
        &self,
        collection: Collection,
        post_id: ObjectId,
        caller: &Caller,
    ) -> Result<(Post, ActionView)> {
        let store = self.store.as_ref();
        let post = posts::find_post(store, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
        if actions::find_action(store, collection, post_id, &caller.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "post {} already in {} for this user",
                post_id, collection
            )));
        }

        let mut action = PostAction::new(post_id, caller.user_id.clone());
        action.id = Some(actions::insert_action(store, collection, &action).await?);
        info!(post_id = %post_id, user_id = %caller.user_id, collection = %collection, "Engagement recorded");
        Ok((post, ActionView::from(action)))
    }
}
