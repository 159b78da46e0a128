use std::sync::Arc;

use bson::oid::ObjectId;
use tracing::info;

use crate::domain::{ActionView, Bookmark, Caller};
use crate::error::{AppError, Result};
use crate::repository::{actions, posts};
use crate::store::{Collection, EntityStore};

pub struct BookmarkService<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> BookmarkService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Bookmark a post. The post must exist and may be bookmarked once per user.
    ///
    /// The duplicate check reads before it inserts, so two concurrent requests
    /// from one user can both pass it.
    pub async fn create(&self, post_id: ObjectId, caller: &Caller) -> Result<ActionView> {
        let store = self.store.as_ref();
        if posts::find_post(store, post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("post {} not found", post_id)));
        }
        if actions::find_action(store, Collection::Bookmarks, post_id, &caller.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!("post {} is already bookmarked", post_id)));
        }

        let mut bookmark = Bookmark::new(post_id, caller.user_id.clone());
        bookmark.id = Some(actions::insert_action(store, Collection::Bookmarks, &bookmark).await?);
        info!(post_id = %post_id, user_id = %caller.user_id, "Bookmark created");
        Ok(ActionView::from(bookmark))
    }

    /// Remove a bookmark owned by the caller.
    pub async fn delete(&self, bookmark_id: ObjectId, caller: &Caller) -> Result<()> {
        let store = self.store.as_ref();
        let bookmark = actions::find_action_by_id(store, Collection::Bookmarks, bookmark_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("bookmark {} not found", bookmark_id)))?;
        if !caller.can_modify(&bookmark.user_id) {
            return Err(AppError::Forbidden("bookmark belongs to another user".to_string()));
        }

        actions::delete_action_by_id(store, Collection::Bookmarks, bookmark_id).await?;
        info!(bookmark_id = %bookmark_id, user_id = %caller.user_id, "Bookmark deleted");
        Ok(())
    }
}
