use std::sync::Arc;

use tracing::debug;

use crate::domain::{PreferenceView, TagPreference, UserPreference};
use crate::error::{AppError, Result};
use crate::repository::preferences;
use crate::store::EntityStore;

/// Per-user tag weights learned from the posts a user likes.
pub struct PreferenceService<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> PreferenceService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> Result<PreferenceView> {
        preferences::find_by_user(self.store.as_ref(), user_id)
            .await?
            .map(PreferenceView::from)
            .ok_or_else(|| AppError::NotFound(format!("no preferences for user {}", user_id)))
    }

    /// Fold `tags` into the user's preferences, creating the document on first use.
    ///
    /// Read-modify-write: two concurrent calls for the same user can lose one
    /// increment.
    pub async fn record_tags(&self, user_id: &str, tags: &[String]) -> Result<UserPreference> {
        let store = self.store.as_ref();
        let mut preference = match preferences::find_by_user(store, user_id).await? {
            Some(existing) => existing,
            None => preferences::create(store, user_id).await?,
        };
        if tags.is_empty() {
            return Ok(preference);
        }

        let id = preference
            .id
            .ok_or_else(|| AppError::Internal("preference document without _id".to_string()))?;
        preference.tags = merge_tags(&preference.tags, tags);
        if !preferences::update_tags(store, id, &preference.tags).await? {
            return Err(AppError::NotFound(format!("preferences for user {} vanished", user_id)));
        }
        debug!(user_id = %user_id, tags = preference.tags.len(), "Preferences updated");
        Ok(preference)
    }
}

/// Increment the weight of every known tag and append unseen tags with weight 1.
pub fn merge_tags(current: &[TagPreference], incoming: &[String]) -> Vec<TagPreference> {
    let mut merged = current.to_vec();
    for tag in incoming {
        match merged.iter_mut().find(|preference| &preference.tag == tag) {
            Some(preference) => preference.count += 1,
            None => merged.push(TagPreference {
                tag: tag.clone(),
                count: 1,
            }),
        }
    }
    merged
}
