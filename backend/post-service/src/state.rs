use std::sync::Arc;

use crate::config::FeedConfig;
use crate::services::{
    BookmarkService, CascadeDelete, CascadeScope, CommentService, EngagementService, FeedService,
    PostService, PreferenceService,
};
use crate::store::EntityStore;

/// Shared application state handed to every handler.
pub struct AppState<S: EntityStore> {
    pub store: Arc<S>,
    pub feeds: FeedService<S>,
    pub posts: PostService<S>,
    pub engagement: EngagementService<S>,
    pub bookmarks: BookmarkService<S>,
    pub comments: CommentService<S>,
    pub preferences: PreferenceService<S>,
}

impl<S: EntityStore> AppState<S> {
    pub fn new(store: Arc<S>, feed: FeedConfig, scope: CascadeScope) -> Self {
        Self {
            feeds: FeedService::new(Arc::clone(&store), feed),
            posts: PostService::new(
                Arc::clone(&store),
                CascadeDelete::new(Arc::clone(&store), scope),
            ),
            engagement: EngagementService::new(Arc::clone(&store)),
            bookmarks: BookmarkService::new(Arc::clone(&store)),
            comments: CommentService::new(Arc::clone(&store)),
            preferences: PreferenceService::new(Arc::clone(&store)),
            store,
        }
    }
}
