/// Business logic layer
///
/// Services own an `Arc` of the entity store and are generic over its
/// implementation, so the same code runs on MongoDB and on the in-process
/// store used by tests.
pub mod bookmarks;
pub mod cascade;
pub mod comments;
pub mod engagement;
pub mod feed;
pub mod posts;
pub mod preferences;

pub use bookmarks::BookmarkService;
pub use cascade::{CascadeDelete, CascadeScope, DeleteReport};
pub use comments::{CommentRequest, CommentService};
pub use engagement::EngagementService;
pub use feed::{FeedService, PageQuery, PublicFeedQuery};
pub use posts::{CreatePostRequest, PostService};
pub use preferences::PreferenceService;
