//! Collection access functions
//!
//! Thin typed wrappers over [`EntityStore`]: documents go in as domain
//! structs and come back decoded. Feed reads take a pre-built pipeline.
pub mod actions;
pub mod comments;
pub mod posts;
pub mod preferences;

use bson::oid::ObjectId;

use crate::pipeline::{fields, Filter};
use crate::store::{Collection, EntityStore, StoreResult};

/// Remove every row of `collection` that references `post_id`.
pub async fn delete_by_post<S: EntityStore>(
    store: &S,
    collection: Collection,
    post_id: ObjectId,
    session: Option<&S::Session>,
) -> StoreResult<u64> {
    store
        .delete_many(collection, &Filter::eq(fields::POST_ID, post_id), session)
        .await
}
