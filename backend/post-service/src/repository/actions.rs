//! Likes, shares and bookmarks share one document shape and are stored in
//! their own collections; every function takes the target collection.
use bson::oid::ObjectId;

use crate::domain::PostAction;
use crate::pipeline::{fields, Filter};
use crate::store::{Collection, EntityStore, StoreResult};

fn pair(post_id: ObjectId, user_id: &str) -> Filter {
    Filter::And(vec![
        Filter::eq(fields::POST_ID, post_id),
        Filter::eq(fields::USER_ID, user_id),
    ])
}

/// Find the action a user took on a post, if any
pub async fn find_action<S: EntityStore>(
    store: &S,
    collection: Collection,
    post_id: ObjectId,
    user_id: &str,
) -> StoreResult<Option<PostAction>> {
    store
        .find_one(collection, &pair(post_id, user_id))
        .await?
        .map(bson::from_document)
        .transpose()
        .map_err(Into::into)
}

pub async fn find_action_by_id<S: EntityStore>(
    store: &S,
    collection: Collection,
    id: ObjectId,
) -> StoreResult<Option<PostAction>> {
    store
        .find_one(collection, &Filter::eq(fields::ID, id))
        .await?
        .map(bson::from_document)
        .transpose()
        .map_err(Into::into)
}

pub async fn insert_action<S: EntityStore>(
    store: &S,
    collection: Collection,
    action: &PostAction,
) -> StoreResult<ObjectId> {
    let document = bson::to_document(action)?;
    store.insert_one(collection, document).await
}

/// Delete the action a user took on a post
pub async fn delete_action<S: EntityStore>(
    store: &S,
    collection: Collection,
    post_id: ObjectId,
    user_id: &str,
) -> StoreResult<u64> {
    store
        .delete_one(collection, &pair(post_id, user_id), None)
        .await
}

pub async fn delete_action_by_id<S: EntityStore>(
    store: &S,
    collection: Collection,
    id: ObjectId,
) -> StoreResult<u64> {
    store
        .delete_one(collection, &Filter::eq(fields::ID, id), None)
        .await
}
