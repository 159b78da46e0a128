use bson::oid::ObjectId;

use crate::domain::{Post, PostResponse, TopTag};
use crate::pipeline::{fields, Filter, Pipeline};
use crate::projection::{decode_post_rows, decode_top_tags};
use crate::store::{Collection, EntityStore, StoreResult};

/// Insert a post and return its id
pub async fn insert_post<S: EntityStore>(store: &S, post: &Post) -> StoreResult<ObjectId> {
    let document = bson::to_document(post)?;
    store.insert_one(Collection::Posts, document).await
}

/// Find a post by id
pub async fn find_post<S: EntityStore>(store: &S, id: ObjectId) -> StoreResult<Option<Post>> {
    store
        .find_one(Collection::Posts, &Filter::eq(fields::ID, id))
        .await?
        .map(bson::from_document)
        .transpose()
        .map_err(Into::into)
}

/// Delete a post by id, optionally inside a transaction
pub async fn delete_post<S: EntityStore>(
    store: &S,
    id: ObjectId,
    session: Option<&S::Session>,
) -> StoreResult<u64> {
    store
        .delete_one(Collection::Posts, &Filter::eq(fields::ID, id), session)
        .await
}

/// Run a post feed pipeline against its base collection
pub async fn feed<S: EntityStore>(
    store: &S,
    base: Collection,
    pipeline: &Pipeline,
) -> StoreResult<Vec<PostResponse>> {
    let rows = store.aggregate(base, pipeline).await?;
    decode_post_rows(rows)
}

pub async fn top_tags<S: EntityStore>(store: &S, pipeline: &Pipeline) -> StoreResult<Vec<TopTag>> {
    let rows = store.aggregate(Collection::Posts, pipeline).await?;
    decode_top_tags(rows)
}
