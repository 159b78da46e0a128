use bson::oid::ObjectId;

use crate::domain::{Comment, CommentResponse, Reply};
use crate::pipeline::{fields, Filter, Pipeline};
use crate::projection::decode_comment_rows;
use crate::store::{Collection, EntityStore, StoreResult};

pub async fn insert_comment<S: EntityStore>(store: &S, comment: &Comment) -> StoreResult<ObjectId> {
    let document = bson::to_document(comment)?;
    store.insert_one(Collection::Comments, document).await
}

pub async fn find_comment<S: EntityStore>(store: &S, id: ObjectId) -> StoreResult<Option<Comment>> {
    store
        .find_one(Collection::Comments, &Filter::eq(fields::ID, id))
        .await?
        .map(bson::from_document)
        .transpose()
        .map_err(Into::into)
}

pub async fn delete_comment<S: EntityStore>(store: &S, id: ObjectId) -> StoreResult<u64> {
    store
        .delete_one(Collection::Comments, &Filter::eq(fields::ID, id), None)
        .await
}

/// Append a reply to a comment. Returns false when the comment is gone.
pub async fn push_reply<S: EntityStore>(store: &S, comment_id: ObjectId, reply: &Reply) -> StoreResult<bool> {
    let document = bson::to_document(reply)?;
    store
        .push_embedded(Collection::Comments, comment_id, &fields::REPLY, document)
        .await
}

pub async fn pull_reply<S: EntityStore>(
    store: &S,
    comment_id: ObjectId,
    reply_id: ObjectId,
) -> StoreResult<bool> {
    store
        .pull_embedded(Collection::Comments, comment_id, &fields::REPLY, reply_id)
        .await
}

/// Run a paged comment pipeline
pub async fn page<S: EntityStore>(store: &S, pipeline: &Pipeline) -> StoreResult<Vec<CommentResponse>> {
    let rows = store.aggregate(Collection::Comments, pipeline).await?;
    decode_comment_rows(rows)
}
