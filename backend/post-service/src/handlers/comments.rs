use actix_web::{web, HttpResponse};

use crate::domain::Caller;
use crate::error::{parse_object_id, Result};
use crate::handlers::{success, PageParams};
use crate::services::CommentRequest;
use crate::state::AppState;
use crate::store::EntityStore;

/// Top-level comments of a post with their replies, newest first
pub async fn post_comments<S: EntityStore>(
    state: web::Data<AppState<S>>,
    path: web::Path<String>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    let page = state.feeds.post_comments(post_id, &params.query()).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn create_comment<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
    req: web::Json<CommentRequest>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    let comment = state
        .comments
        .create(post_id, &caller, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

pub async fn delete_comment<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let comment_id = parse_object_id(&path, "commentId")?;
    state.comments.delete(comment_id, &caller).await?;
    Ok(success())
}

pub async fn add_reply<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
    req: web::Json<CommentRequest>,
) -> Result<HttpResponse> {
    let comment_id = parse_object_id(&path, "commentId")?;
    let reply = state
        .comments
        .add_reply(comment_id, &caller, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(reply))
}

pub async fn delete_reply<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (comment_id, reply_id) = path.into_inner();
    let comment_id = parse_object_id(&comment_id, "commentId")?;
    let reply_id = parse_object_id(&reply_id, "replyId")?;
    state
        .comments
        .delete_reply(comment_id, reply_id, &caller)
        .await?;
    Ok(success())
}
