/// Post handlers - feeds, post lifecycle, likes and shares
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::domain::Caller;
use crate::error::{parse_object_id, Result};
use crate::handlers::{split_list, success, PageParams};
use crate::services::{CreatePostRequest, PublicFeedQuery};
use crate::state::AppState;
use crate::store::EntityStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicFeedParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Comma separated tags
    pub tags: Option<String>,
    /// Comma separated author ids
    pub user_ids: Option<String>,
}

/// Public posts from the recency window
pub async fn public_feed<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PublicFeedParams>,
) -> Result<HttpResponse> {
    let query = PageParams {
        page: params.page,
        limit: params.limit,
    }
    .query();
    let narrowing = PublicFeedQuery {
        tags: split_list(params.tags.as_deref()),
        user_ids: split_list(params.user_ids.as_deref()),
    };

    let page = state
        .feeds
        .public_feed(&caller.user_id, &query, narrowing)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn my_feed<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let page = state
        .feeds
        .user_feed(&caller.user_id, &caller.user_id, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Another user's posts; flags are computed for the caller
pub async fn user_feed<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let owner = path.into_inner();
    let page = state
        .feeds
        .user_feed(&caller.user_id, &owner, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn my_media<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let page = state
        .feeds
        .media_feed(&caller.user_id, &caller.user_id, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn user_media<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let owner = path.into_inner();
    let page = state
        .feeds
        .media_feed(&caller.user_id, &owner, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn my_liked<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let page = state
        .feeds
        .liked_feed(&caller.user_id, &caller.user_id, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn user_liked<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let owner = path.into_inner();
    let page = state
        .feeds
        .liked_feed(&caller.user_id, &owner, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn top_tags<S: EntityStore>(
    state: web::Data<AppState<S>>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let query = params.query();
    let tags = state.feeds.top_tags(&query).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "data": tags,
        "page": query.page,
        "limit": query.limit,
    })))
}

pub async fn create_post<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let post = state.posts.create_post(&caller, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn get_post<S: EntityStore>(
    state: web::Data<AppState<S>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    let post = state.posts.get_post(post_id).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Delete a post with its likes, shares and comments
pub async fn delete_post<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    state.posts.delete_post(post_id, &caller).await?;
    Ok(success())
}

pub async fn like_post<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    let like = state.engagement.like(post_id, &caller).await?;
    Ok(HttpResponse::Created().json(like))
}

pub async fn unlike_post<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    state.engagement.unlike(post_id, &caller).await?;
    Ok(success())
}

pub async fn share_post<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&path, "postId")?;
    let share = state.engagement.share(post_id, &caller).await?;
    Ok(HttpResponse::Created().json(share))
}
