use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::domain::Caller;
use crate::error::{parse_object_id, Result};
use crate::handlers::{success, PageParams};
use crate::state::AppState;
use crate::store::EntityStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookmarkRequest {
    pub post_id: String,
}

/// Posts the caller bookmarked, oldest bookmark first
pub async fn bookmark_feed<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let page = state
        .feeds
        .bookmark_feed(&caller.user_id, &params.query())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn create_bookmark<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    req: web::Json<CreateBookmarkRequest>,
) -> Result<HttpResponse> {
    let post_id = parse_object_id(&req.post_id, "postId")?;
    let bookmark = state.bookmarks.create(post_id, &caller).await?;
    Ok(HttpResponse::Created().json(bookmark))
}

pub async fn delete_bookmark<S: EntityStore>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let bookmark_id = parse_object_id(&path, "bookmarkId")?;
    state.bookmarks.delete(bookmark_id, &caller).await?;
    Ok(success())
}
