/// HTTP handlers
///
/// Routes live under `/api/v1`; `configure` registers them for any
/// `EntityStore` so tests can mount the same routes over the in-process store.
pub mod bookmarks;
pub mod comments;
pub mod health;
pub mod posts;
pub mod preferences;

use actix_web::web;
use serde::Deserialize;

use crate::error::AppError;
use crate::metrics::serve_metrics;
use crate::services::PageQuery;
use crate::store::EntityStore;

/// Pagination parameters shared by every feed route
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageParams {
    pub fn query(&self) -> PageQuery {
        PageQuery::with_defaults(self.page, self.limit)
    }
}

/// Split a comma separated query value, dropping empty items.
pub(crate) fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn success() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(serde_json::json!({ "message": "success" }))
}

pub fn configure<S: EntityStore>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::Validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(health::health))
    .route("/ready", web::get().to(health::readiness::<S>))
    .route("/metrics", web::get().to(serve_metrics))
    .service(
        web::scope("/api/v1")
            // feeds: static segments before `{id}`
            .route("/posts/public", web::get().to(posts::public_feed::<S>))
            .route("/posts/me", web::get().to(posts::my_feed::<S>))
            .route("/posts/me/media", web::get().to(posts::my_media::<S>))
            .route("/posts/me/liked", web::get().to(posts::my_liked::<S>))
            .route("/users/{user_id}/posts", web::get().to(posts::user_feed::<S>))
            .route("/users/{user_id}/media", web::get().to(posts::user_media::<S>))
            .route("/users/{user_id}/liked", web::get().to(posts::user_liked::<S>))
            .route("/tags/top", web::get().to(posts::top_tags::<S>))
            // posts
            .route("/posts", web::post().to(posts::create_post::<S>))
            .route("/posts/{id}", web::get().to(posts::get_post::<S>))
            .route("/posts/{id}", web::delete().to(posts::delete_post::<S>))
            .route("/posts/{id}/likes", web::post().to(posts::like_post::<S>))
            .route("/posts/{id}/likes", web::delete().to(posts::unlike_post::<S>))
            .route("/posts/{id}/shares", web::post().to(posts::share_post::<S>))
            // comments
            .route("/posts/{id}/comments", web::get().to(comments::post_comments::<S>))
            .route("/posts/{id}/comments", web::post().to(comments::create_comment::<S>))
            .route("/comments/{id}", web::delete().to(comments::delete_comment::<S>))
            .route("/comments/{id}/replies", web::post().to(comments::add_reply::<S>))
            .route(
                "/comments/{id}/replies/{reply_id}",
                web::delete().to(comments::delete_reply::<S>),
            )
            // bookmarks
            .route("/bookmarks", web::get().to(bookmarks::bookmark_feed::<S>))
            .route("/bookmarks", web::post().to(bookmarks::create_bookmark::<S>))
            .route("/bookmarks/{id}", web::delete().to(bookmarks::delete_bookmark::<S>))
            // preferences
            .route("/preferences/me", web::get().to(preferences::my_preferences::<S>)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_lists() {
        assert_eq!(split_list(Some("rust, go,,mongo ")), vec!["rust", "go", "mongo"]);
        assert!(split_list(Some("")).is_empty());
        assert!(split_list(None).is_empty());
    }
}
