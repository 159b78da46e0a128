/// Feed reads: every post feed, paged comments and trending tags.
///
/// Each read is a single aggregation round trip. An empty page is reported
/// as `NotFound` rather than an empty list.
use std::future::Future;
use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::config::FeedConfig;
use crate::domain::{CommentResponse, Paginated, PostResponse, TopTag};
use crate::error::{AppError, Result};
use crate::metrics::feed::{FEED_REQUEST_DURATION_SECONDS, FEED_REQUEST_TOTAL};
use crate::pipeline::feeds::{self, PageWindow, PublicFeedFilter};
use crate::pipeline::Pipeline;
use crate::repository::{comments, posts};
use crate::store::{Collection, EntityStore};

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

/// `?page=&limit=` query parameters
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1))]
    pub limit: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    pub fn with_defaults(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            limit: limit.unwrap_or_else(default_limit),
        }
    }
}

/// Optional narrowing of the public feed
#[derive(Debug, Clone, Default)]
pub struct PublicFeedQuery {
    pub tags: Vec<String>,
    pub user_ids: Vec<String>,
}

pub struct FeedService<S: EntityStore> {
    store: Arc<S>,
    config: FeedConfig,
}

impl<S: EntityStore> FeedService<S> {
    pub fn new(store: Arc<S>, config: FeedConfig) -> Self {
        Self { store, config }
    }

    fn window(&self, query: &PageQuery) -> Result<PageWindow> {
        query.validate()?;
        if query.limit > self.config.max_limit {
            return Err(AppError::Validation(format!(
                "limit must not exceed {}",
                self.config.max_limit
            )));
        }
        Ok(PageWindow::new(query.page, query.limit)?)
    }

    async fn post_page(
        &self,
        feed: &'static str,
        base: Collection,
        window: PageWindow,
        pipeline: Pipeline,
    ) -> Result<Paginated<PostResponse>> {
        let rows = observed(feed, async {
            posts::feed(self.store.as_ref(), base, &pipeline)
                .await
                .map_err(AppError::from)
        })
        .await?;
        paginate(feed, rows, window, |row| row.total_data)
    }

    /// Public posts from the last few days, newest first.
    pub async fn public_feed(
        &self,
        viewer: &str,
        query: &PageQuery,
        narrowing: PublicFeedQuery,
    ) -> Result<Paginated<PostResponse>> {
        let window = self.window(query)?;
        let filter = PublicFeedFilter {
            tags: narrowing.tags,
            user_ids: narrowing.user_ids,
            window_start: feeds::window_start(Utc::now(), self.config.public_window_days),
        };
        self.post_page(
            "public",
            Collection::Posts,
            window,
            feeds::public_feed(viewer, &filter, window)?,
        )
        .await
    }

    /// Posts authored by `owner` as seen by `viewer`.
    pub async fn user_feed(
        &self,
        viewer: &str,
        owner: &str,
        query: &PageQuery,
    ) -> Result<Paginated<PostResponse>> {
        let window = self.window(query)?;
        self.post_page(
            "user",
            Collection::Posts,
            window,
            feeds::user_feed(viewer, owner, window)?,
        )
        .await
    }

    pub async fn media_feed(
        &self,
        viewer: &str,
        owner: &str,
        query: &PageQuery,
    ) -> Result<Paginated<PostResponse>> {
        let window = self.window(query)?;
        self.post_page(
            "media",
            Collection::Posts,
            window,
            feeds::media_feed(viewer, owner, window)?,
        )
        .await
    }

    pub async fn liked_feed(
        &self,
        viewer: &str,
        owner: &str,
        query: &PageQuery,
    ) -> Result<Paginated<PostResponse>> {
        let window = self.window(query)?;
        self.post_page(
            "liked",
            Collection::Likes,
            window,
            feeds::liked_feed(viewer, owner, window)?,
        )
        .await
    }

    pub async fn bookmark_feed(&self, owner: &str, query: &PageQuery) -> Result<Paginated<PostResponse>> {
        let window = self.window(query)?;
        self.post_page(
            "bookmark",
            Collection::Bookmarks,
            window,
            feeds::bookmark_feed(owner, window)?,
        )
        .await
    }

    pub async fn post_comments(
        &self,
        post_id: ObjectId,
        query: &PageQuery,
    ) -> Result<Paginated<CommentResponse>> {
        let window = self.window(query)?;
        let pipeline = feeds::post_comments(post_id, window)?;
        let rows = observed("comments", async {
            comments::page(self.store.as_ref(), &pipeline)
                .await
                .map_err(AppError::from)
        })
        .await?;
        paginate("comments", rows, window, |row| row.total_data)
    }

    /// Tags used by posts created since midnight UTC today.
    pub async fn top_tags(&self, query: &PageQuery) -> Result<Vec<TopTag>> {
        let window = self.window(query)?;
        let pipeline = feeds::top_tags(feeds::window_start(Utc::now(), 0), window)?;
        let rows = observed("top_tags", async {
            posts::top_tags(self.store.as_ref(), &pipeline)
                .await
                .map_err(AppError::from)
        })
        .await?;
        if rows.is_empty() {
            return Err(AppError::NotFound("no tags in the current window".to_string()));
        }
        Ok(rows)
    }
}

/// Record duration and outcome of one feed read.
async fn observed<T, F>(feed: &'static str, read: F) -> Result<Vec<T>>
where
    F: Future<Output = Result<Vec<T>>>,
{
    let timer = FEED_REQUEST_DURATION_SECONDS
        .with_label_values(&[feed])
        .start_timer();
    let result = read.await;
    timer.observe_duration();

    let outcome = match &result {
        Ok(rows) if rows.is_empty() => "empty",
        Ok(_) => "ok",
        Err(_) => "error",
    };
    FEED_REQUEST_TOTAL.with_label_values(&[feed, outcome]).inc();
    result
}

fn paginate<T>(
    feed: &str,
    rows: Vec<T>,
    window: PageWindow,
    total: impl Fn(&T) -> u64,
) -> Result<Paginated<T>> {
    let total_data = match rows.first() {
        Some(row) => total(row),
        None => return Err(AppError::NotFound(format!("no {} entries for this page", feed))),
    };
    Ok(Paginated {
        data: rows,
        total_data,
        page: window.page(),
        limit: window.limit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_bounds() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert!(query.validate().is_ok());
        assert!(PageQuery::new(0, 10).validate().is_err());
        assert!(PageQuery::new(1, 0).validate().is_err());
    }
}
