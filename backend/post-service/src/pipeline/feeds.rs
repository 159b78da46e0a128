//! Feed pipeline shapes
//!
//! All post feeds share one layout:
//!
//! ```text
//! $match -> $sort -> $facet { total: [$count], datas: [$skip, $limit, joins, derived] }
//!        -> $unwind datas -> $unwind total -> $project
//! ```
//!
//! Both facet branches see the same match-set, so `totalData` is the size of
//! the whole match-set regardless of the page. Unwinding an empty branch
//! yields no rows, which callers report as not found.
use bson::Bson;
use chrono::{DateTime, Duration, NaiveTime, Utc};

use super::{fields, Accumulator, FieldPath, Filter, Group, Lookup, Pipeline, PipelineError, SortOrder, Stage};
use crate::domain::Privacy;
use crate::projection::{comment_response_stage, engagement_stages, post_response_stage};
use crate::store::Collection;

/// Validated 1-based page with a positive limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page: u64,
    limit: u64,
}

impl PageWindow {
    pub fn new(page: u64, limit: u64) -> Result<Self, PipelineError> {
        if page == 0 {
            return Err(PipelineError::ZeroPage);
        }
        if limit == 0 {
            return Err(PipelineError::ZeroLimit);
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    fn stages(&self) -> [Stage; 2] {
        [Stage::Skip(self.skip()), Stage::Limit(self.limit)]
    }
}

/// Optional narrowing of the public feed.
#[derive(Debug, Clone)]
pub struct PublicFeedFilter {
    pub tags: Vec<String>,
    pub user_ids: Vec<String>,
    /// Oldest `createdAt` admitted, see [`window_start`].
    pub window_start: DateTime<Utc>,
}

/// Midnight UTC of the day `days` before `now`.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let day = (now - Duration::days(i64::from(days))).date_naive();
    day.and_time(NaiveTime::MIN).and_utc()
}

fn bson_time(at: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(at))
}

fn newest_first() -> Stage {
    Stage::Sort(vec![
        (fields::CREATED_AT, SortOrder::Descending),
        (fields::ID, SortOrder::Descending),
    ])
}

fn oldest_first() -> Stage {
    Stage::Sort(vec![
        (fields::CREATED_AT, SortOrder::Ascending),
        (fields::ID, SortOrder::Ascending),
    ])
}

fn name(path: &FieldPath) -> String {
    path.as_str().to_string()
}

/// Assemble match, sort, facet, unwinds and a final projection.
fn paged(
    filter: Filter,
    sort: Stage,
    window: PageWindow,
    data_stages: Vec<Stage>,
    project: Stage,
) -> Result<Pipeline, PipelineError> {
    let mut datas: Vec<Stage> = window.stages().into();
    datas.extend(data_stages);

    Pipeline::new(vec![
        Stage::Match(filter),
        sort,
        Stage::Facet(vec![
            (name(&fields::TOTAL), vec![Stage::Count(name(&fields::TOTAL))]),
            (name(&fields::DATAS), datas),
        ]),
        Stage::Unwind(fields::DATAS),
        Stage::Unwind(fields::TOTAL),
        project,
    ])
}

fn post_feed(filter: Filter, viewer: &str, window: PageWindow) -> Result<Pipeline, PipelineError> {
    let datas = fields::DATAS;
    paged(
        filter,
        newest_first(),
        window,
        engagement_stages(&fields::ID, viewer),
        post_response_stage(&datas, &datas, &fields::TOTAL),
    )
}

/// Feeds whose base collection is `like` or `bookmark`: the post is joined
/// and unwound first, so relation rows pointing at a deleted post vanish.
fn relation_feed(
    filter: Filter,
    sort: Stage,
    viewer: &str,
    window: PageWindow,
) -> Result<Pipeline, PipelineError> {
    let datas = fields::DATAS;
    let post_id = fields::POST.join(&fields::ID);

    let mut stages = vec![
        Stage::Lookup(Lookup {
            from: Collection::Posts,
            local_field: fields::POST_ID,
            foreign_field: fields::ID,
            as_field: name(&fields::POST),
        }),
        Stage::Unwind(fields::POST),
    ];
    stages.extend(engagement_stages(&post_id, viewer));

    paged(
        filter,
        sort,
        window,
        stages,
        post_response_stage(&datas.join(&fields::POST), &datas, &fields::TOTAL),
    )
}

/// Public posts created inside the recency window. Runs on `post`.
pub fn public_feed(
    viewer: &str,
    filter: &PublicFeedFilter,
    window: PageWindow,
) -> Result<Pipeline, PipelineError> {
    let mut narrowing = Vec::with_capacity(3);
    if !filter.tags.is_empty() {
        narrowing.push(Filter::any_of(fields::TAGS, filter.tags.clone()));
    }
    if !filter.user_ids.is_empty() {
        narrowing.push(Filter::any_of(fields::USER_ID, filter.user_ids.clone()));
    }
    narrowing.push(Filter::Always);

    let matcher = Filter::And(vec![
        Filter::gte(fields::CREATED_AT, bson_time(filter.window_start)),
        Filter::eq(fields::PRIVACY, Privacy::Public.as_str()),
        Filter::Or(narrowing),
    ]);

    post_feed(matcher, viewer, window)
}

/// Posts authored by `owner`. Runs on `post`.
pub fn user_feed(viewer: &str, owner: &str, window: PageWindow) -> Result<Pipeline, PipelineError> {
    post_feed(Filter::eq(fields::USER_ID, owner), viewer, window)
}

/// Posts authored by `owner` that carry at least one media item. Runs on `post`.
pub fn media_feed(viewer: &str, owner: &str, window: PageWindow) -> Result<Pipeline, PipelineError> {
    let matcher = Filter::And(vec![
        Filter::eq(fields::USER_ID, owner),
        Filter::Exists(fields::FIRST_MEDIA, true),
    ]);
    post_feed(matcher, viewer, window)
}

/// Posts liked by `owner`, most recent like first. Runs on `like`.
pub fn liked_feed(viewer: &str, owner: &str, window: PageWindow) -> Result<Pipeline, PipelineError> {
    relation_feed(Filter::eq(fields::USER_ID, owner), newest_first(), viewer, window)
}

/// Posts bookmarked by `owner`, oldest bookmark first. Runs on `bookmark`.
pub fn bookmark_feed(owner: &str, window: PageWindow) -> Result<Pipeline, PipelineError> {
    relation_feed(Filter::eq(fields::USER_ID, owner), oldest_first(), owner, window)
}

/// Top-level comments of a post, newest first. Runs on `comment`.
pub fn post_comments(post_id: bson::oid::ObjectId, window: PageWindow) -> Result<Pipeline, PipelineError> {
    paged(
        Filter::eq(fields::POST_ID, post_id),
        newest_first(),
        window,
        Vec::new(),
        comment_response_stage(&fields::DATAS, &fields::TOTAL),
    )
}

/// Tags ranked by the number of posts created since `since`. Runs on `post`.
pub fn top_tags(since: DateTime<Utc>, window: PageWindow) -> Result<Pipeline, PipelineError> {
    Pipeline::new(vec![
        Stage::Match(Filter::gte(fields::CREATED_AT, bson_time(since))),
        Stage::Unwind(fields::TAGS),
        Stage::Group(Group {
            key: fields::TAGS,
            accumulators: vec![
                (name(&fields::COUNT), Accumulator::Count),
                (name(&fields::POSTS), Accumulator::AddToSet(fields::ID)),
            ],
        }),
        Stage::Sort(vec![
            (fields::COUNT, SortOrder::Descending),
            (fields::ID, SortOrder::Ascending),
        ]),
        Stage::Skip(window.skip()),
        Stage::Limit(window.limit()),
    ])
}
