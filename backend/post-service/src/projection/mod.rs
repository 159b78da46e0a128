//! Read-model projection
//!
//! Every post feed ends in the same shape: the post fields, three counts
//! and two viewer flags, plus `totalData`. The stages producing that shape
//! live here so each feed builder shares them, and so does the decoding of
//! projected rows into API responses.
pub mod engagement;

use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::Document;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{
    Comment, CommentResponse, CommentView, Media, PostResponse, PostView, Privacy, Reply, TopTag,
};
use crate::pipeline::{fields, Expr, FieldPath, Lookup, Stage};
use crate::store::{Collection, StoreResult};

pub const COUNT_LIKE: &str = "countLike";
pub const COUNT_SHARE: &str = "countShare";
pub const COUNT_COMMENT: &str = "countComment";
pub const IS_LIKED: &str = "isLiked";
pub const IS_SHARED: &str = "isShared";
pub const TOTAL_DATA: &str = "totalData";

fn join(from: Collection, local_field: &FieldPath, foreign_field: FieldPath, as_field: &FieldPath) -> Stage {
    Stage::Lookup(Lookup {
        from,
        local_field: local_field.clone(),
        foreign_field,
        as_field: as_field.as_str().to_string(),
    })
}

/// Joins and derived fields appended to the data branch of a post feed.
///
/// `post_id` is where the post id sits in the data rows: `_id` for post
/// feeds, `post._id` for feeds driven by likes or bookmarks.
pub fn engagement_stages(post_id: &FieldPath, viewer: &str) -> Vec<Stage> {
    vec![
        join(Collection::Likes, post_id, fields::POST_ID, &fields::LIKE),
        join(Collection::Shares, post_id, fields::POST_ID, &fields::SHARE),
        join(Collection::Comments, post_id, fields::POST_ID, &fields::COMMENT),
        Stage::AddFields(vec![
            (COUNT_LIKE.to_string(), Expr::Size(fields::LIKE)),
            (COUNT_SHARE.to_string(), Expr::Size(fields::SHARE)),
            // top-level comments only; replies are embedded
            (COUNT_COMMENT.to_string(), Expr::Size(fields::COMMENT)),
            (
                IS_LIKED.to_string(),
                Expr::ViewerIn {
                    actions: fields::LIKE,
                    key: fields::USER_ID,
                    viewer: viewer.to_string(),
                },
            ),
            (
                IS_SHARED.to_string(),
                Expr::ViewerIn {
                    actions: fields::SHARE,
                    key: fields::USER_ID,
                    viewer: viewer.to_string(),
                },
            ),
        ]),
    ]
}

/// Canonical `$project` for post feeds.
///
/// `post` is the prefix holding the post document, `derived` the prefix
/// holding the fields added by [`engagement_stages`], `total` the unwound
/// count branch.
pub fn post_response_stage(post: &FieldPath, derived: &FieldPath, total: &FieldPath) -> Stage {
    let from_post = [
        fields::ID,
        fields::USER_ID,
        fields::TEXT,
        fields::MEDIA,
        fields::PRIVACY,
        fields::ALLOW_COMMENT,
        fields::TAGS,
        fields::CREATED_AT,
        fields::UPDATED_AT,
    ];
    let from_derived = [COUNT_LIKE, COUNT_SHARE, COUNT_COMMENT, IS_LIKED, IS_SHARED];

    let mut projected: Vec<(String, Expr)> = from_post
        .iter()
        .map(|field| (field.as_str().to_string(), Expr::Field(post.join(field))))
        .collect();
    projected.extend(from_derived.iter().map(|name| {
        (
            name.to_string(),
            Expr::Field(derived.join(&FieldPath::from_static(*name))),
        )
    }));
    projected.push((TOTAL_DATA.to_string(), Expr::Field(total.join(&fields::TOTAL))));

    Stage::Project(projected)
}

/// Projection for paged comments.
pub fn comment_response_stage(comment: &FieldPath, total: &FieldPath) -> Stage {
    let from_comment = [
        fields::ID,
        fields::POST_ID,
        fields::USER_ID,
        fields::TEXT,
        fields::REPLY,
        fields::CREATED_AT,
        fields::UPDATED_AT,
    ];

    let mut projected: Vec<(String, Expr)> = from_comment
        .iter()
        .map(|field| (field.as_str().to_string(), Expr::Field(comment.join(field))))
        .collect();
    projected.push((TOTAL_DATA.to_string(), Expr::Field(total.join(&fields::TOTAL))));

    Stage::Project(projected)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRow {
    #[serde(rename = "_id")]
    id: ObjectId,
    user_id: String,
    text: String,
    #[serde(default)]
    media: Vec<Media>,
    #[serde(default)]
    privacy: Privacy,
    #[serde(default)]
    allow_comment: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
    count_like: u64,
    count_share: u64,
    count_comment: u64,
    is_liked: bool,
    is_shared: bool,
    total_data: u64,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            post: PostView {
                id: row.id.to_hex(),
                user_id: row.user_id,
                text: row.text,
                media: row.media,
                privacy: row.privacy,
                allow_comment: row.allow_comment,
                tags: row.tags,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            count_like: row.count_like,
            count_share: row.count_share,
            count_comment: row.count_comment,
            is_liked: row.is_liked,
            is_shared: row.is_shared,
            total_data: row.total_data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentRow {
    #[serde(rename = "_id")]
    id: ObjectId,
    post_id: ObjectId,
    user_id: String,
    text: String,
    #[serde(default)]
    reply: Vec<Reply>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
    total_data: u64,
}

#[derive(Debug, Deserialize)]
struct TopTagRow {
    #[serde(rename = "_id")]
    tag: String,
    count: u64,
    #[serde(default)]
    posts: Vec<ObjectId>,
}

pub fn decode_post_rows(rows: Vec<Document>) -> StoreResult<Vec<PostResponse>> {
    rows.into_iter()
        .map(|row| Ok(bson::from_document::<PostRow>(row)?.into()))
        .collect()
}

pub fn decode_comment_rows(rows: Vec<Document>) -> StoreResult<Vec<CommentResponse>> {
    rows.into_iter()
        .map(|row| {
            let row: CommentRow = bson::from_document(row)?;
            let comment = Comment {
                id: Some(row.id),
                post_id: row.post_id,
                user_id: row.user_id,
                text: row.text,
                reply: row.reply,
                created_at: row.created_at,
                updated_at: row.updated_at,
            };
            Ok(CommentResponse {
                comment: CommentView::from(comment),
                total_data: row.total_data,
            })
        })
        .collect()
}

pub fn decode_top_tags(rows: Vec<Document>) -> StoreResult<Vec<TopTag>> {
    rows.into_iter()
        .map(|row| {
            let row: TopTagRow = bson::from_document(row)?;
            Ok(TopTag {
                tag: row.tag,
                count: row.count,
                posts: row.posts.into_iter().map(|id| id.to_hex()).collect(),
            })
        })
        .collect()
}
