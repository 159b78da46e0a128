use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post visibility. Only `Public` posts appear in the public feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Privacy {
    #[default]
    Public,
    Private,
    #[serde(rename = "Friend Only")]
    FriendOnly,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "Public",
            Privacy::Private => "Private",
            Privacy::FriendOnly => "Friend Only",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Public" => Some(Privacy::Public),
            "Private" => Some(Privacy::Private),
            "Friend Only" => Some(Privacy::FriendOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

/// Account role propagated by the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    User,
    Admin,
}

impl AccountType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            r if r.eq_ignore_ascii_case("user") => Some(AccountType::User),
            r if r.eq_ignore_ascii_case("admin") => Some(AccountType::Admin),
            _ => None,
        }
    }
}

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub account_type: AccountType,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            user_id: user_id.into(),
            account_type,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self::new(user_id, AccountType::User)
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, AccountType::Admin)
    }

    /// Owners and admins may modify a resource.
    pub fn can_modify(&self, owner: &str) -> bool {
        self.user_id == owner || self.account_type == AccountType::Admin
    }
}

// ============================================
// Persisted documents
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub media: Vec<Media>,
    pub privacy: Privacy,
    pub allow_comment: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A like, share or bookmark row: one per (user, post) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub post_id: ObjectId,
    pub user_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PostAction {
    pub fn new(post_id: ObjectId, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            post_id,
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub type Bookmark = PostAction;

/// How often a user liked posts carrying `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPreference {
    pub tag: String,
    pub count: i64,
}

/// One document per user in the `preference` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    #[serde(default)]
    pub tags: Vec<TagPreference>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id: user_id.into(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub post_id: ObjectId,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub reply: Vec<Reply>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

// ============================================
// API views
// ============================================

fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub media: Vec<Media>,
    pub privacy: Privacy,
    pub allow_comment: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: hex(post.id),
            user_id: post.user_id,
            text: post.text,
            media: post.media,
            privacy: post.privacy,
            allow_comment: post.allow_comment,
            tags: post.tags,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// A post enriched with live engagement data for the requesting viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: PostView,
    pub count_like: u64,
    pub count_share: u64,
    pub count_comment: u64,
    pub is_liked: bool,
    pub is_shared: bool,
    pub total_data: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reply> for ReplyView {
    fn from(reply: Reply) -> Self {
        Self {
            id: reply.id.to_hex(),
            user_id: reply.user_id,
            text: reply.text,
            created_at: reply.created_at,
            updated_at: reply.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    pub reply: Vec<ReplyView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            id: hex(comment.id),
            post_id: comment.post_id.to_hex(),
            user_id: comment.user_id,
            text: comment.text,
            reply: comment.reply.into_iter().map(ReplyView::from).collect(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: CommentView,
    pub total_data: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionView {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<PostAction> for ActionView {
    fn from(action: PostAction) -> Self {
        Self {
            id: hex(action.id),
            post_id: action.post_id.to_hex(),
            user_id: action.user_id,
            created_at: action.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceView {
    pub user_id: String,
    pub tags: Vec<TagPreference>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserPreference> for PreferenceView {
    fn from(preference: UserPreference) -> Self {
        Self {
            user_id: preference.user_id,
            tags: preference.tags,
            updated_at: preference.updated_at,
        }
    }
}

/// Tag occurrence inside the trending window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopTag {
    pub tag: String,
    pub count: u64,
    pub posts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total_data: u64,
    pub page: u64,
    pub limit: u64,
}
