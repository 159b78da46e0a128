//! Typed aggregation pipeline builder
//!
//! Feed reads are expressed as a sequence of [`Stage`]s instead of free-form
//! documents. Field references go through [`FieldPath`], so a malformed path
//! is rejected when the pipeline is built rather than when the store runs it.
//! A [`Pipeline`] value is always structurally valid; the only way to obtain
//! one is [`Pipeline::new`], which validates every stage recursively.
//!
//! Rendering to MongoDB aggregation documents happens in
//! [`Pipeline::to_documents`]; the in-process store interprets the same
//! stages directly.
pub mod feeds;

use std::borrow::Cow;
use std::fmt;

use bson::{doc, Bson, Document};
use thiserror::Error;

use crate::store::Collection;

/// Errors raised while assembling a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("invalid field path '{0}'")]
    InvalidFieldPath(String),

    #[error("invalid output field name '{0}'")]
    InvalidFieldName(String),

    #[error("page must be greater than zero")]
    ZeroPage,

    #[error("limit must be greater than zero")]
    ZeroLimit,

    #[error("facet stage has no branches")]
    EmptyFacet,

    #[error("facet branch '{0}' has no stages")]
    EmptyFacetBranch(String),

    #[error("facet stages cannot be nested")]
    NestedFacet,

    #[error("{0} stage has no fields")]
    EmptyStage(&'static str),
}

/// A validated dotted field reference such as `post._id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Cow<'static, str>);

impl FieldPath {
    /// Parse a runtime path. Segments must be non-empty and may not contain
    /// `$`, whitespace or NUL.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        if is_valid_path(raw) {
            Ok(Self(Cow::Owned(raw.to_string())))
        } else {
            Err(PipelineError::InvalidFieldPath(raw.to_string()))
        }
    }

    /// Compile-time constant path. Every constant built this way is checked
    /// by the `static_paths_are_valid` test.
    pub(crate) const fn from_static(raw: &'static str) -> Self {
        Self(Cow::Borrowed(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// `post` joined with `_id` gives `post._id`.
    pub fn join(&self, child: &FieldPath) -> FieldPath {
        FieldPath(Cow::Owned(format!("{}.{}", self.0, child.0)))
    }

    /// `$`-prefixed form used inside expressions.
    pub fn reference(&self) -> String {
        format!("${}", self.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c == '$' || c == '\0' || c.is_whitespace())
}

fn is_valid_path(raw: &str) -> bool {
    !raw.is_empty() && raw.split('.').all(is_valid_segment)
}

fn is_valid_name(raw: &str) -> bool {
    is_valid_segment(raw) && !raw.contains('.')
}

/// Field names of the persisted collections and of the joined arrays and
/// facet branches produced by feed pipelines.
pub mod fields {
    use super::FieldPath;

    pub const ID: FieldPath = FieldPath::from_static("_id");
    pub const USER_ID: FieldPath = FieldPath::from_static("userId");
    pub const POST_ID: FieldPath = FieldPath::from_static("postId");
    pub const TEXT: FieldPath = FieldPath::from_static("text");
    pub const MEDIA: FieldPath = FieldPath::from_static("media");
    pub const FIRST_MEDIA: FieldPath = FieldPath::from_static("media.0");
    pub const PRIVACY: FieldPath = FieldPath::from_static("privacy");
    pub const ALLOW_COMMENT: FieldPath = FieldPath::from_static("allowComment");
    pub const TAGS: FieldPath = FieldPath::from_static("tags");
    pub const REPLY: FieldPath = FieldPath::from_static("reply");
    pub const CREATED_AT: FieldPath = FieldPath::from_static("createdAt");
    pub const UPDATED_AT: FieldPath = FieldPath::from_static("updatedAt");

    pub const POST: FieldPath = FieldPath::from_static("post");
    pub const LIKE: FieldPath = FieldPath::from_static("like");
    pub const SHARE: FieldPath = FieldPath::from_static("share");
    pub const COMMENT: FieldPath = FieldPath::from_static("comment");
    pub const DATAS: FieldPath = FieldPath::from_static("datas");
    pub const TOTAL: FieldPath = FieldPath::from_static("total");
    pub const COUNT: FieldPath = FieldPath::from_static("count");
    pub const POSTS: FieldPath = FieldPath::from_static("posts");
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Row predicate used by `$match` stages and by single-document lookups.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document (`{}`).
    Always,
    Eq(FieldPath, Bson),
    In(FieldPath, Vec<Bson>),
    Gte(FieldPath, Bson),
    Exists(FieldPath, bool),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter::Eq(path, value.into())
    }

    pub fn any_of<V: Into<Bson>>(path: FieldPath, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(path, values.into_iter().map(Into::into).collect())
    }

    pub fn gte(path: FieldPath, value: impl Into<Bson>) -> Self {
        Filter::Gte(path, value.into())
    }

    pub fn to_document(&self) -> Document {
        match self {
            Filter::Always => Document::new(),
            Filter::Eq(path, value) => single(path.as_str(), value.clone()),
            Filter::In(path, values) => single(path.as_str(), doc! { "$in": values.clone() }),
            Filter::Gte(path, value) => single(path.as_str(), doc! { "$gte": value.clone() }),
            Filter::Exists(path, exists) => {
                single(path.as_str(), doc! { "$exists": *exists })
            }
            Filter::And(filters) => doc! { "$and": render_filters(filters) },
            Filter::Or(filters) => doc! { "$or": render_filters(filters) },
        }
    }
}

fn render_filters(filters: &[Filter]) -> Vec<Bson> {
    filters
        .iter()
        .map(|f| Bson::Document(f.to_document()))
        .collect()
}

/// Computed value used by `$addFields` and `$project`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(FieldPath),
    Literal(Bson),
    /// Cardinality of an array field.
    Size(FieldPath),
    /// True when some element of the `actions` array has `key == viewer`.
    ViewerIn {
        actions: FieldPath,
        key: FieldPath,
        viewer: String,
    },
}

impl Expr {
    fn to_bson(&self) -> Bson {
        match self {
            Expr::Field(path) => Bson::String(path.reference()),
            Expr::Literal(value) => Bson::Document(doc! { "$literal": value.clone() }),
            Expr::Size(path) => Bson::Document(doc! { "$size": path.reference() }),
            Expr::ViewerIn {
                actions,
                key,
                viewer,
            } => Bson::Document(doc! {
                "$in": [viewer.as_str(), actions.join(key).reference()]
            }),
        }
    }
}

/// `$lookup` join between the current rows and another collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: Collection,
    pub local_field: FieldPath,
    pub foreign_field: FieldPath,
    pub as_field: String,
}

/// Accumulators supported by `$group`.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// `{ $sum: 1 }`
    Count,
    AddToSet(FieldPath),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: FieldPath,
    pub accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort(Vec<(FieldPath, SortOrder)>),
    Skip(u64),
    Limit(u64),
    Count(String),
    Lookup(Lookup),
    Unwind(FieldPath),
    AddFields(Vec<(String, Expr)>),
    Facet(Vec<(String, Vec<Stage>)>),
    Group(Group),
    Project(Vec<(String, Expr)>),
}

impl Stage {
    fn validate(&self, inside_facet: bool) -> Result<(), PipelineError> {
        match self {
            Stage::Match(_) | Stage::Skip(_) | Stage::Unwind(_) => Ok(()),
            Stage::Limit(0) => Err(PipelineError::ZeroLimit),
            Stage::Limit(_) => Ok(()),
            Stage::Sort(keys) if keys.is_empty() => Err(PipelineError::EmptyStage("$sort")),
            Stage::Sort(_) => Ok(()),
            Stage::Count(name) => check_name(name),
            Stage::Lookup(lookup) => check_name(&lookup.as_field),
            Stage::AddFields(fields) => check_fields("$addFields", fields),
            Stage::Project(fields) => check_fields("$project", fields),
            Stage::Group(group) => {
                if group.accumulators.is_empty() {
                    return Err(PipelineError::EmptyStage("$group"));
                }
                for (name, _) in &group.accumulators {
                    check_name(name)?;
                    if name == "_id" {
                        return Err(PipelineError::InvalidFieldName(name.clone()));
                    }
                }
                Ok(())
            }
            Stage::Facet(_) if inside_facet => Err(PipelineError::NestedFacet),
            Stage::Facet(branches) => {
                if branches.is_empty() {
                    return Err(PipelineError::EmptyFacet);
                }
                for (name, stages) in branches {
                    check_name(name)?;
                    if stages.is_empty() {
                        return Err(PipelineError::EmptyFacetBranch(name.clone()));
                    }
                    for stage in stages {
                        stage.validate(true)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn to_document(&self) -> Document {
        match self {
            Stage::Match(filter) => doc! { "$match": filter.to_document() },
            Stage::Sort(keys) => {
                let mut spec = Document::new();
                for (path, order) in keys {
                    spec.insert(path.as_str(), order.as_i32());
                }
                doc! { "$sort": spec }
            }
            Stage::Skip(n) => doc! { "$skip": to_i64(*n) },
            Stage::Limit(n) => doc! { "$limit": to_i64(*n) },
            Stage::Count(name) => doc! { "$count": name.as_str() },
            Stage::Lookup(lookup) => doc! {
                "$lookup": {
                    "from": lookup.from.name(),
                    "localField": lookup.local_field.as_str(),
                    "foreignField": lookup.foreign_field.as_str(),
                    "as": lookup.as_field.as_str(),
                }
            },
            Stage::Unwind(path) => doc! { "$unwind": path.reference() },
            Stage::AddFields(fields) => doc! { "$addFields": render_fields(fields) },
            Stage::Project(fields) => doc! { "$project": render_fields(fields) },
            Stage::Facet(branches) => {
                let mut spec = Document::new();
                for (name, stages) in branches {
                    let rendered: Vec<Bson> = stages
                        .iter()
                        .map(|s| Bson::Document(s.to_document()))
                        .collect();
                    spec.insert(name.as_str(), rendered);
                }
                doc! { "$facet": spec }
            }
            Stage::Group(group) => {
                let mut spec = doc! { "_id": group.key.reference() };
                for (name, accumulator) in &group.accumulators {
                    let rendered = match accumulator {
                        Accumulator::Count => doc! { "$sum": 1 },
                        Accumulator::AddToSet(path) => doc! { "$addToSet": path.reference() },
                    };
                    spec.insert(name.as_str(), rendered);
                }
                doc! { "$group": spec }
            }
        }
    }
}

fn check_name(name: &str) -> Result<(), PipelineError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(PipelineError::InvalidFieldName(name.to_string()))
    }
}

fn check_fields(stage: &'static str, fields: &[(String, Expr)]) -> Result<(), PipelineError> {
    if fields.is_empty() {
        return Err(PipelineError::EmptyStage(stage));
    }
    fields.iter().try_for_each(|(name, _)| check_name(name))
}

fn render_fields(fields: &[(String, Expr)]) -> Document {
    let mut spec = Document::new();
    for (name, expr) in fields {
        spec.insert(name.as_str(), expr.to_bson());
    }
    spec
}

fn single(key: &str, value: impl Into<Bson>) -> Document {
    let mut document = Document::new();
    document.insert(key, value.into());
    document
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// An ordered, validated list of stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Result<Self, PipelineError> {
        for stage in &stages {
            stage.validate(false)?;
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_paths_are_valid() {
        let all = [
            fields::ID,
            fields::USER_ID,
            fields::POST_ID,
            fields::TEXT,
            fields::MEDIA,
            fields::FIRST_MEDIA,
            fields::PRIVACY,
            fields::ALLOW_COMMENT,
            fields::TAGS,
            fields::REPLY,
            fields::CREATED_AT,
            fields::UPDATED_AT,
            fields::POST,
            fields::LIKE,
            fields::SHARE,
            fields::COMMENT,
            fields::DATAS,
            fields::TOTAL,
            fields::COUNT,
            fields::POSTS,
        ];
        for path in all {
            assert_eq!(FieldPath::parse(path.as_str()).unwrap(), path);
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        for raw in ["", "$like", "post..id", "post.", " tags", "a.$b"] {
            assert_eq!(
                FieldPath::parse(raw),
                Err(PipelineError::InvalidFieldPath(raw.to_string()))
            );
        }
        assert!(FieldPath::parse("datas.post._id").is_ok());
    }

    #[test]
    fn rejects_zero_limit_and_nested_facets() {
        assert_eq!(
            Pipeline::new(vec![Stage::Limit(0)]),
            Err(PipelineError::ZeroLimit)
        );

        let nested = Stage::Facet(vec![(
            "outer".to_string(),
            vec![Stage::Facet(vec![("inner".to_string(), vec![Stage::Skip(1)])])],
        )]);
        assert_eq!(Pipeline::new(vec![nested]), Err(PipelineError::NestedFacet));

        let empty_branch = Stage::Facet(vec![("total".to_string(), vec![])]);
        assert_eq!(
            Pipeline::new(vec![empty_branch]),
            Err(PipelineError::EmptyFacetBranch("total".to_string()))
        );
    }

    #[test]
    fn rejects_dotted_output_names() {
        let stage = Stage::AddFields(vec![("count.like".to_string(), Expr::Size(fields::TAGS))]);
        assert_eq!(
            Pipeline::new(vec![stage]),
            Err(PipelineError::InvalidFieldName("count.like".to_string()))
        );
    }

    #[test]
    fn renders_filters() {
        let filter = Filter::And(vec![
            Filter::eq(fields::PRIVACY, "Public"),
            Filter::Or(vec![
                Filter::any_of(fields::TAGS, vec!["rust"]),
                Filter::Always,
            ]),
            Filter::Exists(fields::FIRST_MEDIA, true),
        ]);

        assert_eq!(
            filter.to_document(),
            doc! {
                "$and": [
                    { "privacy": "Public" },
                    { "$or": [ { "tags": { "$in": ["rust"] } }, {} ] },
                    { "media.0": { "$exists": true } },
                ]
            }
        );
    }

    #[test]
    fn renders_engagement_expressions() {
        let like = FieldPath::parse("like").unwrap();
        let pipeline = Pipeline::new(vec![Stage::AddFields(vec![
            ("countLike".to_string(), Expr::Size(like.clone())),
            (
                "isLiked".to_string(),
                Expr::ViewerIn {
                    actions: like,
                    key: fields::USER_ID,
                    viewer: "u-1".to_string(),
                },
            ),
        ])])
        .unwrap();

        assert_eq!(
            pipeline.to_documents(),
            vec![doc! {
                "$addFields": {
                    "countLike": { "$size": "$like" },
                    "isLiked": { "$in": ["u-1", "$like.userId"] },
                }
            }]
        );
    }
}
