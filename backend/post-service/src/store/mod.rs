//! Entity store abstraction
//!
//! Everything that touches persisted documents goes through [`EntityStore`].
//! Two implementations ship with the service: [`mongo::MongoStore`] for
//! production and [`memory::MemoryStore`], an in-process engine that
//! executes the same typed pipelines and is used by tests and the `memory`
//! backend.
pub mod memory;
pub mod mongo;

use std::fmt;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::Document;
use thiserror::Error;

use crate::pipeline::{FieldPath, Filter, Pipeline, PipelineError};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Posts,
    Likes,
    Comments,
    Shares,
    Bookmarks,
    Preferences,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Posts,
        Collection::Likes,
        Collection::Comments,
        Collection::Shares,
        Collection::Bookmarks,
        Collection::Preferences,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Posts => "post",
            Collection::Likes => "like",
            Collection::Comments => "comment",
            Collection::Shares => "share",
            Collection::Bookmarks => "bookmark",
            Collection::Preferences => "preference",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Document decode error: {0}")]
    Decode(#[from] bson::de::Error),

    #[error("Document encode error: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Pipeline evaluation error: {0}")]
    Evaluation(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A store session able to run a single multi-document transaction.
///
/// Sessions are owned by exactly one operation and released on drop.
#[async_trait]
pub trait StoreSession: Send + Sync {
    async fn start_transaction(&self) -> StoreResult<()>;
    async fn commit_transaction(&self) -> StoreResult<()>;
    async fn abort_transaction(&self) -> StoreResult<()>;
}

/// Document store operations used by repositories and the delete coordinator.
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    type Session: StoreSession + 'static;

    async fn start_session(&self) -> StoreResult<Self::Session>;

    /// Run a validated pipeline against `collection`.
    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline)
        -> StoreResult<Vec<Document>>;

    async fn find_one(&self, collection: Collection, filter: &Filter)
        -> StoreResult<Option<Document>>;

    /// Insert a document, assigning `_id` when absent. Returns the id.
    async fn insert_one(&self, collection: Collection, document: Document) -> StoreResult<ObjectId>;

    /// Append `value` to the array at `field` of document `id`.
    /// Returns false when no document matched.
    async fn push_embedded(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &FieldPath,
        value: Document,
    ) -> StoreResult<bool>;

    /// Remove the element with `_id == element_id` from the array at `field`.
    /// Returns false when nothing was removed.
    async fn pull_embedded(
        &self,
        collection: Collection,
        id: ObjectId,
        field: &FieldPath,
        element_id: ObjectId,
    ) -> StoreResult<bool>;

    /// Overwrite the top-level fields in `values` on document `id`.
    /// Returns false when no document matched.
    async fn set_fields(
        &self,
        collection: Collection,
        id: ObjectId,
        values: Document,
    ) -> StoreResult<bool>;

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&Self::Session>,
    ) -> StoreResult<u64>;

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
        session: Option<&Self::Session>,
    ) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}
