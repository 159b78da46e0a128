//! Cascading post delete
//!
//! Removing a post also removes its likes, shares and comments. The four
//! removals run concurrently on a `JoinSet`; the coordinator waits for all
//! of them, then commits or aborts the transaction:
//!
//! ```text
//! Authorized -> SessionOpened -> TransactionStarted -> Fanning -> Deciding -> Committed | Aborted
//! ```
//!
//! With [`CascadeScope::Split`] only the likes and post removals join the
//! transaction. Shares and comments are removed outside it and are not
//! restored when the transaction aborts. [`CascadeScope::Atomic`] runs all
//! four inside the transaction.
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::Caller;
use crate::error::{AppError, Result};
use crate::metrics::cascade::{POST_DELETE_BRANCH_FAILURES, POST_DELETE_TOTAL};
use crate::repository::delete_by_post as delete_dependents;
use crate::repository::posts;
use crate::store::{Collection, EntityStore, StoreResult, StoreSession};

/// Which removal branches run inside the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeScope {
    /// Likes and post in the transaction; shares and comments outside.
    #[default]
    Split,
    /// Every branch in the transaction.
    Atomic,
}

impl CascadeScope {
    pub fn is_transactional(self, branch: Branch) -> bool {
        match self {
            CascadeScope::Atomic => true,
            CascadeScope::Split => matches!(branch, Branch::Likes | Branch::Post),
        }
    }
}

impl FromStr for CascadeScope {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "split" => Ok(CascadeScope::Split),
            "atomic" => Ok(CascadeScope::Atomic),
            other => Err(format!("unknown cascade scope '{}', expected split or atomic", other)),
        }
    }
}

/// One concurrent removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Likes,
    Post,
    Shares,
    Comments,
}

impl Branch {
    pub const ALL: [Branch; 4] = [Branch::Likes, Branch::Post, Branch::Shares, Branch::Comments];

    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Likes => "likes",
            Branch::Post => "post",
            Branch::Shares => "shares",
            Branch::Comments => "comments",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Authorized,
    SessionOpened,
    TransactionStarted,
    Fanning,
    Deciding,
    Committed,
    Aborted,
}

/// Rows removed per branch by a committed delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub post: u64,
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
}

impl DeleteReport {
    fn record(&mut self, branch: Branch, removed: u64) {
        match branch {
            Branch::Likes => self.likes = removed,
            Branch::Post => self.post = removed,
            Branch::Shares => self.shares = removed,
            Branch::Comments => self.comments = removed,
        }
    }
}

pub struct CascadeDelete<S: EntityStore> {
    store: Arc<S>,
    scope: CascadeScope,
}

impl<S: EntityStore> CascadeDelete<S> {
    pub fn new(store: Arc<S>, scope: CascadeScope) -> Self {
        Self { store, scope }
    }

    /// Delete `post_id` and everything that references it.
    ///
    /// Fails with `NotFound` or `Forbidden` before any write. Once the
    /// branches are running, the first failure observed aborts the
    /// transaction and is returned after every branch has finished.
    pub async fn delete_post(&self, post_id: ObjectId, caller: &Caller) -> Result<DeleteReport> {
        let post = match posts::find_post(self.store.as_ref(), post_id).await? {
            Some(post) => post,
            None => {
                POST_DELETE_TOTAL.with_label_values(&["not_found"]).inc();
                return Err(AppError::NotFound(format!("post {} not found", post_id)));
            }
        };
        if !caller.can_modify(&post.user_id) {
            POST_DELETE_TOTAL.with_label_values(&["forbidden"]).inc();
            warn!(post_id = %post_id, user_id = %caller.user_id, "Delete rejected: not the author");
            return Err(AppError::Forbidden(
                "only the author or an admin can delete this post".to_string(),
            ));
        }
        transition(post_id, Phase::Authorized);

        let session = Arc::new(self.store.start_session().await?);
        transition(post_id, Phase::SessionOpened);

        session.start_transaction().await?;
        transition(post_id, Phase::TransactionStarted);

        let mut tasks = JoinSet::new();
        for branch in Branch::ALL {
            let store = Arc::clone(&self.store);
            let session = self
                .scope
                .is_transactional(branch)
                .then(|| Arc::clone(&session));
            tasks.spawn(async move {
                let removed = remove(store.as_ref(), branch, post_id, session.as_deref()).await;
                (branch, removed)
            });
        }
        transition(post_id, Phase::Fanning);

        let mut report = DeleteReport::default();
        let mut first_error: Option<AppError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((branch, Ok(removed))) => {
                    debug!(post_id = %post_id, branch = %branch, removed, "Delete branch finished");
                    report.record(branch, removed);
                }
                Ok((branch, Err(err))) => {
                    POST_DELETE_BRANCH_FAILURES
                        .with_label_values(&[branch.as_str()])
                        .inc();
                    warn!(post_id = %post_id, branch = %branch, error = %err, "Delete branch failed");
                    first_error.get_or_insert(AppError::Store(err));
                }
                Err(join_err) => {
                    warn!(post_id = %post_id, error = %join_err, "Delete branch task did not complete");
                    first_error.get_or_insert(AppError::Internal(format!(
                        "delete branch task failed: {}",
                        join_err
                    )));
                }
            }
        }
        transition(post_id, Phase::Deciding);

        if let Some(err) = first_error {
            abort(post_id, session.as_ref()).await;
            return Err(err);
        }

        if let Err(err) = session.commit_transaction().await {
            warn!(post_id = %post_id, error = %err, "Commit failed");
            abort(post_id, session.as_ref()).await;
            return Err(AppError::Store(err));
        }

        transition(post_id, Phase::Committed);
        POST_DELETE_TOTAL.with_label_values(&["committed"]).inc();
        info!(
            post_id = %post_id,
            likes = report.likes,
            shares = report.shares,
            comments = report.comments,
            "Post deleted"
        );
        Ok(report)
    }
}

async fn remove<S: EntityStore>(
    store: &S,
    branch: Branch,
    post_id: ObjectId,
    session: Option<&S::Session>,
) -> StoreResult<u64> {
    match branch {
        Branch::Post => posts::delete_post(store, post_id, session).await,
        Branch::Likes => delete_dependents(store, Collection::Likes, post_id, session).await,
        Branch::Shares => delete_dependents(store, Collection::Shares, post_id, session).await,
        Branch::Comments => delete_dependents(store, Collection::Comments, post_id, session).await,
    }
}

async fn abort<T: StoreSession>(post_id: ObjectId, session: &T) {
    if let Err(err) = session.abort_transaction().await {
        warn!(post_id = %post_id, error = %err, "Abort failed");
    }
    transition(post_id, Phase::Aborted);
    POST_DELETE_TOTAL.with_label_values(&["aborted"]).inc();
}

fn transition(post_id: ObjectId, phase: Phase) {
    debug!(post_id = %post_id, phase = ?phase, "Delete cascade transition");
}
