use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::domain::{Caller, Comment, CommentView, Reply, ReplyView};
use crate::error::{AppError, Result};
use crate::repository::{comments, posts};
use crate::store::EntityStore;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

impl CommentRequest {
    fn text(&self) -> Result<String> {
        self.validate()?;
        let text = self.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("text must not be blank".to_string()));
        }
        Ok(text.to_string())
    }
}

pub struct CommentService<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> CommentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Comment on a post that allows comments.
    pub async fn create(&self, post_id: ObjectId, caller: &Caller, req: CommentRequest) -> Result<CommentView> {
        let text = req.text()?;
        let store = self.store.as_ref();
        let post = posts::find_post(store, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
        if !post.allow_comment {
            return Err(AppError::Forbidden("comments are disabled for this post".to_string()));
        }

        let now = Utc::now();
        let mut comment = Comment {
            id: None,
            post_id,
            user_id: caller.user_id.clone(),
            text,
            reply: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let id = comments::insert_comment(store, &comment).await?;
        comment.id = Some(id);
        info!(comment_id = %id, post_id = %post_id, user_id = %caller.user_id, "Comment created");
        Ok(CommentView::from(comment))
    }

    /// Delete a comment and its replies. Authors and admins only.
    pub async fn delete(&self, comment_id: ObjectId, caller: &Caller) -> Result<()> {
        let store = self.store.as_ref();
        let comment = self.find(comment_id).await?;
        if !caller.can_modify(&comment.user_id) {
            return Err(AppError::Forbidden("only the author or an admin can delete this comment".to_string()));
        }
        comments::delete_comment(store, comment_id).await?;
        info!(comment_id = %comment_id, user_id = %caller.user_id, "Comment deleted");
        Ok(())
    }

    pub async fn add_reply(&self, comment_id: ObjectId, caller: &Caller, req: CommentRequest) -> Result<ReplyView> {
        let text = req.text()?;
        let now = Utc::now();
        let reply = Reply {
            id: ObjectId::new(),
            user_id: caller.user_id.clone(),
            text,
            created_at: now,
            updated_at: now,
        };

        if !comments::push_reply(self.store.as_ref(), comment_id, &reply).await? {
            return Err(AppError::NotFound(format!("comment {} not found", comment_id)));
        }
        info!(comment_id = %comment_id, reply_id = %reply.id, user_id = %caller.user_id, "Reply added");
        Ok(ReplyView::from(reply))
    }

    /// Remove a reply. The reply author, the comment author and admins may do so.
    pub async fn delete_reply(&self, comment_id: ObjectId, reply_id: ObjectId, caller: &Caller) -> Result<()> {
        let comment = self.find(comment_id).await?;
        let reply = comment
            .reply
            .iter()
            .find(|r| r.id == reply_id)
            .ok_or_else(|| AppError::NotFound(format!("reply {} not found", reply_id)))?;
        if !caller.can_modify(&reply.user_id) && caller.user_id != comment.user_id {
            return Err(AppError::Forbidden("only the author or an admin can delete this reply".to_string()));
        }

        if !comments::pull_reply(self.store.as_ref(), comment_id, reply_id).await? {
            return Err(AppError::NotFound(format!("reply {} not found", reply_id)));
        }
        info!(comment_id = %comment_id, reply_id = %reply_id, user_id = %caller.user_id, "Reply deleted");
        Ok(())
    }

    async fn find(&self, comment_id: ObjectId) -> Result<Comment> {
        comments::find_comment(self.store.as_ref(), comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {} not found", comment_id)))
    }
}
