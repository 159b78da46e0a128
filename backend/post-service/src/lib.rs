//! Post Service Library
//!
//! Posts, comments, likes, shares and bookmarks for the forum, with feed
//! reads served by single aggregation pipelines and post deletion handled
//! by a transactional cascade.

pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod projection;
pub mod repository;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
