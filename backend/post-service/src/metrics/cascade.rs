use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Post deletions by terminal outcome (committed, aborted, forbidden, not_found).
    pub static ref POST_DELETE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_delete_total",
        "Post delete cascades segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register post_delete_total");

    /// Failed removal branches during a delete cascade.
    pub static ref POST_DELETE_BRANCH_FAILURES: IntCounterVec = register_int_counter_vec!(
        "post_delete_branch_failures_total",
        "Delete cascade branch failures segmented by branch",
        &["branch"]
    )
    .expect("failed to register post_delete_branch_failures_total");
}
