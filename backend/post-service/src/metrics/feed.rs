use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    /// Duration of feed reads by feed name (public, user, media, liked, bookmark, comments, top_tags).
    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_request_duration_seconds",
        "Feed request duration segmented by feed",
        &["feed"]
    )
    .expect("failed to register feed_request_duration_seconds");

    /// Feed reads by feed name and outcome (ok, empty, error).
    pub static ref FEED_REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_request_total",
        "Total feed requests segmented by feed and outcome",
        &["feed", "outcome"]
    )
    .expect("failed to register feed_request_total");
}
