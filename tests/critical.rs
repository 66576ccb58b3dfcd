//! Critical test matrix: rate-window bound under contention, configuration
//! rejection, and failure isolation in the threaded dispatcher.
//!
//! Run with: `cargo test --test critical`

#[path = "critical/config_rejection.rs"]
mod config_rejection;
#[path = "critical/threaded_isolation.rs"]
mod threaded_isolation;
#[path = "critical/window_bound.rs"]
mod window_bound;
