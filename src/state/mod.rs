//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `VisitedStore`: Durable record of URLs processed across runs
//! - `RunState`: Lifecycle states of a single crawl run

mod run_state;
mod visited;

// Re-export main types
pub use run_state::RunState;
pub use visited::VisitedStore;
