//! Sweep pipeline.
//!
//! Every run flows through:
//! 1. `RunTracker::begin()`: record the run as `Started`
//! 2. `BatchPaginator::run()`: one call per query, each bound to one rule
//! 3. `DecisionRule::decide()`: keyword or unread-age decision per thread
//! 4. `RunTracker::complete()` / `fail()`: terminal status
//!
//! **Deletion is opt-in.** Every decision is logged; trashing happens only
//! when the paginator is built with trashing enabled.

pub mod keywords;
pub mod labels;
pub mod paginator;
pub mod rules;
pub mod sweep;
pub mod tracker;
pub mod types;
