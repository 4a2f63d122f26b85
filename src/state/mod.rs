//! State module for tracking traversal progress
//!
//! # Components
//!
//! - `TraversalState`: the per-seed pagination state machine
//! - `Pass`: which engine pass is running (traversal, info-fill, refresh, hydration)

mod pass;
mod traversal_state;

// Re-export main types
pub use pass::Pass;
pub use traversal_state::TraversalState;
