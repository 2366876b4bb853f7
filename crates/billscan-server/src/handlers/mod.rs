//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod bills;
pub mod health;
pub mod stats;
pub mod upload;

// Re-export all handlers for use in router
pub use audit::*;
pub use bills::*;
pub use health::*;
pub use stats::*;
pub use upload::*;
