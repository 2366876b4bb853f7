//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `bills` - Stored bill commands (list, show, delete)
//! - `core` - Core commands (init) and shared utilities (open_db)
//! - `extract` - Offline extraction from a saved analysis response
//! - `serve` - Web server command
//! - `status` - Status and aggregate commands

pub mod bills;
pub mod core;
pub mod extract;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use bills::*;
pub use core::*;
pub use extract::*;
pub use serve::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
