//! devsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, content identity, and error handling for the devsync workspace.
//!
//! # Overview
//!
//! - **Types**: the normalized device [`Entry`](types::Entry) and sync [`Task`](types::Task)
//! - **Identity**: deterministic content-addressed identifiers for idempotent storage
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use devsync_common::identity::assign_identity;
//! use devsync_common::types::Entry;
//!
//! fn key_for(mut entry: Entry) -> devsync_common::Result<String> {
//!     assign_identity(&mut entry)?;
//!     Ok(entry.storage_id.unwrap_or_default())
//! }
//! ```

pub mod error;
pub mod identity;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
