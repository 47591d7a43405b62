//! Shared types for the commerce core workspace
//!
//! Data models, unified error codes and ID/time utilities used by the
//! engine crate and by the collaborators that embed it.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use http;
pub use serde::{Deserialize, Serialize};
