//! Mediasync-Common: Shared types, identifiers, and errors.
//!
//! This crate provides common functionality used across mediasync:
//!
//! - **Typed IDs**: A string-backed wrapper for content store record IDs
//! - **Core Types**: Enums for media types, catalog providers, and cover modes
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use mediasync_common::{MediaType, Provider, RecordId};
//!
//! let id = RecordId::from("rec_42");
//! assert_eq!(id.as_str(), "rec_42");
//!
//! let provider: Provider = "tmdb".parse().unwrap();
//! assert_eq!(provider, Provider::Tmdb);
//! assert!(MediaType::Episode.is_sub_resource());
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
