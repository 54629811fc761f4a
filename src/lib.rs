//! Mediasync - Media metadata reconciliation against external catalogs
//!
//! This library crate exposes the reconciliation engine, its content store
//! collaborators and configuration, for the CLI and for integration testing.

pub mod config;
pub mod images;
pub mod reconcile;
pub mod store;
