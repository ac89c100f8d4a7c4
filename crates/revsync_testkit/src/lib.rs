//! # revsync Testkit
//!
//! Test utilities for revsync.
//!
//! This crate provides:
//! - Fixtures: tracked databases, a seeded survey, test servers
//! - Validation gates with scripted verdicts
//! - `MirrorClient`, an offline client simulator
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use revsync_testkit::prelude::*;
//!
//! #[test]
//! fn client_sees_its_own_push() {
//!     let server = test_server();
//!     let mut client = MirrorClient::new(project, profile);
//!     client.upsert(&table("site"), id, site_fields(project, "North"));
//!     client.sync(&server).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use client::*;
pub use fixtures::*;
pub use generators::*;
