//! Wire types for the AppLink integration catalog.
//!
//! This crate contains the serde-serializable types for connector
//! descriptors as they arrive from the remote catalog. These types
//! represent the "catalog layer" - the shapes of data as they appear
//! on the wire, before any validation has happened.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **Permissive**: Every template field is optional; the catalog is
//!   semi-trusted and rejection is the link builder's job, not the parser's
//! - **Stable**: Changes only when the catalog wire format changes
//!
//! Validation and link assembly are built on top of these types in
//! `applink-rs`.

pub mod catalog;
pub mod descriptor;

pub use catalog::*;
pub use descriptor::*;
