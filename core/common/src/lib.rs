//! Common utilities and types shared across driveup crates.
//!
//! This module provides the error taxonomy every layer reports through,
//! plus the identifier and secret types that cross crate boundaries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{DriveId, Secret};
