//! Core types and utilities shared by the chatrelay crates.
//!
//! This crate provides the identifiers that flow through every layer and the
//! rootcause-based `Result` alias used by fallible operations.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{DispatchId, ParseIdError, UserId};
