//! Shared types for the Shelf workspace: configuration, the catalog model and
//! its store contract, caption parsing, and structured trace events.

pub mod caption;
pub mod catalog;
pub mod config;
pub mod delivery;
pub mod error;
pub mod step;
pub mod trace;

pub use error::{Error, Result};
