//! Shared primitives, traits, and utilities for the Cyanea bioinformatics ecosystem.
//!
//! `cyanea-core` provides the foundation that all other Cyanea crates build on:
//!
//! - **Error types**: [`CyaneaError`] and [`Result`] for structured error handling
//! - **Traits**: Core abstractions like [`Scored`], [`Annotated`], [`Summarizable`]
//! - **Probabilities**: [`Log2Prob`] and log-space summation helpers

pub mod error;
pub mod prob;
pub mod traits;

pub use error::{CyaneaError, Result};
pub use prob::{log2_add, Log2Prob};
pub use traits::*;
