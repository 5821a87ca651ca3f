//! Shared primitives and traits for the Microval workspace.
//!
//! `microval-core` provides the foundation the other Microval crates build on:
//!
//! - **Error types**: [`MicrovalError`] and [`Result`] for structured error handling
//! - **Traits**: [`Predictor`], the black-box classifier capability, and [`Summarizable`]

pub mod error;
pub mod traits;

pub use error::{MicrovalError, Result};
pub use traits::*;
