//! Shared types for the studio site workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
