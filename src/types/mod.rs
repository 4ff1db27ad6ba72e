//! Shared types

pub mod enums;
pub mod error;

pub use error::{ErrorBody, FarmError, FieldError, Result};
