//! Domain layer - Core business entities.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.
//! Persistence models convert to and from the types defined here.

pub mod constants;
pub mod error;
pub mod user;

pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use user::{User, UserResponse};
