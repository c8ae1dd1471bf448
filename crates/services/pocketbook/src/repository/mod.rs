//! Repository layer for data access.
//!
//! [`GenericRepository`] gives strict CRUD over any tracked entity and
//! propagates every failure. [`UserStore`] specializes it for users and turns
//! read and staging failures into logged sentinel results.

mod base;
pub mod entities;
mod lookup;
mod user_repository;

pub use base::{GenericRepository, Identifiable, Repository};
pub use lookup::Lookup;
pub use user_repository::{UserRepository, UserStore};

#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
