//! Domain model of the Pantry recipe service: users, the tag and
//! ingredient catalog, recipes with their ingredient lines, and the
//! favorite / cart / subscription relations between them.
//!
//! Validation of client payloads and the read-side projections live here
//! too. Storage is reached only through [`store::RecipeStore`].

pub mod catalog;
pub mod compose;
pub mod error;
pub mod image;
pub mod page;
pub mod recipe;
pub mod relation;
pub mod shopping;
pub mod store;
pub mod user;
pub mod view;

pub use error::{DomainError, Error, Result, ValidationError};
