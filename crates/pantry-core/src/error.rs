//! Error types for `pantry-core`.

use thiserror::Error;
use uuid::Uuid;

/// Rejections produced while checking a client payload.
///
/// Every variant names the payload field it concerns via
/// [`ValidationError::field`], so the HTTP layer can report it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{field} is required")]
  Missing { field: &'static str },

  #[error("{field} must be at most {max} characters")]
  TooLong { field: &'static str, max: usize },

  #[error("{field} contains characters that are not allowed")]
  InvalidCharacters { field: &'static str },

  #[error("the username {0:?} is reserved")]
  ReservedUsername(String),

  #[error("email address is malformed")]
  InvalidEmail,

  #[error("cooking time must be at least 1 minute, got {0}")]
  CookingTime(i64),

  #[error("at least one ingredient is required")]
  NoIngredients,

  #[error("ingredient {0} is listed more than once")]
  DuplicateIngredient(Uuid),

  #[error("amount of ingredient {id} must be at least 1, got {amount}")]
  Amount { id: Uuid, amount: i64 },

  #[error("at least one tag is required")]
  NoTags,

  #[error("tag {0} is listed more than once")]
  DuplicateTag(Uuid),

  #[error("ingredient {0} does not exist")]
  UnknownIngredient(Uuid),

  #[error("tag {0} does not exist")]
  UnknownTag(Uuid),

  #[error("no tag has the slug {0:?}")]
  UnknownTagSlug(String),

  #[error("image: {0}")]
  Image(String),

  #[error("current password is incorrect")]
  WrongPassword,
}

impl ValidationError {
  /// The payload field the rejection concerns.
  pub fn field(&self) -> &'static str {
    match self {
      Self::Missing { field }
      | Self::TooLong { field, .. }
      | Self::InvalidCharacters { field } => field,
      Self::ReservedUsername(_) => "username",
      Self::InvalidEmail => "email",
      Self::CookingTime(_) => "cooking_time",
      Self::NoIngredients
      | Self::DuplicateIngredient(_)
      | Self::Amount { .. }
      | Self::UnknownIngredient(_) => "ingredients",
      Self::NoTags
      | Self::DuplicateTag(_)
      | Self::UnknownTag(_)
      | Self::UnknownTagSlug(_) => "tags",
      Self::Image(_) => "image",
      Self::WrongPassword => "current_password",
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(#[from] ValidationError),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("{0}")]
  Conflict(String),

  #[error("only the author may modify this recipe")]
  Forbidden,

  #[error("cannot subscribe to yourself")]
  SelfSubscribe,

  #[error("{0}")]
  AlreadyRemoved(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: &'static str, id: Uuid) -> Self {
    Self::NotFound { entity, id }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by storage-backend errors so callers can recover the
/// domain-level [`Error`] (not found, conflict, ...) without knowing the
/// backend type.
pub trait DomainError {
  fn as_domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn as_domain(&self) -> Option<&Error> { Some(self) }
}
