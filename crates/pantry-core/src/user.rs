//! Users and the viewer on whose behalf a request is served.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;

pub const MAX_NAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;

/// Usernames that would collide with fixed routes under `/users/`.
const RESERVED_USERNAMES: &[&str] = &["me", "subscriptions", "set_password"];

/// A registered account. The password hash is kept out of this type; see
/// [`crate::store::RecipeStore::credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub email:      String,
  pub username:   String,
  pub first_name: String,
  pub last_name:  String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::RecipeStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email:         String,
  pub username:      String,
  pub first_name:    String,
  pub last_name:     String,
  /// argon2 PHC string.
  pub password_hash: String,
}

/// Who is looking. Reads take a viewer explicitly instead of consulting any
/// ambient request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
  #[default]
  Anonymous,
  User(Uuid),
}

impl Viewer {
  pub fn user_id(&self) -> Option<Uuid> {
    match self {
      Self::Anonymous => None,
      Self::User(id) => Some(*id),
    }
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

/// JSON body of `POST /users/`. Fields are optional so that a missing field
/// surfaces as a [`ValidationError`] rather than a deserialisation failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationPayload {
  pub email:      Option<String>,
  pub username:   Option<String>,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub password:   Option<String>,
}

/// A registration that passed validation; the password is still plain text
/// and must be hashed before it reaches the store.
#[derive(Debug, Clone)]
pub struct Registration {
  pub email:      String,
  pub username:   String,
  pub first_name: String,
  pub last_name:  String,
  pub password:   String,
}

impl Registration {
  pub fn into_new_user(self, password_hash: String) -> NewUser {
    NewUser {
      email: self.email,
      username: self.username,
      first_name: self.first_name,
      last_name: self.last_name,
      password_hash,
    }
  }
}

impl RegistrationPayload {
  pub fn validate(self) -> Result<Registration, ValidationError> {
    let email = required("email", self.email, MAX_EMAIL_LEN)?;
    validate_email(&email)?;

    let username = required("username", self.username, MAX_NAME_LEN)?;
    validate_username(&username)?;

    Ok(Registration {
      email,
      username,
      first_name: required("first_name", self.first_name, MAX_NAME_LEN)?,
      last_name: required("last_name", self.last_name, MAX_NAME_LEN)?,
      password: validate_password("password", self.password)?,
    })
  }
}

/// Passwords are taken verbatim; surrounding whitespace is significant.
pub fn validate_password(
  field: &'static str,
  password: Option<String>,
) -> Result<String, ValidationError> {
  let password = password
    .filter(|p| !p.is_empty())
    .ok_or(ValidationError::Missing { field })?;
  if password.chars().count() > MAX_NAME_LEN {
    return Err(ValidationError::TooLong { field, max: MAX_NAME_LEN });
  }
  Ok(password)
}

/// Trim a required text field and enforce its length limit.
pub(crate) fn required(
  field: &'static str,
  value: Option<String>,
  max: usize,
) -> Result<String, ValidationError> {
  let value = value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
    .ok_or(ValidationError::Missing { field })?;
  if value.chars().count() > max {
    return Err(ValidationError::TooLong { field, max });
  }
  Ok(value)
}

/// Letters, digits and `.@+-_` only; a handful of names are reserved.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
  let allowed = |c: char| c.is_alphanumeric() || "_.@+-".contains(c);
  if !username.chars().all(allowed) {
    return Err(ValidationError::InvalidCharacters { field: "username" });
  }
  let lowered = username.to_lowercase();
  if RESERVED_USERNAMES.contains(&lowered.as_str()) {
    return Err(ValidationError::ReservedUsername(username.to_owned()));
  }
  Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
  match email.split_once('@') {
    Some((local, domain))
      if !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace) =>
    {
      Ok(())
    }
    _ => Err(ValidationError::InvalidEmail),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn payload() -> RegistrationPayload {
    RegistrationPayload {
      email:      Some("cook@example.com".into()),
      username:   Some("cook".into()),
      first_name: Some("Julia".into()),
      last_name:  Some("Child".into()),
      password:   Some("hunter2".into()),
    }
  }

  #[test]
  fn valid_registration_passes() {
    let reg = payload().validate().unwrap();
    assert_eq!(reg.username, "cook");
  }

  #[test]
  fn reserved_username_rejected_case_insensitively() {
    let mut p = payload();
    p.username = Some("Me".into());
    assert_eq!(
      p.validate().unwrap_err(),
      ValidationError::ReservedUsername("Me".into())
    );
  }

  #[test]
  fn username_with_space_rejected() {
    let mut p = payload();
    p.username = Some("julia child".into());
    assert_eq!(
      p.validate().unwrap_err(),
      ValidationError::InvalidCharacters { field: "username" }
    );
  }

  #[test]
  fn missing_and_blank_fields_are_reported() {
    let mut p = payload();
    p.first_name = Some("   ".into());
    assert_eq!(
      p.validate().unwrap_err(),
      ValidationError::Missing { field: "first_name" }
    );

    let mut p = payload();
    p.password = None;
    assert_eq!(p.validate().unwrap_err().field(), "password");
  }

  #[test]
  fn malformed_email_rejected() {
    for bad in ["nobody", "@example.com", "a@b@c", "a b@example.com"] {
      let mut p = payload();
      p.email = Some(bad.into());
      assert_eq!(p.validate().unwrap_err(), ValidationError::InvalidEmail, "{bad}");
    }
  }

  #[test]
  fn anonymous_viewer_has_no_id() {
    assert_eq!(Viewer::Anonymous.user_id(), None);
    let id = Uuid::new_v4();
    assert_eq!(Viewer::User(id).user_id(), Some(id));
  }
}
