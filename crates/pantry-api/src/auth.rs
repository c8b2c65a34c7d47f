//! HTTP Basic-auth extractors backed by per-user argon2 hashes.
//!
//! [`Authenticated`] rejects anonymous requests. [`OptionalUser`] lets them
//! through as the anonymous viewer, but a request that does send an
//! `Authorization` header must send a valid one.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use pantry_core::{store::RecipeStore, user::{User, Viewer}};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// The request carried valid credentials for this user.
pub struct Authenticated(pub User);

/// The user behind the request, or `None` for an anonymous request.
pub struct OptionalUser(pub Option<User>);

impl OptionalUser {
  pub fn viewer(&self) -> Viewer {
    self.0.as_ref().map_or(Viewer::Anonymous, |u| Viewer::User(u.user_id))
  }
}

/// Produce the argon2 PHC string stored for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}").into()))
}

/// Whether `password` matches the stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    .unwrap_or(false)
}

/// Split a `Basic` authorization header into username and password.
/// `None` without a header, `Some(None)` when it is malformed.
fn basic_credentials(headers: &HeaderMap) -> Option<Option<(String, String)>> {
  let value = headers.get(header::AUTHORIZATION)?;
  let parsed = value
    .to_str()
    .ok()
    .and_then(|v| v.strip_prefix("Basic "))
    .and_then(|encoded| B64.decode(encoded).ok())
    .and_then(|decoded| String::from_utf8(decoded).ok())
    .and_then(|creds| {
      creds
        .split_once(':')
        .map(|(user, pass)| (user.to_owned(), pass.to_owned()))
    });
  Some(parsed)
}

/// Resolve the request's credentials.
///
/// No header is `Ok(None)`; a malformed header or bad credentials is
/// [`ApiError::Unauthorized`].
pub async fn authenticate<S: RecipeStore>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Option<User>, ApiError> {
  let Some(credentials) = basic_credentials(headers) else {
    return Ok(None);
  };
  let (username, password) = credentials.ok_or(ApiError::Unauthorized)?;

  let (user, hash) = store
    .credentials(&username)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  if !verify_password(&password, &hash) {
    tracing::debug!(%username, "rejected credentials");
    return Err(ApiError::Unauthorized);
  }
  Ok(Some(user))
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: RecipeStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    authenticate(&parts.headers, state.store.as_ref())
      .await?
      .map(Authenticated)
      .ok_or(ApiError::Unauthorized)
  }
}

impl<S> FromRequestParts<AppState<S>> for OptionalUser
where
  S: RecipeStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(OptionalUser(authenticate(&parts.headers, state.store.as_ref()).await?))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    map
  }

  #[test]
  fn hash_then_verify() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
    assert!(!verify_password("correct horse", "not a phc string"));
  }

  #[test]
  fn basic_header_parsing() {
    assert_eq!(basic_credentials(&HeaderMap::new()), None);

    let encoded = B64.encode("alice:pa:ss");
    assert_eq!(
      basic_credentials(&headers(&format!("Basic {encoded}"))),
      Some(Some(("alice".into(), "pa:ss".into())))
    );

    assert_eq!(basic_credentials(&headers("Bearer token")), Some(None));
    assert_eq!(basic_credentials(&headers("Basic !!!")), Some(None));
  }
}
