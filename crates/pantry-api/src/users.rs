//! Handlers for `/users` endpoints: accounts and subscriptions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/` | Paginated |
//! | `POST` | `/users/` | Register; body: [`RegistrationPayload`] |
//! | `GET`  | `/users/{id}/` | 404 if not found |
//! | `GET`  | `/users/me/` | Auth |
//! | `POST` | `/users/set_password/` | Auth; body: `{new_password, current_password}` |
//! | `POST`/`DELETE` | `/users/{id}/subscribe/` | Auth; `?recipes_limit` |
//! | `GET`  | `/users/subscriptions/` | Auth; paginated; `?recipes_limit` |

use std::collections::HashSet;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
  http::StatusCode,
  response::IntoResponse,
};
use pantry_core::{
  ValidationError,
  page::Page,
  store::RecipeStore,
  user::{RegistrationPayload, User, validate_password},
  view::{Projector, SubscriptionView, UserView, ViewerState},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, PageParams,
  auth::{self, Authenticated, OptionalUser},
  ensure_in_range,
  error::ApiError,
  page_request, viewer_state,
};

fn project_user<S: RecipeStore>(state: &AppState<S>, flags: &ViewerState, user: &User) -> UserView {
  Projector::new(&state.config.media_url, flags).user(user)
}

// ─── Accounts ────────────────────────────────────────────────────────────────

/// `POST /users/`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  payload: Result<Json<RegistrationPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Json(payload) = payload?;
  let registration = payload.validate()?;
  let hash = auth::hash_password(&registration.password)?;

  let user = state
    .store
    .create_user(registration.into_new_user(hash))
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user_id = %user.user_id, username = %user.username, "registered user");

  let view = project_user(&state, &ViewerState::anonymous(), &user);
  Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /users/`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  user: OptionalUser,
  params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<UserView>>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Query(params) = params?;
  let req = page_request(&state.config, params.page, params.limit)?;
  let found = state.store.list_users(req).await.map_err(ApiError::store)?;
  ensure_in_range(&found, req)?;

  let author_ids = found.results.iter().map(|u| u.user_id).collect();
  let flags = viewer_state(state.store.as_ref(), user.viewer(), vec![], author_ids).await?;
  Ok(Json(found.map(|u| project_user(&state, &flags, &u))))
}

/// `GET /users/{id}/`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  user: OptionalUser,
  Path(id): Path<Uuid>,
) -> Result<Json<UserView>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let found = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| pantry_core::Error::not_found("user", id))?;
  let flags = viewer_state(state.store.as_ref(), user.viewer(), vec![], vec![id]).await?;
  Ok(Json(project_user(&state, &flags, &found)))
}

/// `GET /users/me/`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
) -> Json<UserView>
where
  S: RecipeStore + Clone + 'static,
{
  Json(project_user(&state, &ViewerState::anonymous(), &user))
}

#[derive(Debug, Default, Deserialize)]
pub struct SetPasswordPayload {
  pub new_password:     Option<String>,
  pub current_password: Option<String>,
}

/// `POST /users/set_password/`
pub async fn set_password<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  payload: Result<Json<SetPasswordPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Json(payload) = payload?;
  let new_password = validate_password("new_password", payload.new_password)?;
  let current = payload
    .current_password
    .ok_or(ValidationError::Missing { field: "current_password" })?;

  let (_, hash) = state
    .store
    .credentials(&user.username)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| pantry_core::Error::not_found("user", user.user_id))?;
  if !auth::verify_password(&current, &hash) {
    return Err(ValidationError::WrongPassword.into());
  }

  let hash = auth::hash_password(&new_password)?;
  state
    .store
    .set_password_hash(user.user_id, hash)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user_id = %user.user_id, "changed password");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
  pub recipes_limit: Option<u64>,
}

/// `POST /users/{id}/subscribe/`
pub async fn subscribe<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(author_id): Path<Uuid>,
  params: Result<Query<SubscribeParams>, QueryRejection>,
) -> Result<(StatusCode, Json<SubscriptionView>), ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Query(params) = params?;
  let author = state
    .store
    .subscribe(user.user_id, author_id)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(subscriber = %user.user_id, %author_id, "subscribed");

  let mut recipes = state
    .store
    .author_recipes(vec![author_id], params.recipes_limit)
    .await
    .map_err(ApiError::store)?;
  let flags = ViewerState { subscribed: HashSet::from([author_id]), ..Default::default() };
  let view = Projector::new(&state.config.media_url, &flags)
    .subscription(&author, recipes.remove(&author_id).unwrap_or_default());
  Ok((StatusCode::CREATED, Json(view)))
}

/// `DELETE /users/{id}/subscribe/`
pub async fn unsubscribe<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(author_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  state
    .store
    .unsubscribe(user.user_id, author_id)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(subscriber = %user.user_id, %author_id, "unsubscribed");
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/subscriptions/`
pub async fn subscriptions<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<SubscriptionView>>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Query(params) = params?;
  let req = page_request(&state.config, params.page, params.limit)?;
  let found = state
    .store
    .list_subscriptions(user.user_id, req)
    .await
    .map_err(ApiError::store)?;
  ensure_in_range(&found, req)?;

  let author_ids: Vec<Uuid> = found.results.iter().map(|u| u.user_id).collect();
  let mut recipes = state
    .store
    .author_recipes(author_ids.clone(), params.recipes_limit)
    .await
    .map_err(ApiError::store)?;

  // Every listed author is, by construction, one the viewer follows.
  let flags = ViewerState { subscribed: author_ids.into_iter().collect(), ..Default::default() };
  let projector = Projector::new(&state.config.media_url, &flags);
  Ok(Json(found.map(|author| {
    let own = recipes.remove(&author.user_id).unwrap_or_default();
    projector.subscription(&author, own)
  })))
}
