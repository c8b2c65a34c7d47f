//! Handlers for `/recipes` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/recipes/` | `?page&limit&author&tags&is_favorited&is_in_shopping_cart` |
//! | `POST` | `/recipes/` | Auth; body: [`RecipePayload`] |
//! | `GET`  | `/recipes/{id}/` | 404 if not found |
//! | `PATCH` | `/recipes/{id}/` | Author only; replaces lines and tags |
//! | `DELETE` | `/recipes/{id}/` | Author only |
//! | `POST`/`DELETE` | `/recipes/{id}/favorite/` | Auth |
//! | `POST`/`DELETE` | `/recipes/{id}/shopping_cart/` | Auth |
//! | `GET`  | `/recipes/download_shopping_cart/` | Auth; `text/plain` attachment |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::{StatusCode, header},
  response::IntoResponse,
};
use pantry_core::{
  compose::{Mode, RecipePayload, ValidRecipe},
  page::Page,
  recipe::RecipeAggregate,
  relation::RelationKind,
  shopping::{self, SHOPPING_LIST_FILENAME},
  store::{RecipeQuery, RecipeStore},
  user::Viewer,
  view::{Projector, RecipeView, ShortRecipeView},
};
use uuid::Uuid;

use crate::{
  AppState, ensure_in_range,
  auth::{Authenticated, OptionalUser},
  error::ApiError,
  media::SavedImage,
  page_request, viewer_state,
};

// ─── Query parsing ───────────────────────────────────────────────────────────

/// Parsed query string of `GET /recipes/`.
///
/// Read from raw pairs because `tags` may be repeated.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListParams {
  pub page:                Option<u64>,
  pub limit:               Option<u64>,
  pub author:              Option<String>,
  pub tags:                Vec<String>,
  pub is_favorited:        bool,
  pub is_in_shopping_cart: bool,
}

impl ListParams {
  pub fn parse(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
    let mut params = Self::default();
    for (key, value) in pairs {
      match key.as_str() {
        "page" => params.page = Some(parse_number("page", &value)?),
        "limit" => params.limit = Some(parse_number("limit", &value)?),
        "author" => params.author = Some(value),
        "tags" => params.tags.extend(
          value
            .split(',')
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_owned),
        ),
        "is_favorited" => params.is_favorited = parse_flag("is_favorited", &value)?,
        "is_in_shopping_cart" => {
          params.is_in_shopping_cart = parse_flag("is_in_shopping_cart", &value)?
        }
        _ => {}
      }
    }
    Ok(params)
  }

  /// Store query for `viewer`. The relation filters only apply to an
  /// authenticated viewer.
  fn query(self, viewer: Viewer) -> RecipeQuery {
    let user_id = viewer.user_id();
    RecipeQuery {
      author:              self.author,
      tags:                self.tags,
      favorited_by:        user_id.filter(|_| self.is_favorited),
      in_shopping_cart_of: user_id.filter(|_| self.is_in_shopping_cart),
    }
  }
}

fn parse_number(field: &'static str, value: &str) -> Result<u64, ApiError> {
  value.parse().map_err(|_| ApiError::BadRequest {
    message: format!("{field} must be a non-negative integer"),
    field:   Some(field),
  })
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, ApiError> {
  match value {
    "1" | "true" => Ok(true),
    "0" | "false" => Ok(false),
    _ => Err(ApiError::BadRequest {
      message: format!("{field} must be 0, 1, true or false"),
      field:   Some(field),
    }),
  }
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Project a batch of aggregates with one viewer-state lookup.
async fn project<S: RecipeStore>(
  state: &AppState<S>,
  viewer: Viewer,
  aggregates: Vec<RecipeAggregate>,
) -> Result<Vec<RecipeView>, ApiError> {
  let recipe_ids = aggregates.iter().map(|a| a.recipe.recipe_id).collect();
  let author_ids = aggregates.iter().map(|a| a.author.user_id).collect();
  let flags = viewer_state(state.store.as_ref(), viewer, recipe_ids, author_ids).await?;
  let projector = Projector::new(&state.config.media_url, &flags);
  Ok(aggregates.into_iter().map(|a| projector.recipe(a)).collect())
}

async fn project_one<S: RecipeStore>(
  state: &AppState<S>,
  viewer: Viewer,
  aggregate: RecipeAggregate,
) -> Result<RecipeView, ApiError> {
  project(state, viewer, vec![aggregate])
    .await?
    .pop()
    .ok_or_else(|| ApiError::Internal("projection dropped a recipe".into()))
}

/// Store the uploaded image, if any.
async fn save_image<S: RecipeStore>(
  state: &AppState<S>,
  recipe: &ValidRecipe,
) -> Result<Option<SavedImage>, ApiError> {
  match &recipe.image {
    Some(image) => Ok(Some(state.media.save(image).await?)),
    None => Ok(None),
  }
}

/// Pass a store write through, removing the image saved for it if the
/// write was rejected.
async fn discard_image_on_error<S: RecipeStore, T>(
  state: &AppState<S>,
  image: Option<&SavedImage>,
  written: Result<T, S::Error>,
) -> Result<T, ApiError> {
  match written {
    Ok(value) => Ok(value),
    Err(e) => {
      if let Some(image) = image {
        state.media.discard(image).await;
      }
      Err(ApiError::store(e))
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /recipes/`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  user: OptionalUser,
  pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Page<RecipeView>>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Query(pairs) = pairs?;
  let params = ListParams::parse(pairs)?;
  let req = page_request(&state.config, params.page, params.limit)?;
  let viewer = user.viewer();
  let query = params.query(viewer);

  let found = state
    .store
    .list_recipes(&query, req)
    .await
    .map_err(ApiError::store)?;
  ensure_in_range(&found, req)?;

  let Page { count, next, previous, results } = found;
  let results = project(&state, viewer, results).await?;
  Ok(Json(Page { count, next, previous, results }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /recipes/`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  payload: Result<Json<RecipePayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Json(payload) = payload?;
  let valid = payload.validate(Mode::Create)?;
  let image = save_image(&state, &valid).await?;
  let path = image.as_ref().map(|i| i.path.clone());

  let written = state.store.create_recipe(user.user_id, valid.into_new_recipe(path)).await;
  let aggregate = discard_image_on_error(&state, image.as_ref(), written).await?;
  tracing::info!(
    recipe_id = %aggregate.recipe.recipe_id,
    author = %user.username,
    "created recipe"
  );

  let view = project_one(&state, Viewer::User(user.user_id), aggregate).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /recipes/{id}/`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  user: OptionalUser,
  Path(id): Path<Uuid>,
) -> Result<Json<RecipeView>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let aggregate = state
    .store
    .get_recipe(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| pantry_core::Error::not_found("recipe", id))?;
  Ok(Json(project_one(&state, user.viewer(), aggregate).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /recipes/{id}/`
///
/// Ownership is checked before the payload is validated, so a stranger gets
/// 403 whatever they send.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<Uuid>,
  payload: Result<Json<RecipePayload>, JsonRejection>,
) -> Result<Json<RecipeView>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let existing = state
    .store
    .get_recipe(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| pantry_core::Error::not_found("recipe", id))?;
  if existing.recipe.author_id != user.user_id {
    return Err(pantry_core::Error::Forbidden.into());
  }

  let Json(payload) = payload?;
  let valid = payload.validate(Mode::Update)?;
  let image = save_image(&state, &valid).await?;
  let path = image.as_ref().map(|i| i.path.clone());

  let written = state.store.update_recipe(id, user.user_id, valid.into_new_recipe(path)).await;
  let aggregate = discard_image_on_error(&state, image.as_ref(), written).await?;
  tracing::info!(recipe_id = %id, "updated recipe");

  Ok(Json(project_one(&state, Viewer::User(user.user_id), aggregate).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /recipes/{id}/`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  state
    .store
    .delete_recipe(id, user.user_id)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(recipe_id = %id, "deleted recipe");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Favorites / shopping cart ───────────────────────────────────────────────

async fn add_relation<S: RecipeStore>(
  state: &AppState<S>,
  kind: RelationKind,
  user_id: Uuid,
  recipe_id: Uuid,
) -> Result<(StatusCode, Json<ShortRecipeView>), ApiError> {
  let summary = state
    .store
    .add_relation(kind, user_id, recipe_id)
    .await
    .map_err(ApiError::store)?;
  let flags = pantry_core::view::ViewerState::anonymous();
  let view = Projector::new(&state.config.media_url, &flags).short(summary);
  Ok((StatusCode::CREATED, Json(view)))
}

async fn remove_relation<S: RecipeStore>(
  state: &AppState<S>,
  kind: RelationKind,
  user_id: Uuid,
  recipe_id: Uuid,
) -> Result<StatusCode, ApiError> {
  state
    .store
    .remove_relation(kind, user_id, recipe_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /recipes/{id}/favorite/`
pub async fn add_favorite<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ShortRecipeView>), ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  add_relation(&state, RelationKind::Favorite, user.user_id, id).await
}

/// `DELETE /recipes/{id}/favorite/`
pub async fn remove_favorite<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  remove_relation(&state, RelationKind::Favorite, user.user_id, id).await
}

/// `POST /recipes/{id}/shopping_cart/`
pub async fn add_to_cart<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ShortRecipeView>), ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  add_relation(&state, RelationKind::ShoppingCart, user.user_id, id).await
}

/// `DELETE /recipes/{id}/shopping_cart/`
pub async fn remove_from_cart<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  remove_relation(&state, RelationKind::ShoppingCart, user.user_id, id).await
}

// ─── Shopping list ───────────────────────────────────────────────────────────

/// `GET /recipes/download_shopping_cart/`
pub async fn download_shopping_cart<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let lines = state
    .store
    .cart_lines(user.user_id)
    .await
    .map_err(ApiError::store)?;
  let body = shopping::render(&shopping::aggregate(lines));

  let headers = [
    (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
    (
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    ),
  ];
  Ok((headers, body))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn tags_may_repeat_or_be_comma_separated() {
    let params =
      ListParams::parse(pairs(&[("tags", "breakfast,lunch"), ("tags", "dinner")])).unwrap();
    assert_eq!(params.tags, ["breakfast", "lunch", "dinner"]);
  }

  #[test]
  fn flags_accept_numbers_and_words() {
    let params = ListParams::parse(pairs(&[
      ("is_favorited", "1"),
      ("is_in_shopping_cart", "false"),
    ]))
    .unwrap();
    assert!(params.is_favorited);
    assert!(!params.is_in_shopping_cart);
    assert!(ListParams::parse(pairs(&[("is_favorited", "yes")])).is_err());
  }

  #[test]
  fn relation_filters_ignored_for_anonymous_viewer() {
    let params = ListParams {
      is_favorited: true,
      is_in_shopping_cart: true,
      ..Default::default()
    };
    let query = params.query(Viewer::Anonymous);
    assert!(query.favorited_by.is_none());
    assert!(query.in_shopping_cart_of.is_none());

    let id = Uuid::from_u128(5);
    let params = ListParams { is_favorited: true, ..Default::default() };
    let query = params.query(Viewer::User(id));
    assert_eq!(query.favorited_by, Some(id));
    assert!(query.in_shopping_cart_of.is_none());
  }

  #[test]
  fn paging_numbers_must_parse() {
    let params = ListParams::parse(pairs(&[("page", "2"), ("limit", "3")])).unwrap();
    assert_eq!((params.page, params.limit), (Some(2), Some(3)));
    assert!(ListParams::parse(pairs(&[("page", "-1")])).is_err());
  }
}
