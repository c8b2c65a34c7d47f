//! Read-only handlers for `/tags` and `/ingredients`.
//!
//! Neither listing is paginated; the catalog is small and seeded by the
//! operator.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use pantry_core::{
  catalog::{Ingredient, Tag},
  store::RecipeStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /tags/`
pub async fn list_tags<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Tag>>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let tags = state.store.list_tags().await.map_err(ApiError::store)?;
  Ok(Json(tags))
}

/// `GET /tags/{id}/`
pub async fn get_tag<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Tag>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let tag = state
    .store
    .get_tag(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| pantry_core::Error::not_found("tag", id))?;
  Ok(Json(tag))
}

#[derive(Debug, Deserialize)]
pub struct IngredientParams {
  /// Case-insensitive name prefix.
  pub name: Option<String>,
}

/// `GET /ingredients/[?name=<prefix>]`
pub async fn list_ingredients<S>(
  State(state): State<AppState<S>>,
  params: Result<Query<IngredientParams>, QueryRejection>,
) -> Result<Json<Vec<Ingredient>>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let Query(params) = params?;
  let prefix = params.name.filter(|n| !n.is_empty());
  let ingredients = state
    .store
    .list_ingredients(prefix)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ingredients))
}

/// `GET /ingredients/{id}/`
pub async fn get_ingredient<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Ingredient>, ApiError>
where
  S: RecipeStore + Clone + 'static,
{
  let ingredient = state
    .store
    .get_ingredient(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| pantry_core::Error::not_found("ingredient", id))?;
  Ok(Json(ingredient))
}
