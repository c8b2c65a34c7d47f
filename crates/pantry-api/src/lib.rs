//! JSON REST API for Pantry.
//!
//! Exposes an axum [`Router`] backed by any [`RecipeStore`]: recipes and
//! their favorite / shopping-cart relations, the read-only catalog, user
//! accounts and subscriptions. Uploaded images are served from `/media/`.

pub mod auth;
pub mod catalog;
pub mod error;
pub mod media;
pub mod recipes;
pub mod users;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use pantry_core::{
  page::PageRequest,
  store::RecipeStore,
  user::Viewer,
  view::ViewerState,
};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use media::MediaStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PANTRY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Directory uploaded images are written to.
  pub media_dir:  PathBuf,
  /// Public URL prefix the media directory is served under.
  #[serde(default = "default_media_url")]
  pub media_url:  String,
  /// Default number of results per listing page.
  #[serde(default = "default_page_size")]
  pub page_size:  u64,
}

fn default_media_url() -> String { "/media".to_owned() }

fn default_page_size() -> u64 { 6 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: RecipeStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub media:  Arc<MediaStore>,
}

impl<S: RecipeStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let media = MediaStore::new(config.media_dir.clone());
    Self {
      store:  Arc::new(store),
      config: Arc::new(config),
      media:  Arc::new(media),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: the API under `/api` and uploaded
/// media under `/media`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecipeStore + Clone + 'static,
{
  let media = ServeDir::new(state.media.root());
  Router::new()
    .nest("/api", api_router::<S>())
    .nest_service("/media", media)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn api_router<S>() -> Router<AppState<S>>
where
  S: RecipeStore + Clone + 'static,
{
  Router::new()
    // Recipes
    .route("/recipes/", get(recipes::list::<S>).post(recipes::create::<S>))
    .route(
      "/recipes/download_shopping_cart/",
      get(recipes::download_shopping_cart::<S>),
    )
    .route(
      "/recipes/{id}/",
      get(recipes::get_one::<S>)
        .patch(recipes::update::<S>)
        .delete(recipes::delete::<S>),
    )
    .route(
      "/recipes/{id}/favorite/",
      post(recipes::add_favorite::<S>).delete(recipes::remove_favorite::<S>),
    )
    .route(
      "/recipes/{id}/shopping_cart/",
      post(recipes::add_to_cart::<S>).delete(recipes::remove_from_cart::<S>),
    )
    // Catalog
    .route("/tags/", get(catalog::list_tags::<S>))
    .route("/tags/{id}/", get(catalog::get_tag::<S>))
    .route("/ingredients/", get(catalog::list_ingredients::<S>))
    .route("/ingredients/{id}/", get(catalog::get_ingredient::<S>))
    // Users
    .route("/users/", get(users::list::<S>).post(users::register::<S>))
    .route("/users/me/", get(users::me::<S>))
    .route("/users/set_password/", post(users::set_password::<S>))
    .route("/users/subscriptions/", get(users::subscriptions::<S>))
    .route("/users/{id}/", get(users::get_one::<S>))
    .route(
      "/users/{id}/subscribe/",
      post(users::subscribe::<S>).delete(users::unsubscribe::<S>),
    )
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// `?page=&limit=` (plus `recipes_limit` where subscriptions are listed).
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:          Option<u64>,
  pub limit:         Option<u64>,
  pub recipes_limit: Option<u64>,
}

fn invalid_page() -> ApiError { ApiError::NotFound("invalid page".to_owned()) }

/// Resolve paging parameters against the configured page size.
pub(crate) fn page_request(
  config: &ServerConfig,
  page: Option<u64>,
  limit: Option<u64>,
) -> Result<PageRequest, ApiError> {
  PageRequest::new(page, limit, config.page_size).ok_or_else(invalid_page)
}

/// Fail with 404 when a page past the first comes back empty.
pub(crate) fn ensure_in_range<T>(
  page: &pantry_core::page::Page<T>,
  req: PageRequest,
) -> Result<(), ApiError> {
  if page.is_out_of_range(req) {
    return Err(invalid_page());
  }
  Ok(())
}

/// Per-viewer flags for a batch of recipes and authors. Anonymous viewers
/// get the empty state without touching the store.
pub(crate) async fn viewer_state<S: RecipeStore>(
  store: &S,
  viewer: Viewer,
  recipe_ids: Vec<Uuid>,
  author_ids: Vec<Uuid>,
) -> Result<ViewerState, ApiError> {
  match viewer.user_id() {
    None => Ok(ViewerState::anonymous()),
    Some(user_id) => store
      .viewer_state(user_id, recipe_ids, author_ids)
      .await
      .map_err(ApiError::store),
  }
}
