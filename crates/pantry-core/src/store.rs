//! The `RecipeStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `pantry-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::{collections::HashMap, future::Future};

use uuid::Uuid;

use crate::{
  DomainError,
  catalog::{CatalogSeed, Ingredient, SeedReport, Tag},
  page::{Page, PageRequest},
  recipe::{AuthorRecipes, NewRecipe, RecipeAggregate, RecipeSummary},
  relation::RelationKind,
  shopping::CartLine,
  user::{NewUser, User},
  view::ViewerState,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Filters for [`RecipeStore::list_recipes`].
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
  /// Substring match against the author's id.
  pub author:              Option<String>,
  /// Tag slugs; a recipe matches if it carries any of them.
  pub tags:                Vec<String>,
  /// Only recipes this user has favorited.
  pub favorited_by:        Option<Uuid>,
  /// Only recipes in this user's shopping cart.
  pub in_shopping_cart_of: Option<Uuid>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Pantry store backend.
///
/// Domain rules that depend on stored state (existence, ownership,
/// uniqueness) are enforced here and surface as [`crate::Error`] values,
/// recoverable through [`DomainError`]. Multi-row writes are atomic.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecipeStore: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Register a user. Fails with `Conflict` if the username or email is
  /// taken.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<User>, Self::Error>> + Send + '_;

  /// The user with this username and their argon2 password hash.
  fn credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<(User, String)>, Self::Error>> + Send + 'a;

  fn set_password_hash(
    &self,
    user_id: Uuid,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Catalog ───────────────────────────────────────────────────────────

  /// All tags, ordered by name.
  fn list_tags(
    &self,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  fn get_tag(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Tag>, Self::Error>> + Send + '_;

  /// Ingredients whose name starts with `prefix` (case-insensitive), ordered
  /// by name. `None` lists the whole catalog.
  fn list_ingredients(
    &self,
    prefix: Option<String>,
  ) -> impl Future<Output = Result<Vec<Ingredient>, Self::Error>> + Send + '_;

  fn get_ingredient(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Ingredient>, Self::Error>> + Send + '_;

  /// Insert catalog rows, skipping any that already exist.
  fn seed_catalog(
    &self,
    seed: CatalogSeed,
  ) -> impl Future<Output = Result<SeedReport, Self::Error>> + Send + '_;

  // ── Recipes ───────────────────────────────────────────────────────────

  /// Persist a new recipe authored by `author_id`.
  ///
  /// Fails with `UnknownIngredient` / `UnknownTag` if a reference does not
  /// exist; nothing is written in that case.
  fn create_recipe(
    &self,
    author_id: Uuid,
    input: NewRecipe,
  ) -> impl Future<Output = Result<RecipeAggregate, Self::Error>> + Send + '_;

  /// Replace a recipe's fields, tag set and ingredient lines in one
  /// transaction.
  ///
  /// Fails with `NotFound` if the recipe does not exist, `Forbidden` if
  /// `editor_id` is not its author, and `UnknownIngredient` / `UnknownTag`
  /// for bad references. On failure the stored recipe is unchanged.
  fn update_recipe(
    &self,
    recipe_id: Uuid,
    editor_id: Uuid,
    input: NewRecipe,
  ) -> impl Future<Output = Result<RecipeAggregate, Self::Error>> + Send + '_;

  /// Delete a recipe together with its lines, tag links and relation rows.
  fn delete_recipe(
    &self,
    recipe_id: Uuid,
    editor_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_recipe(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RecipeAggregate>, Self::Error>> + Send + '_;

  /// Recipes matching `query`, newest first.
  ///
  /// Fails with `UnknownTagSlug` if a slug in `query.tags` names no tag.
  fn list_recipes<'a>(
    &'a self,
    query: &'a RecipeQuery,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<RecipeAggregate>, Self::Error>> + Send + 'a;

  /// For each author, their newest recipes (at most `limit`, unlimited when
  /// `None`) and their total recipe count. Authors without recipes map to
  /// an empty [`AuthorRecipes`].
  fn author_recipes(
    &self,
    author_ids: Vec<Uuid>,
    limit: Option<u64>,
  ) -> impl Future<Output = Result<HashMap<Uuid, AuthorRecipes>, Self::Error>> + Send + '_;

  // ── Relations ─────────────────────────────────────────────────────────

  /// Add `recipe_id` to the user's favorites or cart.
  ///
  /// Fails with `NotFound` if the recipe does not exist and `Conflict` if the
  /// row already exists.
  fn add_relation(
    &self,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
  ) -> impl Future<Output = Result<RecipeSummary, Self::Error>> + Send + '_;

  /// Fails with `NotFound` if the recipe does not exist and `AlreadyRemoved`
  /// if there is no such row.
  fn remove_relation(
    &self,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Every ingredient line of every recipe in the user's cart.
  fn cart_lines(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CartLine>, Self::Error>> + Send + '_;

  // ── Subscriptions ─────────────────────────────────────────────────────

  /// Fails with `NotFound` if the author does not exist, `SelfSubscribe` if
  /// both ids are equal and `Conflict` if already subscribed. Returns the
  /// author.
  fn subscribe(
    &self,
    subscriber_id: Uuid,
    author_id: Uuid,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Fails with `NotFound` if the author does not exist and `AlreadyRemoved`
  /// if not subscribed.
  fn unsubscribe(
    &self,
    subscriber_id: Uuid,
    author_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Authors the subscriber follows, ordered by username.
  fn list_subscriptions(
    &self,
    subscriber_id: Uuid,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<User>, Self::Error>> + Send + '_;

  // ── Viewer state ──────────────────────────────────────────────────────

  /// Which of `recipe_ids` the user has favorited / put in the cart, and
  /// which of `author_ids` they are subscribed to.
  fn viewer_state(
    &self,
    user_id: Uuid,
    recipe_ids: Vec<Uuid>,
    author_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<ViewerState, Self::Error>> + Send + '_;
}
