//! The recipe aggregate: a recipe, its tags and its ingredient lines.
//!
//! The aggregate is always read and written as a unit. Line items and tag
//! links have no identity of their own; an update replaces both sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  catalog::{Ingredient, Tag},
  user::User,
};

/// The scalar part of a stored recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
  pub recipe_id:    Uuid,
  pub author_id:    Uuid,
  pub name:         String,
  /// Path of the image relative to the media root.
  pub image:        String,
  pub text:         String,
  /// Minutes; always at least 1.
  pub cooking_time: u32,
  pub created_at:   DateTime<Utc>,
}

/// One ingredient of a recipe together with its amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientLine {
  pub ingredient: Ingredient,
  pub amount:     u32,
}

/// A recipe with everything a full view needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeAggregate {
  pub recipe:      Recipe,
  pub author:      User,
  pub tags:        Vec<Tag>,
  pub ingredients: Vec<IngredientLine>,
}

/// The fields shown wherever a recipe is only referenced (favorites, cart,
/// an author's recipe list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSummary {
  pub recipe_id:    Uuid,
  pub name:         String,
  pub image:        String,
  pub cooking_time: u32,
}

impl From<&Recipe> for RecipeSummary {
  fn from(r: &Recipe) -> Self {
    Self {
      recipe_id:    r.recipe_id,
      name:         r.name.clone(),
      image:        r.image.clone(),
      cooking_time: r.cooking_time,
    }
  }
}

/// An ingredient reference with the amount requested for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
  pub ingredient_id: Uuid,
  pub amount:        u32,
}

/// Input to the store's recipe writes, produced by
/// [`crate::compose::ValidRecipe::into_new_recipe`].
///
/// Ingredient and tag references have been checked for duplicates but not
/// for existence; the store does that inside its write transaction.
#[derive(Debug, Clone)]
pub struct NewRecipe {
  pub name:         String,
  pub text:         String,
  pub cooking_time: u32,
  /// `None` on update keeps the stored image.
  pub image:        Option<String>,
  pub ingredients:  Vec<IngredientAmount>,
  pub tags:         Vec<Uuid>,
}

/// An author's most recent recipes plus the total number they have published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorRecipes {
  pub recipes: Vec<RecipeSummary>,
  pub count:   u64,
}
