//! View projection: stored entities → viewer-specific response shapes.
//!
//! Projection is pure. The per-viewer flags for a whole batch of recipes are
//! fetched up front into a [`ViewerState`] (one store call per page, not per
//! recipe) and then applied here.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  catalog::Tag,
  recipe::{AuthorRecipes, RecipeAggregate, RecipeSummary},
  user::User,
};

// ─── Viewer state ────────────────────────────────────────────────────────────

/// Which of a batch of recipes / authors the viewer has favorited, put in the
/// cart, or subscribed to. Empty for an anonymous viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerState {
  pub favorited:  HashSet<Uuid>,
  pub in_cart:    HashSet<Uuid>,
  pub subscribed: HashSet<Uuid>,
}

impl ViewerState {
  pub fn anonymous() -> Self { Self::default() }
}

// ─── Response shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
  pub email:         String,
  pub id:            Uuid,
  pub username:      String,
  pub first_name:    String,
  pub last_name:     String,
  pub is_subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientLineView {
  pub id:               Uuid,
  pub name:             String,
  pub measurement_unit: String,
  pub amount:           u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeView {
  pub id:                  Uuid,
  pub tags:                Vec<Tag>,
  pub author:              UserView,
  pub ingredients:         Vec<IngredientLineView>,
  pub is_favorited:        bool,
  pub is_in_shopping_cart: bool,
  pub name:                String,
  pub image:               String,
  pub text:                String,
  pub cooking_time:        u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortRecipeView {
  pub id:           Uuid,
  pub name:         String,
  pub image:        String,
  pub cooking_time: u32,
}

/// An author as listed under the viewer's subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
  #[serde(flatten)]
  pub author:        UserView,
  pub recipes:       Vec<ShortRecipeView>,
  pub recipes_count: u64,
}

// ─── Projector ───────────────────────────────────────────────────────────────

/// Applies a [`ViewerState`] and the public media URL to stored entities.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
  media_url: &'a str,
  state:     &'a ViewerState,
}

impl<'a> Projector<'a> {
  pub fn new(media_url: &'a str, state: &'a ViewerState) -> Self {
    Self { media_url, state }
  }

  /// Public URL of an image stored at `path` under the media root.
  pub fn image_url(&self, path: &str) -> String {
    format!(
      "{}/{}",
      self.media_url.trim_end_matches('/'),
      path.trim_start_matches('/')
    )
  }

  pub fn user(&self, user: &User) -> UserView {
    UserView {
      email:         user.email.clone(),
      id:            user.user_id,
      username:      user.username.clone(),
      first_name:    user.first_name.clone(),
      last_name:     user.last_name.clone(),
      is_subscribed: self.state.subscribed.contains(&user.user_id),
    }
  }

  pub fn recipe(&self, agg: RecipeAggregate) -> RecipeView {
    let id = agg.recipe.recipe_id;
    RecipeView {
      id,
      author: self.user(&agg.author),
      tags: agg.tags,
      ingredients: agg
        .ingredients
        .into_iter()
        .map(|line| IngredientLineView {
          id:               line.ingredient.ingredient_id,
          name:             line.ingredient.name,
          measurement_unit: line.ingredient.measurement_unit,
          amount:           line.amount,
        })
        .collect(),
      is_favorited: self.state.favorited.contains(&id),
      is_in_shopping_cart: self.state.in_cart.contains(&id),
      image: self.image_url(&agg.recipe.image),
      name: agg.recipe.name,
      text: agg.recipe.text,
      cooking_time: agg.recipe.cooking_time,
    }
  }

  pub fn short(&self, summary: RecipeSummary) -> ShortRecipeView {
    ShortRecipeView {
      id:           summary.recipe_id,
      image:        self.image_url(&summary.image),
      name:         summary.name,
      cooking_time: summary.cooking_time,
    }
  }

  pub fn subscription(&self, author: &User, recipes: AuthorRecipes) -> SubscriptionView {
    SubscriptionView {
      author:        self.user(author),
      recipes:       recipes.recipes.into_iter().map(|r| self.short(r)).collect(),
      recipes_count: recipes.count,
    }
  }
}
