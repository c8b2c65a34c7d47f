//! Recipe composer: turns a flat client payload into a validated recipe
//! write.
//!
//! Checks that need no database run here, in a fixed order. Existence of the
//! referenced ingredients and tags is checked by the store inside the write
//! transaction, so a concurrent catalog change cannot slip in between.

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ValidationError,
  image::DecodedImage,
  recipe::{IngredientAmount, NewRecipe},
  user::required,
};

pub const MAX_RECIPE_NAME_LEN: usize = 256;

/// One `{id, amount}` entry of the payload's ingredient list.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountInput {
  pub id:     Uuid,
  pub amount: i64,
}

/// JSON body of `POST /recipes/` and `PATCH /recipes/{id}/`.
///
/// Numbers are signed and collections default to empty so that out-of-range
/// and missing values are reported as [`ValidationError`]s.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePayload {
  pub name:         Option<String>,
  pub text:         Option<String>,
  pub cooking_time: Option<i64>,
  /// A `data:image/<ext>;base64,...` URI.
  pub image:        Option<String>,
  #[serde(default)]
  pub ingredients:  Vec<IngredientAmountInput>,
  #[serde(default)]
  pub tags:         Vec<Uuid>,
}

/// Whether the payload creates a recipe or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Create,
  Update,
}

/// A payload that passed every check that needs no database.
#[derive(Debug, Clone)]
pub struct ValidRecipe {
  pub name:         String,
  pub text:         String,
  pub cooking_time: u32,
  /// Always present for [`Mode::Create`].
  pub image:        Option<DecodedImage>,
  pub ingredients:  Vec<IngredientAmount>,
  pub tags:         Vec<Uuid>,
}

impl ValidRecipe {
  /// Attach the stored image path (if an image was uploaded) and hand the
  /// write over to the store.
  pub fn into_new_recipe(self, image_path: Option<String>) -> NewRecipe {
    NewRecipe {
      name:         self.name,
      text:         self.text,
      cooking_time: self.cooking_time,
      image:        image_path,
      ingredients:  self.ingredients,
      tags:         self.tags,
    }
  }
}

impl RecipePayload {
  pub fn validate(self, mode: Mode) -> Result<ValidRecipe, ValidationError> {
    let name = required("name", self.name, MAX_RECIPE_NAME_LEN)?;
    let text = required("text", self.text, usize::MAX)?;

    let cooking_time = self
      .cooking_time
      .ok_or(ValidationError::Missing { field: "cooking_time" })?;
    let cooking_time = u32::try_from(cooking_time)
      .ok()
      .filter(|t| *t >= 1)
      .ok_or(ValidationError::CookingTime(cooking_time))?;

    let ingredients = validate_ingredients(self.ingredients)?;
    let tags = validate_tags(self.tags)?;

    let image = match (self.image, mode) {
      (Some(uri), _) => Some(DecodedImage::from_data_uri(&uri)?),
      (None, Mode::Create) => {
        return Err(ValidationError::Missing { field: "image" });
      }
      (None, Mode::Update) => None,
    };

    Ok(ValidRecipe { name, text, cooking_time, image, ingredients, tags })
  }
}

fn validate_ingredients(
  input: Vec<IngredientAmountInput>,
) -> Result<Vec<IngredientAmount>, ValidationError> {
  if input.is_empty() {
    return Err(ValidationError::NoIngredients);
  }

  let mut seen = HashSet::with_capacity(input.len());
  for item in &input {
    if !seen.insert(item.id) {
      return Err(ValidationError::DuplicateIngredient(item.id));
    }
  }

  input
    .into_iter()
    .map(|item| {
      u32::try_from(item.amount)
        .ok()
        .filter(|a| *a >= 1)
        .map(|amount| IngredientAmount { ingredient_id: item.id, amount })
        .ok_or(ValidationError::Amount { id: item.id, amount: item.amount })
    })
    .collect()
}

fn validate_tags(input: Vec<Uuid>) -> Result<Vec<Uuid>, ValidationError> {
  if input.is_empty() {
    return Err(ValidationError::NoTags);
  }
  let mut seen = HashSet::with_capacity(input.len());
  for id in &input {
    if !seen.insert(*id) {
      return Err(ValidationError::DuplicateTag(*id));
    }
  }
  Ok(input)
}
