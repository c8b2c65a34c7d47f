//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix), so lexical order is chronological order. UUIDs are stored as
//! hyphenated lowercase strings.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use pantry_core::{
  catalog::{Ingredient, Tag},
  recipe::{IngredientLine, Recipe, RecipeAggregate, RecipeSummary},
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Integers ────────────────────────────────────────────────────────────────

pub fn decode_u32(column: &'static str, v: i64) -> Result<u32> {
  u32::try_from(v).map_err(|_| Error::OutOfRange(column))
}

pub fn decode_u64(column: &'static str, v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::OutOfRange(column))
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser::from_row`], for a `users` table aliased `u`.
pub const USER_COLUMNS: &str =
  "u.user_id, u.email, u.username, u.first_name, u.last_name, u.created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub email:      String,
  pub username:   String,
  pub first_name: String,
  pub last_name:  String,
  pub created_at: String,
}

impl RawUser {
  /// Read the six [`USER_COLUMNS`] starting at column `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(at)?,
      email:      row.get(at + 1)?,
      username:   row.get(at + 2)?,
      first_name: row.get(at + 3)?,
      last_name:  row.get(at + 4)?,
      created_at: row.get(at + 5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      email:      self.email,
      username:   self.username,
      first_name: self.first_name,
      last_name:  self.last_name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const TAG_COLUMNS: &str = "t.tag_id, t.name, t.color, t.slug";

pub struct RawTag {
  pub tag_id: String,
  pub name:   String,
  pub color:  String,
  pub slug:   String,
}

impl RawTag {
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      tag_id: row.get(at)?,
      name:   row.get(at + 1)?,
      color:  row.get(at + 2)?,
      slug:   row.get(at + 3)?,
    })
  }

  pub fn into_tag(self) -> Result<Tag> {
    Ok(Tag {
      tag_id: decode_uuid(&self.tag_id)?,
      name:   self.name,
      color:  self.color,
      slug:   self.slug,
    })
  }
}

pub const INGREDIENT_COLUMNS: &str = "i.ingredient_id, i.name, i.measurement_unit";

pub struct RawIngredient {
  pub ingredient_id:    String,
  pub name:             String,
  pub measurement_unit: String,
}

impl RawIngredient {
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      ingredient_id:    row.get(at)?,
      name:             row.get(at + 1)?,
      measurement_unit: row.get(at + 2)?,
    })
  }

  pub fn into_ingredient(self) -> Result<Ingredient> {
    Ok(Ingredient {
      ingredient_id:    decode_uuid(&self.ingredient_id)?,
      name:             self.name,
      measurement_unit: self.measurement_unit,
    })
  }
}

/// Column list matching [`RawRecipe::from_row`], for a `recipes` table
/// aliased `r` joined with its author as `u`.
pub const RECIPE_COLUMNS: &str = "r.recipe_id, r.author_id, r.name, r.image, r.text, \
   r.cooking_time, r.created_at, u.user_id, u.email, u.username, u.first_name, \
   u.last_name, u.created_at";

/// A `recipes` row joined with its author.
pub struct RawRecipe {
  pub recipe_id:    String,
  pub author_id:    String,
  pub name:         String,
  pub image:        String,
  pub text:         String,
  pub cooking_time: i64,
  pub created_at:   String,
  pub author:       RawUser,
}

impl RawRecipe {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      recipe_id:    row.get(0)?,
      author_id:    row.get(1)?,
      name:         row.get(2)?,
      image:        row.get(3)?,
      text:         row.get(4)?,
      cooking_time: row.get(5)?,
      created_at:   row.get(6)?,
      author:       RawUser::from_row(row, 7)?,
    })
  }

  pub fn into_parts(self) -> Result<(Recipe, User)> {
    let recipe = Recipe {
      recipe_id:    decode_uuid(&self.recipe_id)?,
      author_id:    decode_uuid(&self.author_id)?,
      name:         self.name,
      image:        self.image,
      text:         self.text,
      cooking_time: decode_u32("cooking_time", self.cooking_time)?,
      created_at:   decode_dt(&self.created_at)?,
    };
    Ok((recipe, self.author.into_user()?))
  }
}

/// A `recipe_ingredients` row joined with the catalog.
pub struct RawLine {
  pub recipe_id:  String,
  pub ingredient: RawIngredient,
  pub amount:     i64,
}

impl RawLine {
  pub fn into_line(self) -> Result<(Uuid, IngredientLine)> {
    Ok((decode_uuid(&self.recipe_id)?, IngredientLine {
      ingredient: self.ingredient.into_ingredient()?,
      amount:     decode_u32("amount", self.amount)?,
    }))
  }
}

/// The columns of a short recipe listing.
pub struct RawSummary {
  pub recipe_id:    String,
  pub name:         String,
  pub image:        String,
  pub cooking_time: i64,
}

impl RawSummary {
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      recipe_id:    row.get(at)?,
      name:         row.get(at + 1)?,
      image:        row.get(at + 2)?,
      cooking_time: row.get(at + 3)?,
    })
  }

  pub fn into_summary(self) -> Result<RecipeSummary> {
    Ok(RecipeSummary {
      recipe_id:    decode_uuid(&self.recipe_id)?,
      name:         self.name,
      image:        self.image,
      cooking_time: decode_u32("cooking_time", self.cooking_time)?,
    })
  }
}

/// Recipes plus the tag and ingredient rows for all of them, as read by one
/// batch of queries.
#[derive(Default)]
pub struct RawAggregateSet {
  pub recipes: Vec<RawRecipe>,
  pub lines:   Vec<RawLine>,
  /// `(recipe_id, tag)` pairs.
  pub tags:    Vec<(String, RawTag)>,
}

impl RawAggregateSet {
  /// Assemble aggregates in the order the recipes were read.
  pub fn into_aggregates(self) -> Result<Vec<RecipeAggregate>> {
    let mut lines: HashMap<Uuid, Vec<IngredientLine>> = HashMap::new();
    for raw in self.lines {
      let (recipe_id, line) = raw.into_line()?;
      lines.entry(recipe_id).or_default().push(line);
    }

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for (recipe_id, raw) in self.tags {
      tags.entry(decode_uuid(&recipe_id)?).or_default().push(raw.into_tag()?);
    }

    self
      .recipes
      .into_iter()
      .map(|raw| {
        let (recipe, author) = raw.into_parts()?;
        let id = recipe.recipe_id;
        Ok(RecipeAggregate {
          recipe,
          author,
          tags: tags.remove(&id).unwrap_or_default(),
          ingredients: lines.remove(&id).unwrap_or_default(),
        })
      })
      .collect()
  }
}
