//! Catalog reference data: tags and ingredients.
//!
//! Clients only ever read the catalog. Rows are created by the operator's
//! `seed` command from a [`CatalogSeed`] file.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// A label recipes are grouped by (e.g. "breakfast").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  #[serde(rename = "id")]
  pub tag_id: Uuid,
  pub name:   String,
  /// Hex colour, `#RRGGBB`.
  pub color:  String,
  pub slug:   String,
}

/// An ingredient together with the unit its amounts are measured in.
/// Unique on `(name, measurement_unit)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
  #[serde(rename = "id")]
  pub ingredient_id:    Uuid,
  pub name:             String,
  pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
  pub name:  String,
  #[serde(default = "default_color")]
  pub color: String,
  pub slug:  String,
}

fn default_color() -> String { "#FF0000".to_owned() }

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
  pub name:             String,
  pub measurement_unit: String,
}

/// The on-disk format accepted by the `seed` command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSeed {
  #[serde(default)]
  pub tags:        Vec<NewTag>,
  #[serde(default)]
  pub ingredients: Vec<NewIngredient>,
}

impl CatalogSeed {
  pub fn from_json(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }
}

/// How many catalog rows a seed run actually inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
  pub tags:        usize,
  pub ingredients: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seed_file_defaults_missing_sections_and_color() {
    let seed = CatalogSeed::from_json(
      r#"{"tags": [{"name": "Breakfast", "slug": "breakfast"}]}"#,
    )
    .unwrap();
    assert_eq!(seed.tags.len(), 1);
    assert_eq!(seed.tags[0].color, "#FF0000");
    assert!(seed.ingredients.is_empty());
  }

  #[test]
  fn tag_serializes_id_field() {
    let tag = Tag {
      tag_id: Uuid::nil(),
      name:   "Lunch".into(),
      color:  "#00FF00".into(),
      slug:   "lunch".into(),
    };
    let json = serde_json::to_value(&tag).unwrap();
    assert_eq!(json["id"], Uuid::nil().to_string());
    assert_eq!(json["slug"], "lunch");
  }
}
