//! User-to-recipe relation rows (favorites and the shopping cart).
//!
//! Both relations have the same shape, `(user, recipe)` unique per pair, so
//! one set of store operations serves both, keyed by [`RelationKind`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationKind {
  Favorite,
  ShoppingCart,
}

impl RelationKind {
  /// Human-readable name of the collection, used in error messages.
  pub fn collection(self) -> &'static str {
    match self {
      Self::Favorite => "favorites",
      Self::ShoppingCart => "shopping cart",
    }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn discriminants_are_snake_case() {
    assert_eq!(RelationKind::ShoppingCart.as_ref(), "shopping_cart");
    assert_eq!(RelationKind::Favorite.to_string(), "favorite");
    assert_eq!(
      RelationKind::from_str("shopping_cart").unwrap(),
      RelationKind::ShoppingCart
    );
  }
}
