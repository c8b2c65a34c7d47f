//! Shopping-list aggregation.
//!
//! The store hands over every ingredient line of every recipe in a user's
//! cart; this module merges lines for the same ingredient and unit, sums
//! their amounts and renders the plain-text download.

use std::collections::BTreeMap;

use serde::Serialize;

/// One ingredient line from a recipe in the cart, already joined with the
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
  pub name:             String,
  pub measurement_unit: String,
  pub amount:           u32,
}

/// A deduplicated entry of the shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
  pub name:             String,
  pub measurement_unit: String,
  pub total_amount:     u64,
}

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// Group `lines` by `(name, measurement_unit)` and sum the amounts.
///
/// Output is sorted by name, then unit, comparing strings ordinally
/// (case-sensitive), so the result does not depend on input order.
pub fn aggregate(
  lines: impl IntoIterator<Item = CartLine>,
) -> Vec<ShoppingListItem> {
  let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();
  for line in lines {
    *totals.entry((line.name, line.measurement_unit)).or_default() +=
      u64::from(line.amount);
  }
  totals
    .into_iter()
    .map(|((name, measurement_unit), total_amount)| ShoppingListItem {
      name,
      measurement_unit,
      total_amount,
    })
    .collect()
}

/// Render the list as the body of `shopping_list.txt`.
pub fn render(items: &[ShoppingListItem]) -> String {
  let mut out = format!("{SHOPPING_LIST_HEADER}\n\n");
  for item in items {
    out.push_str(&format!(
      "{} ({}) - {}\n",
      item.name, item.measurement_unit, item.total_amount
    ));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(name: &str, unit: &str, amount: u32) -> CartLine {
    CartLine {
      name: name.into(),
      measurement_unit: unit.into(),
      amount,
    }
  }

  #[test]
  fn sums_across_recipes_and_sorts_by_name() {
    // Recipe A: flour 200. Recipe B: salt 5, flour 100.
    let items = aggregate(vec![
      line("flour", "g", 200),
      line("salt", "g", 5),
      line("flour", "g", 100),
    ]);
    assert_eq!(items, vec![
      ShoppingListItem {
        name:             "flour".into(),
        measurement_unit: "g".into(),
        total_amount:     300,
      },
      ShoppingListItem {
        name:             "salt".into(),
        measurement_unit: "g".into(),
        total_amount:     5,
      },
    ]);
  }

  #[test]
  fn same_name_different_unit_stays_separate() {
    let items = aggregate(vec![line("milk", "ml", 200), line("milk", "cup", 1)]);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].measurement_unit, "cup");
    assert_eq!(items[1].measurement_unit, "ml");
  }

  #[test]
  fn ordering_is_case_sensitive_ordinal() {
    let items = aggregate(vec![line("apple", "pc", 1), line("Zucchini", "pc", 1)]);
    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["Zucchini", "apple"]);
  }

  #[test]
  fn empty_cart_gives_empty_list() {
    assert!(aggregate(Vec::new()).is_empty());
    assert_eq!(render(&[]), "Shopping list\n\n");
  }

  #[test]
  fn large_totals_do_not_overflow() {
    let items = aggregate(vec![line("sugar", "g", u32::MAX), line("sugar", "g", u32::MAX)]);
    assert_eq!(items[0].total_amount, 2 * u64::from(u32::MAX));
  }

  #[test]
  fn render_formats_one_line_per_item() {
    let items = aggregate(vec![line("flour", "g", 300), line("eggs", "pc", 2)]);
    assert_eq!(render(&items), "Shopping list\n\neggs (pc) - 2\nflour (g) - 300\n");
  }
}
