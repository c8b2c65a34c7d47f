//! Integration tests for `SqliteStore` against an in-memory database.

use pantry_core::{
  Error as DomainErr, ValidationError,
  catalog::{CatalogSeed, Ingredient, NewIngredient, NewTag, Tag},
  page::PageRequest,
  recipe::{IngredientAmount, NewRecipe},
  relation::RelationKind,
  shopping,
  store::{RecipeQuery, RecipeStore},
  user::{NewUser, User},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn domain(err: Error) -> DomainErr {
  match err {
    Error::Domain(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

fn assert_not_found(err: Error, entity: &str, missing: Uuid) {
  match domain(err) {
    DomainErr::NotFound { entity: e, id } => {
      assert_eq!(e, entity);
      assert_eq!(id, missing);
    }
    other => panic!("expected not found, got {other:?}"),
  }
}

async fn user(s: &SqliteStore, username: &str) -> User {
  s.create_user(NewUser {
    email:         format!("{username}@example.com"),
    username:      username.to_owned(),
    first_name:    "Test".into(),
    last_name:     "User".into(),
    password_hash: "hash".into(),
  })
  .await
  .unwrap()
}

struct Catalog {
  flour:     Ingredient,
  salt:      Ingredient,
  eggs:      Ingredient,
  breakfast: Tag,
  dinner:    Tag,
}

async fn catalog(s: &SqliteStore) -> Catalog {
  s.seed_catalog(CatalogSeed {
    tags:        vec![
      NewTag { name: "Breakfast".into(), color: "#E26C2D".into(), slug: "breakfast".into() },
      NewTag { name: "Dinner".into(), color: "#49B64E".into(), slug: "dinner".into() },
    ],
    ingredients: vec![
      NewIngredient { name: "flour".into(), measurement_unit: "g".into() },
      NewIngredient { name: "salt".into(), measurement_unit: "g".into() },
      NewIngredient { name: "eggs".into(), measurement_unit: "pc".into() },
    ],
  })
  .await
  .unwrap();

  let ingredient = |name: &'static str| async move {
    s.list_ingredients(Some(name.to_owned())).await.unwrap().remove(0)
  };
  let tags = s.list_tags().await.unwrap();
  Catalog {
    flour:     ingredient("flour").await,
    salt:      ingredient("salt").await,
    eggs:      ingredient("eggs").await,
    breakfast: tags[0].clone(),
    dinner:    tags[1].clone(),
  }
}

fn recipe(
  name: &str,
  lines: &[(&Ingredient, u32)],
  tags: &[&Tag],
) -> NewRecipe {
  NewRecipe {
    name:         name.to_owned(),
    text:         format!("How to make {name}."),
    cooking_time: 10,
    image:        Some(format!("recipes/images/{name}.png")),
    ingredients:  lines
      .iter()
      .map(|(i, amount)| IngredientAmount { ingredient_id: i.ingredient_id, amount: *amount })
      .collect(),
    tags:         tags.iter().map(|t| t.tag_id).collect(),
  }
}

fn first_page() -> PageRequest { PageRequest { page: 1, limit: 10 } }

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let fetched = s.get_user(alice.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, alice);
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_or_email_conflicts() {
  let s = store().await;
  user(&s, "alice").await;

  let again = s
    .create_user(NewUser {
      email:         "other@example.com".into(),
      username:      "alice".into(),
      first_name:    "A".into(),
      last_name:     "B".into(),
      password_hash: "hash".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(domain(again), DomainErr::Conflict(msg) if msg.contains("username")));

  let same_email = s
    .create_user(NewUser {
      email:         "alice@example.com".into(),
      username:      "alice2".into(),
      first_name:    "A".into(),
      last_name:     "B".into(),
      password_hash: "hash".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(domain(same_email), DomainErr::Conflict(msg) if msg.contains("email")));
}

#[tokio::test]
async fn credentials_and_password_change() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let (found, hash) = s.credentials("alice").await.unwrap().unwrap();
  assert_eq!(found.user_id, alice.user_id);
  assert_eq!(hash, "hash");

  s.set_password_hash(alice.user_id, "new-hash".into()).await.unwrap();
  let (_, hash) = s.credentials("alice").await.unwrap().unwrap();
  assert_eq!(hash, "new-hash");

  assert!(s.credentials("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn users_are_listed_by_username_with_paging() {
  let s = store().await;
  for name in ["carol", "alice", "bob"] {
    user(&s, name).await;
  }

  let page = s.list_users(PageRequest { page: 1, limit: 2 }).await.unwrap();
  assert_eq!(page.count, 3);
  assert_eq!(page.next, Some(2));
  let names: Vec<_> = page.results.iter().map(|u| u.username.as_str()).collect();
  assert_eq!(names, ["alice", "bob"]);

  let last = s.list_users(PageRequest { page: 2, limit: 2 }).await.unwrap();
  assert_eq!(last.results[0].username, "carol");
  assert_eq!(last.next, None);
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seeding_twice_skips_existing_rows() {
  let s = store().await;
  catalog(&s).await;

  let report = s
    .seed_catalog(CatalogSeed {
      tags:        vec![NewTag {
        name:  "Breakfast".into(),
        color: "#000000".into(),
        slug:  "breakfast".into(),
      }],
      ingredients: vec![
        NewIngredient { name: "flour".into(), measurement_unit: "g".into() },
        NewIngredient { name: "flour".into(), measurement_unit: "kg".into() },
      ],
    })
    .await
    .unwrap();

  assert_eq!(report.tags, 0);
  assert_eq!(report.ingredients, 1);
  assert_eq!(s.list_tags().await.unwrap().len(), 2);
}

#[tokio::test]
async fn ingredient_search_is_a_case_insensitive_prefix() {
  let s = store().await;
  catalog(&s).await;

  let found = s.list_ingredients(Some("FL".into())).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name, "flour");

  assert!(s.list_ingredients(Some("lour".into())).await.unwrap().is_empty());
  assert_eq!(s.list_ingredients(None).await.unwrap().len(), 3);
  assert!(s.list_ingredients(Some("%".into())).await.unwrap().is_empty());

  s.seed_catalog(CatalogSeed {
    tags:        vec![],
    ingredients: vec![NewIngredient { name: "Мука".into(), measurement_unit: "г".into() }],
  })
  .await
  .unwrap();
  for prefix in ["Му", "му", "МУК"] {
    let found = s.list_ingredients(Some(prefix.into())).await.unwrap();
    assert_eq!(found.len(), 1, "prefix {prefix:?}");
    assert_eq!(found[0].name, "Мука");
  }
  assert!(s.list_ingredients(Some("ука".into())).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_tag_and_ingredient() {
  let s = store().await;
  let c = catalog(&s).await;

  assert_eq!(s.get_tag(c.dinner.tag_id).await.unwrap(), Some(c.dinner.clone()));
  assert_eq!(s.get_ingredient(c.salt.ingredient_id).await.unwrap(), Some(c.salt.clone()));
  assert!(s.get_tag(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Recipes ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_recipe_returns_full_aggregate() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;

  let created = s
    .create_recipe(
      alice.user_id,
      recipe("pancakes", &[(&c.flour, 200), (&c.eggs, 2)], &[&c.breakfast]),
    )
    .await
    .unwrap();

  assert_eq!(created.author, alice);
  assert_eq!(created.recipe.image, "recipes/images/pancakes.png");
  assert_eq!(created.tags, vec![c.breakfast.clone()]);
  let amounts: Vec<_> =
    created.ingredients.iter().map(|l| (l.ingredient.name.as_str(), l.amount)).collect();
  assert_eq!(amounts, [("flour", 200), ("eggs", 2)]);

  let fetched = s.get_recipe(created.recipe.recipe_id).await.unwrap().unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn unknown_ingredient_writes_nothing() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;

  let mut input = recipe("ghost", &[(&c.flour, 1)], &[&c.breakfast]);
  let missing = Uuid::new_v4();
  input.ingredients.push(IngredientAmount { ingredient_id: missing, amount: 1 });

  let err = s.create_recipe(alice.user_id, input).await.unwrap_err();
  assert!(matches!(
    domain(err),
    DomainErr::Validation(ValidationError::UnknownIngredient(id)) if id == missing
  ));

  let all = s.list_recipes(&RecipeQuery::default(), first_page()).await.unwrap();
  assert_eq!(all.count, 0);
}

#[tokio::test]
async fn update_replaces_lines_and_tags() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;

  let created = s
    .create_recipe(
      alice.user_id,
      recipe("bread", &[(&c.flour, 500), (&c.salt, 10)], &[&c.breakfast, &c.dinner]),
    )
    .await
    .unwrap();
  let id = created.recipe.recipe_id;

  let mut input = recipe("bread", &[(&c.eggs, 1)], &[&c.dinner]);
  input.image = None;
  input.cooking_time = 45;
  let updated = s.update_recipe(id, alice.user_id, input).await.unwrap();

  assert_eq!(updated.recipe.cooking_time, 45);
  assert_eq!(updated.recipe.image, created.recipe.image);
  assert_eq!(updated.tags, vec![c.dinner.clone()]);
  assert_eq!(updated.ingredients.len(), 1);
  assert_eq!(updated.ingredients[0].ingredient, c.eggs);
}

#[tokio::test]
async fn failed_update_leaves_recipe_untouched() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;

  let created = s
    .create_recipe(alice.user_id, recipe("soup", &[(&c.salt, 3)], &[&c.dinner]))
    .await
    .unwrap();
  let id = created.recipe.recipe_id;

  let bad_tag = Uuid::new_v4();
  let mut input = recipe("soup v2", &[(&c.flour, 9)], &[]);
  input.tags = vec![bad_tag];
  let err = s.update_recipe(id, alice.user_id, input).await.unwrap_err();
  assert!(matches!(
    domain(err),
    DomainErr::Validation(ValidationError::UnknownTag(id)) if id == bad_tag
  ));

  assert_eq!(s.get_recipe(id).await.unwrap().unwrap(), created);
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let created = s
    .create_recipe(alice.user_id, recipe("toast", &[(&c.flour, 1)], &[&c.breakfast]))
    .await
    .unwrap();
  let id = created.recipe.recipe_id;

  let err = s
    .update_recipe(id, bob.user_id, recipe("mine", &[(&c.flour, 1)], &[&c.breakfast]))
    .await
    .unwrap_err();
  assert!(matches!(domain(err), DomainErr::Forbidden));

  let err = s.delete_recipe(id, bob.user_id).await.unwrap_err();
  assert!(matches!(domain(err), DomainErr::Forbidden));

  let missing = Uuid::new_v4();
  let err = s.delete_recipe(missing, alice.user_id).await.unwrap_err();
  assert_not_found(err, "recipe", missing);
}

#[tokio::test]
async fn delete_cascades_to_relations() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let created = s
    .create_recipe(alice.user_id, recipe("stew", &[(&c.salt, 4)], &[&c.dinner]))
    .await
    .unwrap();
  let id = created.recipe.recipe_id;
  s.add_relation(RelationKind::ShoppingCart, bob.user_id, id).await.unwrap();
  s.add_relation(RelationKind::Favorite, bob.user_id, id).await.unwrap();

  s.delete_recipe(id, alice.user_id).await.unwrap();

  assert!(s.get_recipe(id).await.unwrap().is_none());
  assert!(s.cart_lines(bob.user_id).await.unwrap().is_empty());
  let favorites = RecipeQuery { favorited_by: Some(bob.user_id), ..Default::default() };
  assert_eq!(s.list_recipes(&favorites, first_page()).await.unwrap().count, 0);
}

#[tokio::test]
async fn listing_is_newest_first_and_filters_combine() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let porridge = s
    .create_recipe(alice.user_id, recipe("porridge", &[(&c.salt, 1)], &[&c.breakfast]))
    .await
    .unwrap();
  let roast = s
    .create_recipe(alice.user_id, recipe("roast", &[(&c.salt, 2)], &[&c.dinner]))
    .await
    .unwrap();
  let omelette = s
    .create_recipe(bob.user_id, recipe("omelette", &[(&c.eggs, 3)], &[&c.breakfast, &c.dinner]))
    .await
    .unwrap();

  let all = s.list_recipes(&RecipeQuery::default(), first_page()).await.unwrap();
  let names: Vec<_> = all.results.iter().map(|r| r.recipe.name.as_str()).collect();
  assert_eq!(names, ["omelette", "roast", "porridge"]);

  let by_alice = RecipeQuery {
    author: Some(alice.user_id.to_string()),
    ..Default::default()
  };
  assert_eq!(s.list_recipes(&by_alice, first_page()).await.unwrap().count, 2);

  let breakfast = RecipeQuery { tags: vec!["breakfast".into()], ..Default::default() };
  let found = s.list_recipes(&breakfast, first_page()).await.unwrap();
  let ids: Vec<_> = found.results.iter().map(|r| r.recipe.recipe_id).collect();
  assert_eq!(ids, [omelette.recipe.recipe_id, porridge.recipe.recipe_id]);

  let any_tag = RecipeQuery {
    tags: vec!["breakfast".into(), "dinner".into()],
    ..Default::default()
  };
  assert_eq!(s.list_recipes(&any_tag, first_page()).await.unwrap().count, 3);

  s.add_relation(RelationKind::Favorite, bob.user_id, roast.recipe.recipe_id)
    .await
    .unwrap();
  let bobs_favorite_dinners = RecipeQuery {
    tags: vec!["dinner".into()],
    favorited_by: Some(bob.user_id),
    ..Default::default()
  };
  let found = s.list_recipes(&bobs_favorite_dinners, first_page()).await.unwrap();
  assert_eq!(found.count, 1);
  assert_eq!(found.results[0].recipe.recipe_id, roast.recipe.recipe_id);
}

#[tokio::test]
async fn unknown_tag_slug_is_rejected() {
  let s = store().await;
  catalog(&s).await;

  let query = RecipeQuery {
    tags: vec!["breakfast".into(), "brunch".into()],
    ..Default::default()
  };
  let err = s.list_recipes(&query, first_page()).await.unwrap_err();
  assert!(matches!(
    domain(err),
    DomainErr::Validation(ValidationError::UnknownTagSlug(slug)) if slug == "brunch"
  ));
}

#[tokio::test]
async fn listing_pages_report_links() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  for n in 0..5 {
    s.create_recipe(alice.user_id, recipe(&format!("dish{n}"), &[(&c.salt, 1)], &[&c.dinner]))
      .await
      .unwrap();
  }

  let req = PageRequest { page: 3, limit: 2 };
  let page = s.list_recipes(&RecipeQuery::default(), req).await.unwrap();
  assert_eq!(page.count, 5);
  assert_eq!(page.results.len(), 1);
  assert_eq!(page.results[0].recipe.name, "dish0");
  assert_eq!(page.previous, Some(2));
  assert_eq!(page.next, None);

  let past = PageRequest { page: 4, limit: 2 };
  let page = s.list_recipes(&RecipeQuery::default(), past).await.unwrap();
  assert!(page.is_out_of_range(past));
}

#[tokio::test]
async fn author_recipes_are_limited_but_fully_counted() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  for n in 0..3 {
    s.create_recipe(alice.user_id, recipe(&format!("a{n}"), &[(&c.salt, 1)], &[&c.dinner]))
      .await
      .unwrap();
  }

  let map = s.author_recipes(vec![alice.user_id, bob.user_id], Some(2)).await.unwrap();
  let alices = &map[&alice.user_id];
  assert_eq!(alices.count, 3);
  let names: Vec<_> = alices.recipes.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, ["a2", "a1"]);
  assert_eq!(map[&bob.user_id].count, 0);
  assert!(map[&bob.user_id].recipes.is_empty());

  let unlimited = s.author_recipes(vec![alice.user_id], None).await.unwrap();
  assert_eq!(unlimited[&alice.user_id].recipes.len(), 3);
}

// ─── Relations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn relation_add_twice_conflicts_and_remove_twice_fails() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  let id = s
    .create_recipe(alice.user_id, recipe("pie", &[(&c.flour, 1)], &[&c.dinner]))
    .await
    .unwrap()
    .recipe
    .recipe_id;

  let summary = s.add_relation(RelationKind::Favorite, alice.user_id, id).await.unwrap();
  assert_eq!(summary.name, "pie");

  let err = s.add_relation(RelationKind::Favorite, alice.user_id, id).await.unwrap_err();
  assert!(matches!(domain(err), DomainErr::Conflict(msg) if msg.contains("favorites")));

  // The cart is a separate collection.
  s.add_relation(RelationKind::ShoppingCart, alice.user_id, id).await.unwrap();

  s.remove_relation(RelationKind::Favorite, alice.user_id, id).await.unwrap();
  let err = s.remove_relation(RelationKind::Favorite, alice.user_id, id).await.unwrap_err();
  assert!(matches!(domain(err), DomainErr::AlreadyRemoved(_)));
}

#[tokio::test]
async fn relation_on_missing_recipe_is_not_found() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let missing = Uuid::new_v4();

  let err = s.add_relation(RelationKind::ShoppingCart, alice.user_id, missing).await.unwrap_err();
  assert_not_found(err, "recipe", missing);
  let err = s.remove_relation(RelationKind::Favorite, alice.user_id, missing).await.unwrap_err();
  assert_not_found(err, "recipe", missing);
}

#[tokio::test]
async fn cart_lines_sum_into_a_shopping_list() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;

  let bread = s
    .create_recipe(alice.user_id, recipe("bread", &[(&c.flour, 200), (&c.salt, 5)], &[&c.dinner]))
    .await
    .unwrap();
  let crepes = s
    .create_recipe(alice.user_id, recipe("crepes", &[(&c.flour, 100)], &[&c.breakfast]))
    .await
    .unwrap();
  for id in [bread.recipe.recipe_id, crepes.recipe.recipe_id] {
    s.add_relation(RelationKind::ShoppingCart, alice.user_id, id).await.unwrap();
  }

  let items = shopping::aggregate(s.cart_lines(alice.user_id).await.unwrap());
  let totals: Vec<_> = items.iter().map(|i| (i.name.as_str(), i.total_amount)).collect();
  assert_eq!(totals, [("flour", 300), ("salt", 5)]);
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_rules() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let author = s.subscribe(alice.user_id, bob.user_id).await.unwrap();
  assert_eq!(author, bob);

  let err = s.subscribe(alice.user_id, bob.user_id).await.unwrap_err();
  assert!(matches!(domain(err), DomainErr::Conflict(_)));

  let err = s.subscribe(alice.user_id, alice.user_id).await.unwrap_err();
  assert!(matches!(domain(err), DomainErr::SelfSubscribe));

  let missing = Uuid::new_v4();
  let err = s.subscribe(alice.user_id, missing).await.unwrap_err();
  assert_not_found(err, "user", missing);

  s.unsubscribe(alice.user_id, bob.user_id).await.unwrap();
  let err = s.unsubscribe(alice.user_id, bob.user_id).await.unwrap_err();
  assert!(matches!(domain(err), DomainErr::AlreadyRemoved(_)));
}

#[tokio::test]
async fn subscriptions_are_listed_by_username() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let zed = user(&s, "zed").await;
  let bob = user(&s, "bob").await;
  s.subscribe(alice.user_id, zed.user_id).await.unwrap();
  s.subscribe(alice.user_id, bob.user_id).await.unwrap();

  let page = s.list_subscriptions(alice.user_id, first_page()).await.unwrap();
  assert_eq!(page.count, 2);
  let names: Vec<_> = page.results.iter().map(|u| u.username.as_str()).collect();
  assert_eq!(names, ["bob", "zed"]);

  assert_eq!(s.list_subscriptions(bob.user_id, first_page()).await.unwrap().count, 0);
}

// ─── Viewer state ────────────────────────────────────────────────────────────

#[tokio::test]
async fn viewer_state_reflects_relations_for_the_batch() {
  let s = store().await;
  let c = catalog(&s).await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let one = s
    .create_recipe(bob.user_id, recipe("one", &[(&c.salt, 1)], &[&c.dinner]))
    .await
    .unwrap()
    .recipe
    .recipe_id;
  let two = s
    .create_recipe(bob.user_id, recipe("two", &[(&c.salt, 1)], &[&c.dinner]))
    .await
    .unwrap()
    .recipe
    .recipe_id;
  s.add_relation(RelationKind::Favorite, alice.user_id, one).await.unwrap();
  s.add_relation(RelationKind::ShoppingCart, alice.user_id, two).await.unwrap();
  s.subscribe(alice.user_id, bob.user_id).await.unwrap();

  let state = s
    .viewer_state(alice.user_id, vec![one, two], vec![bob.user_id, alice.user_id])
    .await
    .unwrap();
  assert!(state.favorited.contains(&one) && !state.favorited.contains(&two));
  assert!(state.in_cart.contains(&two) && !state.in_cart.contains(&one));
  assert_eq!(state.subscribed.len(), 1);
  assert!(state.subscribed.contains(&bob.user_id));

  let bobs = s.viewer_state(bob.user_id, vec![one, two], vec![]).await.unwrap();
  assert!(bobs.favorited.is_empty() && bobs.in_cart.is_empty());
}
