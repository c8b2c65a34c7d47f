//! [`SqliteStore`], the SQLite implementation of [`RecipeStore`].

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use chrono::{DateTime, SubsecRound as _, Utc};
use pantry_core::{
  ValidationError,
  catalog::{CatalogSeed, Ingredient, SeedReport, Tag},
  page::{Page, PageRequest},
  recipe::{AuthorRecipes, NewRecipe, RecipeAggregate, RecipeSummary},
  relation::RelationKind,
  shopping::CartLine,
  store::{RecipeQuery, RecipeStore},
  user::{NewUser, User},
  view::ViewerState,
};
use rusqlite::{OptionalExtension as _, params, params_from_iter, types::Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    INGREDIENT_COLUMNS, RECIPE_COLUMNS, RawAggregateSet, RawIngredient, RawLine,
    RawRecipe, RawSummary, RawTag, RawUser, TAG_COLUMNS, USER_COLUMNS, decode_u32,
    decode_u64, decode_uuid, encode_dt, encode_uuid, escape_like,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Pantry store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        register_fold_case(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load full aggregates for the recipes selected by `tail`.
  async fn load_aggregates(
    &self,
    tail: &'static str,
    params: Vec<Value>,
  ) -> Result<Vec<RecipeAggregate>> {
    let set = self
      .conn
      .call(move |conn| {
        let recipes = select_recipes(conn, tail, &params)?;
        Ok(with_children(conn, recipes)?)
      })
      .await?;
    set.into_aggregates()
  }
}

/// `fold_case(text)`: Unicode lowercase. SQLite's own `lower()` and `LIKE`
/// only fold ASCII, which misses names like "Мука".
fn register_fold_case(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  use rusqlite::functions::FunctionFlags;
  conn.create_scalar_function(
    "fold_case",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
  )
}

/// Stored timestamps carry microseconds; truncate so a value read back equals
/// the one returned at write time.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

/// `(LIMIT, OFFSET)` for a page request.
fn page_bounds(page: PageRequest) -> (i64, i64) {
  (
    i64::try_from(page.limit).unwrap_or(i64::MAX),
    i64::try_from(page.offset()).unwrap_or(i64::MAX),
  )
}

fn row_exists(conn: &rusqlite::Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, params![id], |_| Ok(())).optional()?.is_some())
}

// ─── Recipe helpers (run on the connection thread) ───────────────────────────

fn select_recipes(
  conn: &rusqlite::Connection,
  tail: &str,
  params: &[Value],
) -> rusqlite::Result<Vec<RawRecipe>> {
  let sql = format!(
    "SELECT {RECIPE_COLUMNS} FROM recipes r JOIN users u ON u.user_id = r.author_id {tail}"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map(params_from_iter(params.iter()), RawRecipe::from_row)?;
  rows.collect()
}

/// Fetch ingredient lines and tags for every recipe in one query each.
fn with_children(
  conn: &rusqlite::Connection,
  recipes: Vec<RawRecipe>,
) -> rusqlite::Result<RawAggregateSet> {
  if recipes.is_empty() {
    return Ok(RawAggregateSet::default());
  }
  let ids: Vec<Value> = recipes.iter().map(|r| Value::Text(r.recipe_id.clone())).collect();
  let marks = placeholders(ids.len());

  let mut stmt = conn.prepare(&format!(
    "SELECT ri.recipe_id, {INGREDIENT_COLUMNS}, ri.amount
     FROM recipe_ingredients ri
     JOIN ingredients i ON i.ingredient_id = ri.ingredient_id
     WHERE ri.recipe_id IN ({marks})
     ORDER BY ri.rowid"
  ))?;
  let lines = stmt
    .query_map(params_from_iter(ids.iter()), |row| {
      Ok(RawLine {
        recipe_id:  row.get(0)?,
        ingredient: RawIngredient::from_row(row, 1)?,
        amount:     row.get(4)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(&format!(
    "SELECT rt.recipe_id, {TAG_COLUMNS}
     FROM recipe_tags rt
     JOIN tags t ON t.tag_id = rt.tag_id
     WHERE rt.recipe_id IN ({marks})
     ORDER BY t.name"
  ))?;
  let tags = stmt
    .query_map(params_from_iter(ids.iter()), |row| {
      Ok((row.get::<_, String>(0)?, RawTag::from_row(row, 1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(RawAggregateSet { recipes, lines, tags })
}

/// The first ingredient or tag reference that is not in the catalog.
fn unknown_reference(
  conn: &rusqlite::Connection,
  input: &NewRecipe,
) -> rusqlite::Result<Option<ValidationError>> {
  for line in &input.ingredients {
    let sql = "SELECT 1 FROM ingredients WHERE ingredient_id = ?1";
    if !row_exists(conn, sql, &encode_uuid(line.ingredient_id))? {
      return Ok(Some(ValidationError::UnknownIngredient(line.ingredient_id)));
    }
  }
  for &tag_id in &input.tags {
    if !row_exists(conn, "SELECT 1 FROM tags WHERE tag_id = ?1", &encode_uuid(tag_id))? {
      return Ok(Some(ValidationError::UnknownTag(tag_id)));
    }
  }
  Ok(None)
}

fn insert_children(
  conn: &rusqlite::Connection,
  recipe_id: &str,
  input: &NewRecipe,
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)",
  )?;
  for line in &input.ingredients {
    stmt.execute(params![recipe_id, encode_uuid(line.ingredient_id), line.amount])?;
  }

  let mut stmt =
    conn.prepare("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)")?;
  for &tag_id in &input.tags {
    stmt.execute(params![recipe_id, encode_uuid(tag_id)])?;
  }
  Ok(())
}

/// `NotFound` if the recipe is missing, `Forbidden` if `editor_id` did not
/// write it.
fn authorize_edit(
  conn: &rusqlite::Connection,
  recipe_id: Uuid,
  editor_id: Uuid,
) -> rusqlite::Result<pantry_core::Result<()>> {
  let author: Option<String> = conn
    .query_row(
      "SELECT author_id FROM recipes WHERE recipe_id = ?1",
      params![encode_uuid(recipe_id)],
      |r| r.get(0),
    )
    .optional()?;
  Ok(match author {
    None => Err(pantry_core::Error::not_found("recipe", recipe_id)),
    Some(author) if author != encode_uuid(editor_id) => Err(pantry_core::Error::Forbidden),
    Some(_) => Ok(()),
  })
}

/// The first of `slugs` that names no tag.
fn unknown_slug(
  conn: &rusqlite::Connection,
  slugs: &[String],
) -> rusqlite::Result<Option<String>> {
  if slugs.is_empty() {
    return Ok(None);
  }
  let mut stmt = conn.prepare(&format!(
    "SELECT slug FROM tags WHERE slug IN ({})",
    placeholders(slugs.len())
  ))?;
  let known = stmt
    .query_map(params_from_iter(slugs.iter()), |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<HashSet<_>>>()?;
  Ok(slugs.iter().find(|slug| !known.contains(*slug)).cloned())
}

/// WHERE clause and parameters for a recipe listing.
fn recipe_filter(query: &RecipeQuery) -> (String, Vec<Value>) {
  let mut clauses = Vec::new();
  let mut params = Vec::new();

  if let Some(author) = &query.author {
    clauses.push("r.author_id LIKE ? ESCAPE '\\'".to_owned());
    params.push(Value::Text(format!("%{}%", escape_like(author))));
  }
  if !query.tags.is_empty() {
    clauses.push(format!(
      "EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.tag_id = rt.tag_id
               WHERE rt.recipe_id = r.recipe_id AND t.slug IN ({}))",
      placeholders(query.tags.len())
    ));
    params.extend(query.tags.iter().cloned().map(Value::Text));
  }
  if let Some(user_id) = query.favorited_by {
    clauses.push(
      "EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.recipe_id AND f.user_id = ?)"
        .to_owned(),
    );
    params.push(Value::Text(encode_uuid(user_id)));
  }
  if let Some(user_id) = query.in_shopping_cart_of {
    clauses.push(
      "EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.recipe_id AND c.user_id = ?)"
        .to_owned(),
    );
    params.push(Value::Text(encode_uuid(user_id)));
  }

  let filter = if clauses.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", clauses.join(" AND "))
  };
  (filter, params)
}

fn relation_table(kind: RelationKind) -> &'static str {
  match kind {
    RelationKind::Favorite => "favorites",
    RelationKind::ShoppingCart => "shopping_carts",
  }
}

/// Which of `ids` appear in `sql ... IN (ids)` for `user_id`.
fn matching_ids(
  conn: &rusqlite::Connection,
  sql: &str,
  user_id: &str,
  ids: &[String],
) -> rusqlite::Result<Vec<String>> {
  if ids.is_empty() {
    return Ok(Vec::new());
  }
  let mut params = vec![Value::Text(user_id.to_owned())];
  params.extend(ids.iter().cloned().map(Value::Text));
  let mut stmt = conn.prepare(&format!("{sql} IN ({})", placeholders(ids.len())))?;
  let rows = stmt.query_map(params_from_iter(params.iter()), |r| r.get(0))?;
  rows.collect()
}

fn decode_ids(raw: Vec<String>) -> Result<HashSet<Uuid>> {
  raw.iter().map(|s| decode_uuid(s)).collect()
}

// ─── RecipeStore impl ────────────────────────────────────────────────────────

impl RecipeStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:    Uuid::new_v4(),
      email:      input.email,
      username:   input.username,
      first_name: input.first_name,
      last_name:  input.last_name,
      created_at: now(),
    };

    let row = (
      encode_uuid(user.user_id),
      user.email.clone(),
      user.username.clone(),
      user.first_name.clone(),
      user.last_name.clone(),
      input.password_hash,
      encode_dt(user.created_at),
    );

    let outcome: pantry_core::Result<()> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO users
             (user_id, email, username, first_name, last_name, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![row.0, row.1, row.2, row.3, row.4, row.5, row.6],
        );
        match inserted {
          Ok(_) => Ok(Ok(())),
          Err(rusqlite::Error::SqliteFailure(f, Some(msg)))
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            let field = if msg.contains("users.email") { "email" } else { "username" };
            Ok(Err(pantry_core::Error::Conflict(format!(
              "a user with this {field} already exists"
            ))))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    outcome?;

    tracing::debug!(user_id = %user.user_id, username = %user.username, "created user");
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
              params![id_str],
              |row| RawUser::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn list_users(&self, page: PageRequest) -> Result<Page<User>> {
    let (limit, offset) = page_bounds(page);
    let (count, raws): (i64, Vec<RawUser>) = self
      .conn
      .call(move |conn| {
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users u ORDER BY u.username LIMIT ?1 OFFSET ?2"
        ))?;
        let raws = stmt
          .query_map(params![limit, offset], |row| RawUser::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((count, raws))
      })
      .await?;

    let users = raws.into_iter().map(RawUser::into_user).collect::<Result<Vec<_>>>()?;
    Ok(Page::new(users, decode_u64("count", count)?, page))
  }

  async fn credentials<'a>(&'a self, username: &'a str) -> Result<Option<(User, String)>> {
    let username = username.to_owned();
    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.username = ?1"
              ),
              params![username],
              |row| Ok((RawUser::from_row(row, 0)?, row.get(6)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(user, hash)| Ok((user.into_user()?, hash)))
      .transpose()
  }

  async fn set_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<()> {
    let id_str = encode_uuid(user_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET password_hash = ?2 WHERE user_id = ?1",
          params![id_str, password_hash],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(pantry_core::Error::not_found("user", user_id).into());
    }
    tracing::debug!(%user_id, "changed password");
    Ok(())
  }

  // ── Catalog ───────────────────────────────────────────────────────────

  async fn list_tags(&self) -> Result<Vec<Tag>> {
    let raws: Vec<RawTag> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {TAG_COLUMNS} FROM tags t ORDER BY t.name"))?;
        let rows = stmt
          .query_map([], |row| RawTag::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawTag::into_tag).collect()
  }

  async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawTag> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.tag_id = ?1"),
              params![id_str],
              |row| RawTag::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawTag::into_tag).transpose()
  }

  async fn list_ingredients(&self, prefix: Option<String>) -> Result<Vec<Ingredient>> {
    let folded = prefix.as_deref().unwrap_or_default().to_lowercase();
    let raws: Vec<RawIngredient> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INGREDIENT_COLUMNS} FROM ingredients i
           WHERE ?1 = '' OR instr(fold_case(i.name), ?1) = 1
           ORDER BY i.name, i.measurement_unit"
        ))?;
        let rows = stmt
          .query_map(params![folded], |row| RawIngredient::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawIngredient::into_ingredient).collect()
  }

  async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawIngredient> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INGREDIENT_COLUMNS} FROM ingredients i WHERE i.ingredient_id = ?1"
              ),
              params![id_str],
              |row| RawIngredient::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawIngredient::into_ingredient).transpose()
  }

  async fn seed_catalog(&self, seed: CatalogSeed) -> Result<SeedReport> {
    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut report = SeedReport::default();
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO tags (tag_id, name, color, slug) VALUES (?1, ?2, ?3, ?4)",
          )?;
          for tag in &seed.tags {
            report.tags += stmt.execute(params![
              encode_uuid(Uuid::new_v4()),
              tag.name,
              tag.color,
              tag.slug
            ])?;
          }

          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO ingredients (ingredient_id, name, measurement_unit)
             VALUES (?1, ?2, ?3)",
          )?;
          for ingredient in &seed.ingredients {
            report.ingredients += stmt.execute(params![
              encode_uuid(Uuid::new_v4()),
              ingredient.name,
              ingredient.measurement_unit
            ])?;
          }
        }
        tx.commit()?;
        Ok(report)
      })
      .await?;

    tracing::info!(tags = report.tags, ingredients = report.ingredients, "seeded catalog");
    Ok(report)
  }

  // ── Recipes ───────────────────────────────────────────────────────────

  async fn create_recipe(&self, author_id: Uuid, input: NewRecipe) -> Result<RecipeAggregate> {
    let recipe_id = Uuid::new_v4();
    let id_str = encode_uuid(recipe_id);
    let author_str = encode_uuid(author_id);
    let created_at = encode_dt(now());

    let outcome: pantry_core::Result<RawAggregateSet> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Some(err) = unknown_reference(&tx, &input)? {
          return Ok(Err(err.into()));
        }

        tx.execute(
          "INSERT INTO recipes
             (recipe_id, author_id, name, image, text, cooking_time, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![
            id_str,
            author_str,
            input.name,
            input.image.as_deref().unwrap_or_default(),
            input.text,
            input.cooking_time,
            created_at
          ],
        )?;
        insert_children(&tx, &id_str, &input)?;

        let recipes =
          select_recipes(&tx, "WHERE r.recipe_id = ?", &[Value::Text(id_str.clone())])?;
        let set = with_children(&tx, recipes)?;
        tx.commit()?;
        Ok(Ok(set))
      })
      .await?;

    let aggregate = outcome?
      .into_aggregates()?
      .pop()
      .ok_or(pantry_core::Error::not_found("recipe", recipe_id))?;
    tracing::debug!(%recipe_id, %author_id, "created recipe");
    Ok(aggregate)
  }

  async fn update_recipe(
    &self,
    recipe_id: Uuid,
    editor_id: Uuid,
    input: NewRecipe,
  ) -> Result<RecipeAggregate> {
    let id_str = encode_uuid(recipe_id);

    let outcome: pantry_core::Result<RawAggregateSet> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(err) = authorize_edit(&tx, recipe_id, editor_id)? {
          return Ok(Err(err));
        }
        if let Some(err) = unknown_reference(&tx, &input)? {
          return Ok(Err(err.into()));
        }

        tx.execute(
          "UPDATE recipes
           SET name = ?2, text = ?3, cooking_time = ?4, image = COALESCE(?5, image)
           WHERE recipe_id = ?1",
          params![id_str, input.name, input.text, input.cooking_time, input.image],
        )?;
        tx.execute("DELETE FROM recipe_ingredients WHERE recipe_id = ?1", params![id_str])?;
        tx.execute("DELETE FROM recipe_tags WHERE recipe_id = ?1", params![id_str])?;
        insert_children(&tx, &id_str, &input)?;

        let recipes =
          select_recipes(&tx, "WHERE r.recipe_id = ?", &[Value::Text(id_str.clone())])?;
        let set = with_children(&tx, recipes)?;
        tx.commit()?;
        Ok(Ok(set))
      })
      .await?;

    let aggregate = outcome?
      .into_aggregates()?
      .pop()
      .ok_or(pantry_core::Error::not_found("recipe", recipe_id))?;
    tracing::debug!(%recipe_id, "updated recipe");
    Ok(aggregate)
  }

  async fn delete_recipe(&self, recipe_id: Uuid, editor_id: Uuid) -> Result<()> {
    let outcome: pantry_core::Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(err) = authorize_edit(&tx, recipe_id, editor_id)? {
          return Ok(Err(err));
        }
        tx.execute(
          "DELETE FROM recipes WHERE recipe_id = ?1",
          params![encode_uuid(recipe_id)],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    tracing::debug!(%recipe_id, "deleted recipe");
    Ok(())
  }

  async fn get_recipe(&self, id: Uuid) -> Result<Option<RecipeAggregate>> {
    let mut found = self
      .load_aggregates("WHERE r.recipe_id = ?", vec![Value::Text(encode_uuid(id))])
      .await?;
    Ok(found.pop())
  }

  async fn list_recipes<'a>(
    &'a self,
    query: &'a RecipeQuery,
    page: PageRequest,
  ) -> Result<Page<RecipeAggregate>> {
    let (filter, mut params) = recipe_filter(query);
    let (limit, offset) = page_bounds(page);
    let slugs = query.tags.clone();

    let outcome: pantry_core::Result<(i64, RawAggregateSet)> = self
      .conn
      .call(move |conn| {
        if let Some(slug) = unknown_slug(conn, &slugs)? {
          return Ok(Err(ValidationError::UnknownTagSlug(slug).into()));
        }

        let count = conn.query_row(
          &format!("SELECT COUNT(*) FROM recipes r {filter}"),
          params_from_iter(params.iter()),
          |r| r.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let recipes = select_recipes(
          conn,
          &format!("{filter} ORDER BY r.created_at DESC, r.rowid DESC LIMIT ? OFFSET ?"),
          &params,
        )?;
        Ok(Ok((count, with_children(conn, recipes)?)))
      })
      .await?;
    let (count, set) = outcome?;

    Ok(Page::new(set.into_aggregates()?, decode_u64("count", count)?, page))
  }

  async fn author_recipes(
    &self,
    author_ids: Vec<Uuid>,
    limit: Option<u64>,
  ) -> Result<HashMap<Uuid, AuthorRecipes>> {
    let mut out: HashMap<Uuid, AuthorRecipes> =
      author_ids.iter().map(|&id| (id, AuthorRecipes::default())).collect();
    if author_ids.is_empty() {
      return Ok(out);
    }

    let ids: Vec<Value> = author_ids.iter().map(|&id| Value::Text(encode_uuid(id))).collect();
    let limit = limit.map_or(i64::MAX, |n| i64::try_from(n).unwrap_or(i64::MAX));

    type Rows = (Vec<(String, RawSummary)>, Vec<(String, i64)>);
    let (summaries, counts): Rows = self
      .conn
      .call(move |conn| {
        let marks = placeholders(ids.len());

        let mut params = ids.clone();
        params.push(Value::Integer(limit));
        let mut stmt = conn.prepare(&format!(
          "SELECT author_id, recipe_id, name, image, cooking_time FROM (
             SELECT r.author_id, r.recipe_id, r.name, r.image, r.cooking_time,
                    ROW_NUMBER() OVER (
                      PARTITION BY r.author_id ORDER BY r.created_at DESC, r.rowid DESC
                    ) AS rn
             FROM recipes r
             WHERE r.author_id IN ({marks})
           )
           WHERE rn <= ?
           ORDER BY author_id, rn"
        ))?;
        let summaries = stmt
          .query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get(0)?, RawSummary::from_row(row, 1)?))
          })?
          .collect::<rusqlite::Result<Vec<(String, RawSummary)>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT author_id, COUNT(*) FROM recipes
           WHERE author_id IN ({marks})
           GROUP BY author_id"
        ))?;
        let counts = stmt
          .query_map(params_from_iter(ids.iter()), |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;

        Ok((summaries, counts))
      })
      .await?;

    for (author, raw) in summaries {
      out
        .entry(decode_uuid(&author)?)
        .or_default()
        .recipes
        .push(raw.into_summary()?);
    }
    for (author, count) in counts {
      out.entry(decode_uuid(&author)?).or_default().count =
        decode_u64("count", count)?;
    }
    Ok(out)
  }

  // ── Relations ─────────────────────────────────────────────────────────

  async fn add_relation(
    &self,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
  ) -> Result<RecipeSummary> {
    let user_str = encode_uuid(user_id);
    let recipe_str = encode_uuid(recipe_id);
    let created_at = encode_dt(now());

    let outcome: pantry_core::Result<RawSummary> = self
      .conn
      .call(move |conn| {
        let summary = conn
          .query_row(
            "SELECT recipe_id, name, image, cooking_time FROM recipes WHERE recipe_id = ?1",
            params![recipe_str],
            |row| RawSummary::from_row(row, 0),
          )
          .optional()?;
        let Some(summary) = summary else {
          return Ok(Err(pantry_core::Error::not_found("recipe", recipe_id)));
        };

        let inserted = conn.execute(
          &format!(
            "INSERT INTO {} (user_id, recipe_id, created_at) VALUES (?1, ?2, ?3)",
            relation_table(kind)
          ),
          params![user_str, recipe_str, created_at],
        );
        match inserted {
          Ok(_) => Ok(Ok(summary)),
          Err(e) if is_constraint_violation(&e) => Ok(Err(pantry_core::Error::Conflict(
            format!("recipe is already in {}", kind.collection()),
          ))),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let summary = outcome?.into_summary()?;
    tracing::debug!(%user_id, %recipe_id, relation = %kind, "added relation");
    Ok(summary)
  }

  async fn remove_relation(
    &self,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
  ) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let recipe_str = encode_uuid(recipe_id);

    let outcome: pantry_core::Result<()> = self
      .conn
      .call(move |conn| {
        if !row_exists(conn, "SELECT 1 FROM recipes WHERE recipe_id = ?1", &recipe_str)? {
          return Ok(Err(pantry_core::Error::not_found("recipe", recipe_id)));
        }
        let removed = conn.execute(
          &format!(
            "DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2",
            relation_table(kind)
          ),
          params![user_str, recipe_str],
        )?;
        if removed == 0 {
          return Ok(Err(pantry_core::Error::AlreadyRemoved(format!(
            "recipe is not in {}",
            kind.collection()
          ))));
        }
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    tracing::debug!(%user_id, %recipe_id, relation = %kind, "removed relation");
    Ok(())
  }

  async fn cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
    let user_str = encode_uuid(user_id);
    let rows: Vec<(String, String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT i.name, i.measurement_unit, ri.amount
           FROM shopping_carts c
           JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
           JOIN ingredients i ON i.ingredient_id = ri.ingredient_id
           WHERE c.user_id = ?1",
        )?;
        let rows = stmt
          .query_map(params![user_str], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(name, measurement_unit, amount)| {
        Ok(CartLine { name, measurement_unit, amount: decode_u32("amount", amount)? })
      })
      .collect()
  }

  // ── Subscriptions ─────────────────────────────────────────────────────

  async fn subscribe(&self, subscriber_id: Uuid, author_id: Uuid) -> Result<User> {
    let subscriber_str = encode_uuid(subscriber_id);
    let author_str = encode_uuid(author_id);
    let created_at = encode_dt(now());

    let outcome: pantry_core::Result<RawUser> = self
      .conn
      .call(move |conn| {
        let author = conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
            params![author_str],
            |row| RawUser::from_row(row, 0),
          )
          .optional()?;
        let Some(author) = author else {
          return Ok(Err(pantry_core::Error::not_found("user", author_id)));
        };
        if subscriber_id == author_id {
          return Ok(Err(pantry_core::Error::SelfSubscribe));
        }

        let inserted = conn.execute(
          "INSERT INTO subscriptions (subscriber_id, author_id, created_at)
           VALUES (?1, ?2, ?3)",
          params![subscriber_str, author_str, created_at],
        );
        match inserted {
          Ok(_) => Ok(Ok(author)),
          Err(e) if is_constraint_violation(&e) => Ok(Err(pantry_core::Error::Conflict(
            "already subscribed to this author".to_owned(),
          ))),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let author = outcome?.into_user()?;
    tracing::debug!(%subscriber_id, %author_id, "subscribed");
    Ok(author)
  }

  async fn unsubscribe(&self, subscriber_id: Uuid, author_id: Uuid) -> Result<()> {
    let subscriber_str = encode_uuid(subscriber_id);
    let author_str = encode_uuid(author_id);

    let outcome: pantry_core::Result<()> = self
      .conn
      .call(move |conn| {
        if !row_exists(conn, "SELECT 1 FROM users WHERE user_id = ?1", &author_str)? {
          return Ok(Err(pantry_core::Error::not_found("user", author_id)));
        }
        let removed = conn.execute(
          "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND author_id = ?2",
          params![subscriber_str, author_str],
        )?;
        if removed == 0 {
          return Ok(Err(pantry_core::Error::AlreadyRemoved(
            "not subscribed to this author".to_owned(),
          )));
        }
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    tracing::debug!(%subscriber_id, %author_id, "unsubscribed");
    Ok(())
  }

  async fn list_subscriptions(
    &self,
    subscriber_id: Uuid,
    page: PageRequest,
  ) -> Result<Page<User>> {
    let subscriber_str = encode_uuid(subscriber_id);
    let (limit, offset) = page_bounds(page);

    let (count, raws): (i64, Vec<RawUser>) = self
      .conn
      .call(move |conn| {
        let count = conn.query_row(
          "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1",
          params![subscriber_str],
          |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS}
           FROM subscriptions s
           JOIN users u ON u.user_id = s.author_id
           WHERE s.subscriber_id = ?1
           ORDER BY u.username
           LIMIT ?2 OFFSET ?3"
        ))?;
        let raws = stmt
          .query_map(params![subscriber_str, limit, offset], |row| RawUser::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((count, raws))
      })
      .await?;

    let authors = raws.into_iter().map(RawUser::into_user).collect::<Result<Vec<_>>>()?;
    Ok(Page::new(authors, decode_u64("count", count)?, page))
  }

  // ── Viewer state ──────────────────────────────────────────────────────

  async fn viewer_state(
    &self,
    user_id: Uuid,
    recipe_ids: Vec<Uuid>,
    author_ids: Vec<Uuid>,
  ) -> Result<ViewerState> {
    let user_str = encode_uuid(user_id);
    let recipes: Vec<String> = recipe_ids.into_iter().map(encode_uuid).collect();
    let authors: Vec<String> = author_ids.into_iter().map(encode_uuid).collect();

    let (favorited, in_cart, subscribed) = self
      .conn
      .call(move |conn| {
        let favorited = matching_ids(
          conn,
          "SELECT recipe_id FROM favorites WHERE user_id = ? AND recipe_id",
          &user_str,
          &recipes,
        )?;
        let in_cart = matching_ids(
          conn,
          "SELECT recipe_id FROM shopping_carts WHERE user_id = ? AND recipe_id",
          &user_str,
          &recipes,
        )?;
        let subscribed = matching_ids(
          conn,
          "SELECT author_id FROM subscriptions WHERE subscriber_id = ? AND author_id",
          &user_str,
          &authors,
        )?;
        Ok((favorited, in_cart, subscribed))
      })
      .await?;

    Ok(ViewerState {
      favorited:  decode_ids(favorited)?,
      in_cart:    decode_ids(in_cart)?,
      subscribed: decode_ids(subscribed)?,
    })
  }
}
