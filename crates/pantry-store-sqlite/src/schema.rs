//! SQL schema for the Pantry SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    username      TEXT NOT NULL UNIQUE,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    password_hash TEXT NOT NULL,   -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- Catalog: written only by the seed command.
CREATE TABLE IF NOT EXISTS tags (
    tag_id TEXT PRIMARY KEY,
    name   TEXT NOT NULL UNIQUE,
    color  TEXT NOT NULL DEFAULT '#FF0000',
    slug   TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS ingredients (
    ingredient_id    TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    measurement_unit TEXT NOT NULL,
    UNIQUE (name, measurement_unit)
);

CREATE TABLE IF NOT EXISTS recipes (
    recipe_id    TEXT PRIMARY KEY,
    author_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    image        TEXT NOT NULL,    -- path relative to the media root
    text         TEXT NOT NULL,
    cooking_time INTEGER NOT NULL CHECK (cooking_time >= 1),
    created_at   TEXT NOT NULL
);

-- Replaced wholesale on every recipe update.
CREATE TABLE IF NOT EXISTS recipe_ingredients (
    recipe_id     TEXT NOT NULL REFERENCES recipes(recipe_id) ON DELETE CASCADE,
    ingredient_id TEXT NOT NULL REFERENCES ingredients(ingredient_id),
    amount        INTEGER NOT NULL CHECK (amount >= 1),
    PRIMARY KEY (recipe_id, ingredient_id)
);

CREATE TABLE IF NOT EXISTS recipe_tags (
    recipe_id TEXT NOT NULL REFERENCES recipes(recipe_id) ON DELETE CASCADE,
    tag_id    TEXT NOT NULL REFERENCES tags(tag_id),
    PRIMARY KEY (recipe_id, tag_id)
);

-- Relation rows; the primary key doubles as the uniqueness constraint that
-- settles concurrent adds.
CREATE TABLE IF NOT EXISTS favorites (
    user_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    recipe_id  TEXT NOT NULL REFERENCES recipes(recipe_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, recipe_id)
);

CREATE TABLE IF NOT EXISTS shopping_carts (
    user_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    recipe_id  TEXT NOT NULL REFERENCES recipes(recipe_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, recipe_id)
);

CREATE TABLE IF NOT EXISTS subscriptions (
    subscriber_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    author_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    created_at    TEXT NOT NULL,
    PRIMARY KEY (subscriber_id, author_id),
    CHECK (subscriber_id != author_id)
);

CREATE INDEX IF NOT EXISTS recipes_author_idx       ON recipes(author_id);
CREATE INDEX IF NOT EXISTS recipes_created_idx      ON recipes(created_at);
CREATE INDEX IF NOT EXISTS ingredients_name_idx     ON ingredients(name);
CREATE INDEX IF NOT EXISTS favorites_recipe_idx     ON favorites(recipe_id);
CREATE INDEX IF NOT EXISTS shopping_carts_recipe_idx ON shopping_carts(recipe_id);
CREATE INDEX IF NOT EXISTS subscriptions_author_idx ON subscriptions(author_id);

PRAGMA user_version = 1;
";
