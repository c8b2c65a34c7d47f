//! The `server` binary: serves the Pantry JSON API and uploaded media.
//!
//! Settings come from a TOML file (`--config`, default `config.toml`) and
//! `PANTRY_*` environment variables; see `config.example.toml`.
//!
//! # Seeding the catalog
//!
//! ```text
//! cargo run -p pantry-api --bin server -- seed catalog.json
//! ```
//!
//! where `catalog.json` is `{"tags": [...], "ingredients": [...]}`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pantry_api::{AppState, ServerConfig, auth};
use pantry_core::{catalog::CatalogSeed, store::RecipeStore as _};
use pantry_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pantry recipe server")]
struct Cli {
  /// TOML settings file; missing is fine if the environment covers it.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash a password read from stdin with argon2, print it and exit.
  #[arg(long)]
  hash_password: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Load tags and ingredients from a JSON file, skipping existing rows.
  Seed {
    /// `{"tags": [...], "ingredients": [...]}`
    file: PathBuf,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = prompt_password()?;
    let hash = auth::hash_password(&password).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = load_config(&cli.config)?;
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("cannot open database {:?}", server_cfg.store_path))?;

  match cli.command {
    Some(Command::Seed { file }) => seed(&store, &file).await,
    None => serve(store, server_cfg).await,
  }
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let mut cfg: ServerConfig = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("PANTRY"))
    .build()
    .with_context(|| format!("cannot read settings from {path:?}"))?
    .try_deserialize()
    .context("invalid server settings")?;
  cfg.store_path = home_relative(&cfg.store_path);
  cfg.media_dir = home_relative(&cfg.media_dir);
  Ok(cfg)
}

async fn seed(store: &SqliteStore, file: &Path) -> anyhow::Result<()> {
  let raw = tokio::fs::read_to_string(file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let seed = CatalogSeed::from_json(&raw).context("malformed catalog file")?;
  let report = store.seed_catalog(seed).await.context("failed to seed catalog")?;
  tracing::info!(
    tags = report.tags,
    ingredients = report.ingredients,
    "catalog rows inserted"
  );
  Ok(())
}

async fn serve(store: SqliteStore, cfg: ServerConfig) -> anyhow::Result<()> {
  tokio::fs::create_dir_all(&cfg.media_dir)
    .await
    .with_context(|| format!("failed to create media dir {:?}", cfg.media_dir))?;

  let bind_to = format!("{}:{}", cfg.host, cfg.port);
  let listener = TcpListener::bind(&bind_to)
    .await
    .with_context(|| format!("cannot listen on {bind_to}"))?;
  tracing::info!(address = %bind_to, media = ?cfg.media_dir, "pantry is up");

  let app = pantry_api::router(AppState::new(store, cfg));
  axum::serve(listener, app).await.context("server stopped with an error")
}

fn prompt_password() -> anyhow::Result<String> {
  use std::io::{BufRead as _, Write as _};
  eprint!("Password: ");
  std::io::stderr().flush().ok();
  let mut input = String::new();
  std::io::stdin().lock().read_line(&mut input)?;
  Ok(input.trim_end_matches(['\n', '\r']).to_owned())
}

/// `~/x` becomes `$HOME/x`; anything else is returned unchanged.
fn home_relative(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
