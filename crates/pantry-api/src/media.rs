//! Content-addressed storage for uploaded recipe images.

use std::path::{Path, PathBuf};

use pantry_core::image::DecodedImage;
use sha2::{Digest, Sha256};

/// Directory under the media root that recipe images are written to.
pub const IMAGE_DIR: &str = "recipes/images";

/// Writes decoded images below a media root directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
  root: PathBuf,
}

impl MediaStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Path of `image` relative to the media root: the SHA-256 of its bytes
  /// plus its extension.
  pub fn relative_path(image: &DecodedImage) -> String {
    let digest = Sha256::digest(&image.bytes);
    format!("{IMAGE_DIR}/{}.{}", hex::encode(digest), image.extension)
  }

  /// Write `image` unless an identical upload is already stored.
  pub async fn save(&self, image: &DecodedImage) -> std::io::Result<SavedImage> {
    let relative = Self::relative_path(image);
    let path = self.root.join(&relative);
    if tokio::fs::try_exists(&path).await? {
      return Ok(SavedImage { path: relative, created: false });
    }
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &image.bytes).await?;
    tracing::debug!(path = %path.display(), bytes = image.bytes.len(), "stored image");
    Ok(SavedImage { path: relative, created: true })
  }

  /// Remove an image written for a recipe the store then rejected. Files
  /// that were already present are shared with other uploads and stay.
  pub async fn discard(&self, saved: &SavedImage) {
    if !saved.created {
      return;
    }
    let path = self.root.join(&saved.path);
    match tokio::fs::remove_file(&path).await {
      Ok(()) => tracing::debug!(path = %path.display(), "removed unused image"),
      Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove unused image"),
    }
  }
}

/// Result of [`MediaStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
  /// Relative to the media root.
  pub path:    String,
  /// `false` when an identical file was already stored.
  pub created: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn image(bytes: &[u8]) -> DecodedImage {
    DecodedImage { extension: "png".into(), bytes: bytes.to_vec() }
  }

  #[test]
  fn path_is_content_addressed() {
    let a = MediaStore::relative_path(&image(b"one"));
    assert!(a.starts_with("recipes/images/"));
    assert!(a.ends_with(".png"));
    assert_eq!(a, MediaStore::relative_path(&image(b"one")));
    assert_ne!(a, MediaStore::relative_path(&image(b"two")));
  }

  #[tokio::test]
  async fn identical_uploads_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let media = MediaStore::new(dir.path());

    let first = media.save(&image(b"pixels")).await.unwrap();
    let second = media.save(&image(b"pixels")).await.unwrap();
    assert_eq!(first.path, second.path);
    assert!(first.created);
    assert!(!second.created);

    let stored = std::fs::read(dir.path().join(&first.path)).unwrap();
    assert_eq!(stored, b"pixels");
    let entries = std::fs::read_dir(dir.path().join(IMAGE_DIR)).unwrap().count();
    assert_eq!(entries, 1);
  }

  #[tokio::test]
  async fn discard_only_removes_files_it_created() {
    let dir = tempfile::tempdir().unwrap();
    let media = MediaStore::new(dir.path());

    let kept = media.save(&image(b"shared")).await.unwrap();
    let reused = media.save(&image(b"shared")).await.unwrap();
    media.discard(&reused).await;
    assert!(dir.path().join(&kept.path).exists());

    let fresh = media.save(&image(b"fresh")).await.unwrap();
    media.discard(&fresh).await;
    assert!(!dir.path().join(&fresh.path).exists());
  }
}
