use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::assets::AssetFingerprint;
use crate::foundation::error::{FramecastError, FramecastResult};

/// Maps an asset reference to a locally addressable file.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    /// Materialize `src` under `cache_dir` and return the local path.
    async fn resolve(
        &self,
        src: &str,
        fingerprint: AssetFingerprint,
        cache_dir: &Path,
    ) -> FramecastResult<PathBuf>;
}

/// Resolves plain paths and `file://` URLs by copying them into the cache directory.
///
/// Relative paths are taken relative to `base_dir`. Copies are named after the fingerprint so a
/// cache directory can be shared across runs.
#[derive(Clone, Debug)]
pub struct FsAssetResolver {
    base_dir: PathBuf,
}

impl FsAssetResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn source_path(&self, src: &str) -> FramecastResult<PathBuf> {
        let raw = if let Some(rest) = src.strip_prefix("file://") {
            rest
        } else if let Some((scheme, _)) = src.split_once("://") {
            return Err(FramecastError::asset_resolution(format!(
                "unsupported asset scheme '{scheme}' in '{src}'"
            )));
        } else {
            src
        };
        if raw.is_empty() {
            return Err(FramecastError::asset_resolution("asset src must be non-empty"));
        }
        let p = Path::new(raw);
        Ok(if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        })
    }
}

#[async_trait]
impl AssetResolver for FsAssetResolver {
    async fn resolve(
        &self,
        src: &str,
        fingerprint: AssetFingerprint,
        cache_dir: &Path,
    ) -> FramecastResult<PathBuf> {
        let from = self.source_path(src)?;
        let file_name = match from.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{fingerprint}.{ext}"),
            None => fingerprint.to_string(),
        };
        let to = cache_dir.join(file_name);

        if tokio::fs::try_exists(&to).await.unwrap_or(false) {
            tracing::debug!(src, path = %to.display(), "asset cache hit");
            return Ok(to);
        }

        tokio::fs::create_dir_all(cache_dir).await.map_err(|e| {
            FramecastError::asset_resolution(format!(
                "create cache dir '{}': {e}",
                cache_dir.display()
            ))
        })?;
        tokio::fs::copy(&from, &to).await.map_err(|e| {
            FramecastError::asset_resolution(format!(
                "copy '{}' -> '{}': {e}",
                from.display(),
                to.display()
            ))
        })?;
        tracing::debug!(src, path = %to.display(), "asset resolved");
        Ok(to)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resolver.rs"]
mod tests;
