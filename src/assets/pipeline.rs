//! Background, deduplicated asset resolution.
//!
//! Frame tasks hand over what they discovered and move on. Each fingerprint is resolved at most
//! once per run; resolution runs on its own task set and reports failures through a shared slot
//! that frame tasks poll at their next checkpoint. The set is joined only at the aggregation
//! barrier.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;

use crate::assets::fingerprint::fingerprint_asset;
use crate::assets::resolver::AssetResolver;
use crate::assets::{AssetDescriptor, AssetFingerprint};
use crate::foundation::error::{FramecastError, FramecastResult};

enum Resolution {
    Pending,
    Ready(PathBuf),
}

#[derive(Default)]
struct PipelineState {
    resolutions: HashMap<AssetFingerprint, Resolution>,
    tasks: JoinSet<()>,
    failure: Option<FramecastError>,
    started: usize,
}

pub struct AssetPipeline {
    resolver: Arc<dyn AssetResolver>,
    cache_dir: PathBuf,
    state: Mutex<PipelineState>,
}

impl AssetPipeline {
    pub fn new(resolver: Arc<dyn AssetResolver>, cache_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            cache_dir: cache_dir.into(),
            state: Mutex::new(PipelineState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fingerprint `assets` and start resolving every fingerprint not seen before in this run.
    ///
    /// Must be called from within a Tokio runtime. Never waits on resolution.
    pub fn submit(
        self: &Arc<Self>,
        assets: Vec<AssetDescriptor>,
    ) -> Vec<(AssetDescriptor, AssetFingerprint)> {
        let mut out = Vec::with_capacity(assets.len());
        let mut state = self.lock();
        for asset in assets {
            let fp = fingerprint_asset(&asset);
            if !state.resolutions.contains_key(&fp) {
                state.resolutions.insert(fp, Resolution::Pending);
                state.started += 1;
                let this = Arc::clone(self);
                let src = asset.src.clone();
                state.tasks.spawn(async move { this.resolve_one(src, fp).await });
            }
            out.push((asset, fp));
        }
        out
    }

    async fn resolve_one(&self, src: String, fp: AssetFingerprint) {
        let result = self.resolver.resolve(&src, fp, &self.cache_dir).await;
        let mut state = self.lock();
        match result {
            Ok(path) => {
                state.resolutions.insert(fp, Resolution::Ready(path));
            }
            Err(err) => {
                tracing::warn!(src, fingerprint = %fp, error = %err, "asset resolution failed");
                if state.failure.is_none() {
                    state.failure = Some(match err {
                        FramecastError::AssetResolution(_) => err,
                        other => FramecastError::asset_resolution(format!("{src}: {other}")),
                    });
                }
            }
        }
    }

    /// First resolution failure so far, if any.
    pub fn check(&self) -> FramecastResult<()> {
        match &self.lock().failure {
            Some(err) => Err(err.duplicate()),
            None => Ok(()),
        }
    }

    /// Number of distinct fingerprints handed to the resolver.
    pub fn resolutions_started(&self) -> usize {
        self.lock().started
    }

    /// Stop outstanding resolutions. Used when the run has already failed.
    pub fn abort(&self) {
        self.lock().tasks.abort_all();
    }

    /// Join every outstanding resolution and return the fingerprint -> local path map.
    pub async fn finish(&self) -> FramecastResult<HashMap<AssetFingerprint, PathBuf>> {
        let mut tasks = std::mem::take(&mut self.lock().tasks);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                let mut state = self.lock();
                if state.failure.is_none() {
                    state.failure = Some(FramecastError::asset_resolution(format!(
                        "resolution task failed: {e}"
                    )));
                }
            }
        }
        self.check()?;

        let state = self.lock();
        let mut out = HashMap::with_capacity(state.resolutions.len());
        for (fp, res) in &state.resolutions {
            match res {
                Resolution::Ready(path) => {
                    out.insert(*fp, path.clone());
                }
                Resolution::Pending => {
                    return Err(FramecastError::fatal(format!(
                        "asset {fp} still pending after resolution barrier"
                    )));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/pipeline.rs"]
mod tests;
