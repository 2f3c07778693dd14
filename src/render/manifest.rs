use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::assets::{AssetFingerprint, AssetRecord, DiscoveredAssets, ResolvedAsset};
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::plan::RenderPlan;
use crate::render::options::ImageFormat;
use crate::render::pool::WorkerPoolStats;

/// What the encoding stage consumes after a successful run.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderManifest {
    /// One record per planned frame, ordered by output index.
    pub per_frame_assets: Vec<AssetRecord>,
    /// `element-%0Nd.<ext>`.
    pub naming_template: String,
    pub first_output_index: u64,
    pub frame_count: usize,
    #[serde(skip)]
    pub stats: RunStats,
}

/// Counters describing how a run went. Not part of the serialized manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub concurrency: usize,
    pub frames_rendered: usize,
    pub retries: u32,
    pub host_replacements: u64,
    pub max_busy_workers: usize,
    pub distinct_assets: usize,
}

impl RunStats {
    pub(crate) fn from_pool(pool: WorkerPoolStats, capacity: usize) -> Self {
        Self {
            concurrency: capacity,
            max_busy_workers: pool.max_busy,
            host_replacements: pool.replacements,
            ..Self::default()
        }
    }
}

/// Join the per-frame slots with the resolved paths into an ordered manifest.
///
/// Every slot must be filled and every fingerprint must have a local path; anything else means a
/// task reported success without recording its frame.
pub(crate) fn assemble(
    plan: &RenderPlan,
    format: ImageFormat,
    slots: &[OnceLock<DiscoveredAssets>],
    resolved: &HashMap<AssetFingerprint, PathBuf>,
    stats: RunStats,
) -> FramecastResult<RenderManifest> {
    if slots.len() != plan.len() {
        return Err(FramecastError::fatal(format!(
            "{} asset slots for {} planned frames",
            slots.len(),
            plan.len()
        )));
    }

    let mut records = Vec::with_capacity(slots.len());
    for (position, slot) in slots.iter().enumerate() {
        let Some(found) = slot.get() else {
            return Err(FramecastError::fatal(format!(
                "no asset record for output index {}",
                plan.output_index(position)
            )));
        };
        let mut assets = Vec::with_capacity(found.assets.len());
        for (descriptor, fp) in &found.assets {
            let local_path = resolved.get(fp).cloned().ok_or_else(|| {
                FramecastError::fatal(format!("asset {fp} ({}) was never resolved", descriptor.src))
            })?;
            assets.push(ResolvedAsset {
                descriptor: descriptor.clone(),
                fingerprint: *fp,
                local_path,
            });
        }
        records.push(AssetRecord {
            output_index: found.output_index,
            frame: found.frame,
            assets,
        });
    }
    records.sort_by_key(|r| r.output_index);

    Ok(RenderManifest {
        per_frame_assets: records,
        naming_template: plan.naming_template(format),
        first_output_index: plan.first_output_index(),
        frame_count: plan.len(),
        stats,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/manifest.rs"]
mod tests;
