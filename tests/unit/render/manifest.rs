use super::*;
use crate::assets::AssetDescriptor;
use crate::assets::fingerprint::fingerprint_asset;
use crate::foundation::core::FrameIndex;
use crate::render::options::CompositionSpec;

fn comp(frames: u64) -> CompositionSpec {
    CompositionSpec {
        width: 16,
        height: 9,
        fps: 30.0,
        duration_in_frames: frames,
    }
}

fn filled(plan: &RenderPlan, assets: &[AssetDescriptor]) -> Vec<OnceLock<DiscoveredAssets>> {
    // Fill in reverse to make sure ordering comes from the output index.
    let slots: Vec<OnceLock<DiscoveredAssets>> = (0..plan.len()).map(|_| OnceLock::new()).collect();
    for position in (0..plan.len()).rev() {
        let frame = plan.frames()[position];
        let found = assets
            .iter()
            .filter(|a| a.frame == frame)
            .map(|a| (a.clone(), fingerprint_asset(a)))
            .collect();
        slots[position]
            .set(DiscoveredAssets {
                output_index: plan.output_index(position),
                frame,
                assets: found,
            })
            .unwrap();
    }
    slots
}

#[test]
fn records_are_ordered_by_output_index_with_resolved_paths() {
    let plan = RenderPlan::build(&comp(20), None, 5).unwrap();
    let music = [
        AssetDescriptor::audio("music", "a.mp3", FrameIndex(5)),
        AssetDescriptor::audio("music", "a.mp3", FrameIndex(10)),
    ];
    let slots = filled(&plan, &music);
    let fp = fingerprint_asset(&music[0]);
    let resolved = HashMap::from([(fp, PathBuf::from("/cache/a.mp3"))]);

    let m = assemble(&plan, ImageFormat::Png, &slots, &resolved, RunStats::default()).unwrap();
    assert_eq!(m.frame_count, 4);
    assert_eq!(m.first_output_index, 0);
    assert_eq!(m.naming_template, "element-%01d.png");
    let indices: Vec<u64> = m.per_frame_assets.iter().map(|r| r.output_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert!(m.per_frame_assets[0].assets.is_empty());
    assert_eq!(m.per_frame_assets[1].assets.len(), 1);
    assert_eq!(
        m.per_frame_assets[1].assets[0].local_path,
        m.per_frame_assets[2].assets[0].local_path
    );
}

#[test]
fn empty_slot_is_fatal() {
    let plan = RenderPlan::build(&comp(3), None, 1).unwrap();
    let slots: Vec<OnceLock<DiscoveredAssets>> = (0..3).map(|_| OnceLock::new()).collect();
    let err = assemble(&plan, ImageFormat::Png, &slots, &HashMap::new(), RunStats::default())
        .unwrap_err();
    assert!(err.to_string().contains("no asset record for output index 0"));
}

#[test]
fn unresolved_fingerprint_is_fatal() {
    let plan = RenderPlan::build(&comp(1), None, 1).unwrap();
    let slots = filled(&plan, &[AssetDescriptor::audio("a", "a.wav", FrameIndex(0))]);
    let err = assemble(&plan, ImageFormat::Png, &slots, &HashMap::new(), RunStats::default())
        .unwrap_err();
    assert!(matches!(err, FramecastError::Fatal(_)));
}

#[test]
fn serialized_manifest_uses_encoder_field_names() {
    let plan = RenderPlan::build(&comp(12), Some(crate::plan::FrameRange::Span([3, 11])), 1)
        .unwrap();
    let slots = filled(&plan, &[]);
    let m = assemble(&plan, ImageFormat::Jpeg, &slots, &HashMap::new(), RunStats::default())
        .unwrap();
    let v = serde_json::to_value(&m).unwrap();
    assert_eq!(v["namingTemplate"], "element-%02d.jpeg");
    assert_eq!(v["firstOutputIndex"], 3);
    assert_eq!(v["frameCount"], 9);
    assert_eq!(v["perFrameAssets"].as_array().unwrap().len(), 9);
    assert!(v.get("stats").is_none());
}
