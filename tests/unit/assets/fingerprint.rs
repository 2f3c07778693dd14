use super::*;
use crate::assets::AssetKind;
use crate::foundation::core::FrameIndex;

#[test]
fn usage_fields_do_not_change_identity() {
    let a = AssetDescriptor::audio("a", "music/theme.mp3", FrameIndex(0));
    let mut b = AssetDescriptor::audio("b", "music/theme.mp3", FrameIndex(40));
    b.volume = 0.25;
    b.playback_rate = 2.0;
    assert_eq!(fingerprint_asset(&a), fingerprint_asset(&b));
}

#[test]
fn source_and_kind_change_identity() {
    let a = AssetDescriptor::audio("a", "music/theme.mp3", FrameIndex(0));
    let other_src = AssetDescriptor::audio("a", "music/outro.mp3", FrameIndex(0));
    let mut other_kind = a.clone();
    other_kind.kind = AssetKind::Video;
    assert_ne!(fingerprint_asset(&a), fingerprint_asset(&other_src));
    assert_ne!(fingerprint_asset(&a), fingerprint_asset(&other_kind));
}

#[test]
fn display_is_32_hex_digits() {
    let fp = fingerprint_asset(&AssetDescriptor::audio("a", "x.wav", FrameIndex(0)));
    let s = fp.to_string();
    assert_eq!(s.len(), 32);
    assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(serde_json::to_value(fp).unwrap(), serde_json::Value::String(s));
}
