use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::foundation::core::FrameIndex;

#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl AssetResolver for CountingResolver {
    async fn resolve(
        &self,
        src: &str,
        fingerprint: AssetFingerprint,
        cache_dir: &Path,
    ) -> FramecastResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if src.starts_with("bad:") {
            return Err(FramecastError::asset_resolution(format!("cannot fetch {src}")));
        }
        Ok(cache_dir.join(fingerprint.to_string()))
    }
}

#[tokio::test]
async fn identical_fingerprints_resolve_once() {
    let resolver = Arc::new(CountingResolver::default());
    let pipeline = AssetPipeline::new(resolver.clone(), "/cache");

    let a = pipeline.submit(vec![AssetDescriptor::audio("x", "song.mp3", FrameIndex(0))]);
    let b = pipeline.submit(vec![
        AssetDescriptor::audio("y", "song.mp3", FrameIndex(9)),
        AssetDescriptor::audio("z", "voice.mp3", FrameIndex(9)),
    ]);
    assert_eq!(a[0].1, b[0].1);

    let paths = pipeline.finish().await.unwrap();
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.resolutions_started(), 2);
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[&a[0].1], Path::new("/cache").join(a[0].1.to_string()));
}

#[tokio::test]
async fn failure_surfaces_at_checkpoint_and_barrier() {
    let resolver = Arc::new(CountingResolver::default());
    let pipeline = AssetPipeline::new(resolver, "/cache");
    assert!(pipeline.check().is_ok());

    pipeline.submit(vec![AssetDescriptor::audio("x", "bad:song.mp3", FrameIndex(0))]);
    let err = pipeline.finish().await.unwrap_err();
    assert!(matches!(err, FramecastError::AssetResolution(_)));
    assert!(matches!(
        pipeline.check(),
        Err(FramecastError::AssetResolution(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submitters_do_not_lose_entries() {
    let resolver = Arc::new(CountingResolver::default());
    let pipeline = AssetPipeline::new(resolver.clone(), "/cache");

    let mut handles = Vec::new();
    for t in 0..8u64 {
        let p = pipeline.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..16u64 {
                p.submit(vec![AssetDescriptor::audio(
                    "a",
                    format!("clip-{}.wav", (t + i) % 10),
                    FrameIndex(i),
                )]);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let paths = pipeline.finish().await.unwrap();
    assert_eq!(paths.len(), 10);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 10);
}
