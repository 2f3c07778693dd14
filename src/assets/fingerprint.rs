use xxhash_rust::xxh3::Xxh3;

use crate::assets::AssetDescriptor;

const XXH3_SEED: u64 = 0x3c6e_f372_fe94_f82b;

/// Stable 128-bit identity of an asset reference, used to resolve each asset once per run.
///
/// Only the kind and the source reference are hashed; the frame, volume and playback fields
/// describe how the asset is used, not what it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetFingerprint {
    pub hi: u64,
    pub lo: u64,
}

impl std::fmt::Display for AssetFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

impl serde::Serialize for AssetFingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn fingerprint_asset(asset: &AssetDescriptor) -> AssetFingerprint {
    let mut h = StableHasher::new();
    h.write_u8(asset.kind.tag());
    h.write_str(&asset.src);
    h.finish()
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    // Length-prefixed so adjacent strings cannot alias.
    fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> AssetFingerprint {
        let v = self.inner.digest128();
        AssetFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fingerprint.rs"]
mod tests;
