//! Source change detection.

use xxhash_rust::xxh64::xxh64;

const SOURCE_SEED: u64 = 0x5543_5343_5249_5054;

/// Content hash of a class's source text, recorded at Pass 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct SourceHash(pub u64);

impl SourceHash {
    pub fn of(text: &str) -> Self {
        SourceHash(xxh64(text.as_bytes(), SOURCE_SEED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        assert_eq!(SourceHash::of("class A;"), SourceHash::of("class A;"));
        assert_ne!(SourceHash::of("class A;"), SourceHash::of("class B;"));
    }
}
