//! gd-save: run-length-encoded level persistence.
//!
//! Grid layers (features, flags, elevation) persist as streams of
//! `(run_length, value)` byte pairs. The writer emits a pair whenever
//! the value changes or a run would overflow the 8-bit counter, and
//! always flushes the final pending run; a writer that forgets the
//! flush silently drops the last run of every stream (an all-equal grid
//! encodes to nothing at all).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gd_core::Cave;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot truncated: dangling run header")]
    Truncated,

    #[error("snapshot decodes to {got} cells, expected {expected}")]
    WrongLength { expected: usize, got: usize },

    #[error("incompatible snapshot version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },
}

/// Encode a byte stream as `(run_length, value)` pairs.
pub fn rle_encode(values: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut count: u8 = 0;
    let mut prev: u8 = 0;

    for &value in values {
        if value != prev || count == u8::MAX {
            if count > 0 {
                out.push(count);
                out.push(prev);
            }
            prev = value;
            count = 1;
        } else {
            count += 1;
        }
    }

    // Flush the final pending run; without this an all-equal stream
    // writes zero bytes.
    if count > 0 {
        out.push(count);
        out.push(prev);
    }

    out
}

/// Decode a stream of `(run_length, value)` pairs.
pub fn rle_decode(stream: &[u8]) -> Result<Vec<u8>, SaveError> {
    if stream.len() % 2 != 0 {
        return Err(SaveError::Truncated);
    }
    let mut out = Vec::new();
    for pair in stream.chunks_exact(2) {
        let count = pair[0] as usize;
        let value = pair[1];
        out.extend(std::iter::repeat(value).take(count));
    }
    Ok(out)
}

/// A persisted level: the grid layers, run-length encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub version: u32,
    pub height: i32,
    pub width: i32,
    pub features: Vec<u8>,
    pub flags: Vec<u8>,
    pub elevation: Vec<u8>,
}

impl LevelSnapshot {
    /// Capture a cave's terrain layers.
    pub fn capture(cave: &Cave) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            height: cave.height(),
            width: cave.width(),
            features: rle_encode(&cave.feature_stream()),
            flags: rle_encode(&cave.flag_stream()),
            elevation: rle_encode(&cave.elevation_stream()),
        }
    }

    /// Decode one layer, verifying the cell count.
    fn expand(&self, stream: &[u8]) -> Result<Vec<u8>, SaveError> {
        let expected = (self.height * self.width) as usize;
        let out = rle_decode(stream)?;
        if out.len() != expected {
            return Err(SaveError::WrongLength {
                expected,
                got: out.len(),
            });
        }
        Ok(out)
    }

    pub fn features(&self) -> Result<Vec<u8>, SaveError> {
        self.expand(&self.features)
    }

    pub fn flags(&self) -> Result<Vec<u8>, SaveError> {
        self.expand(&self.flags)
    }

    pub fn elevation(&self) -> Result<Vec<u8>, SaveError> {
        self.expand(&self.elevation)
    }

    pub fn validate(&self) -> Result<(), SaveError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SaveError::IncompatibleVersion {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        self.features()?;
        self.flags()?;
        self.elevation()?;
        Ok(())
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes and validate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaveError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_grid_flushes_a_single_run() {
        // A 10x10 grid of zeros: without the terminal flush this writes
        // nothing; with it, exactly one (100, 0) pair.
        let cells = vec![0u8; 100];
        let encoded = rle_encode(&cells);
        assert_eq!(encoded, vec![100, 0]);
        assert_eq!(rle_decode(&encoded).unwrap(), cells);
    }

    #[test]
    fn split_runs_flush_the_tail() {
        // 50 zeros then 50 ones: the missing flush would drop the ones.
        let mut cells = vec![0u8; 50];
        cells.extend(vec![1u8; 50]);
        let encoded = rle_encode(&cells);
        assert_eq!(encoded, vec![50, 0, 50, 1]);
        assert_eq!(rle_decode(&encoded).unwrap(), cells);
    }

    #[test]
    fn long_runs_split_at_the_counter_limit() {
        let cells = vec![7u8; 600];
        let encoded = rle_encode(&cells);
        assert_eq!(encoded, vec![255, 7, 255, 7, 90, 7]);
        assert_eq!(rle_decode(&encoded).unwrap(), cells);
    }

    #[test]
    fn round_trip_arbitrary_streams() {
        let mut streams: Vec<Vec<u8>> = vec![
            Vec::new(),
            vec![1],
            vec![1, 2, 3, 4],
            vec![9; 255],
            vec![9; 256],
        ];
        // A deterministic pseudo-random stream.
        let mut x: u32 = 0x2545_F491;
        let mut noisy = Vec::new();
        for _ in 0..4096 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            noisy.push((x % 7) as u8);
        }
        streams.push(noisy);

        for stream in streams {
            let encoded = rle_encode(&stream);
            let decoded = rle_decode(&encoded).unwrap();
            assert_eq!(decoded, stream);
            // Encoding is canonical: re-encoding the decode is stable.
            assert_eq!(rle_encode(&decoded), encoded);
        }
    }

    #[test]
    fn truncated_stream_is_rejected() {
        assert!(matches!(rle_decode(&[5]), Err(SaveError::Truncated)));
    }

    #[test]
    fn snapshot_round_trips_a_cave() {
        use gd_core::Feature;
        let mut cave = Cave::new();
        for y in 1..cave.height() - 1 {
            for x in 1..cave.width() - 1 {
                let feat = if (x + y) % 5 == 0 {
                    Feature::WallExtra
                } else {
                    Feature::Floor
                };
                cave.set_feat(y, x, feat);
            }
        }
        let snapshot = LevelSnapshot::capture(&cave);
        snapshot.validate().expect("valid");
        assert_eq!(snapshot.features().unwrap(), cave.feature_stream());
        assert_eq!(snapshot.flags().unwrap(), cave.flag_stream());
        assert_eq!(snapshot.elevation().unwrap(), cave.elevation_stream());

        let bytes = snapshot.to_bytes().expect("serializes");
        let restored = LevelSnapshot::from_bytes(&bytes).expect("deserializes");
        assert_eq!(restored.features().unwrap(), cave.feature_stream());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let cave = Cave::new();
        let mut snapshot = LevelSnapshot::capture(&cave);
        snapshot.version = 99;
        assert!(matches!(
            snapshot.validate(),
            Err(SaveError::IncompatibleVersion { .. })
        ));
    }
}
