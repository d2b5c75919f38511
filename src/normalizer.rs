//! Resamples a recorded FrameSequence to exactly `MAX_FRAMES` frames.
//!
//! Long sequences are decimated by nearest-neighbour selection, short ones are
//! right-padded with all-zero frames.

use crate::types::{FeatureVector, FrameSequence, NormalizedSequence, MAX_FRAMES};

/// Source index picked for output slot `i` when decimating `len` frames.
///
/// `round(i * len / MAX_FRAMES)` with ties rounding up, computed in integers
/// so the 0.5 boundary is exact, then clamped to the last frame.
pub fn source_index(i: usize, len: usize) -> usize {
    let idx = (2 * i * len + MAX_FRAMES) / (2 * MAX_FRAMES);
    idx.min(len.saturating_sub(1))
}

pub fn normalize(seq: FrameSequence) -> NormalizedSequence {
    let len = seq.len();

    if len == MAX_FRAMES {
        return NormalizedSequence::from_exact(seq);
    }

    if len > MAX_FRAMES {
        let frames = (0..MAX_FRAMES)
            .map(|i| seq[source_index(i, len)].clone())
            .collect();
        return NormalizedSequence::from_exact(frames);
    }

    let mut frames = seq;
    frames.resize_with(MAX_FRAMES, FeatureVector::zeroed);
    NormalizedSequence::from_exact(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_KEYPOINTS;

    /// Frame whose every feature equals `tag`, so selections are traceable
    fn tagged(tag: f32) -> FeatureVector {
        FeatureVector::from([tag; NUM_KEYPOINTS])
    }

    fn sequence(len: usize) -> FrameSequence {
        (0..len).map(|i| tagged(i as f32 + 1.0)).collect()
    }

    fn tags(seq: &NormalizedSequence) -> Vec<f32> {
        seq.frames().iter().map(|f| f.as_slice()[0]).collect()
    }

    #[test]
    fn test_exact_length_is_identity() {
        let input = sequence(MAX_FRAMES);
        let out = normalize(input.clone());
        assert_eq!(out.frames(), input.as_slice());
    }

    #[test]
    fn test_idempotent() {
        let once = normalize(sequence(45));
        let twice = normalize(once.clone().into_frames());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_decimation_45_frames() {
        let out = normalize(sequence(45));
        assert_eq!(out.len(), MAX_FRAMES);
        assert_eq!(source_index(0, 45), 0);
        // 29 * 45 / 30 = 43.5 rounds up
        assert_eq!(source_index(29, 45), 44);
        let t = tags(&out);
        assert_eq!(t[0], 1.0);
        assert_eq!(t[29], 45.0);
        // i=1 -> 1.5 -> 2, i=2 -> 3.0 -> 3
        assert_eq!(t[1], 3.0);
        assert_eq!(t[2], 4.0);
    }

    #[test]
    fn test_decimation_is_monotonic_and_in_range() {
        for len in [31, 44, 59, 60, 61, 97, 300] {
            let mut prev = 0;
            for i in 0..MAX_FRAMES {
                let idx = source_index(i, len);
                assert!(idx < len);
                assert!(idx >= prev);
                prev = idx;
            }
        }
    }

    #[test]
    fn test_decimation_clamps_at_tail() {
        // 29 * 31 / 30 = 29.97 rounds to 30, the last valid index
        assert_eq!(source_index(29, 31), 30);
        let out = normalize(sequence(31));
        assert_eq!(tags(&out)[29], 31.0);
    }

    #[test]
    fn test_short_sequence_is_zero_padded() {
        let out = normalize(sequence(10));
        assert_eq!(out.len(), MAX_FRAMES);
        let t = tags(&out);
        for (i, tag) in t.iter().enumerate().take(10) {
            assert_eq!(*tag, i as f32 + 1.0);
        }
        assert!(out.frames()[10..].iter().all(|f| f.is_zero()));
    }

    #[test]
    fn test_empty_sequence_is_all_zero() {
        let out = normalize(Vec::new());
        assert_eq!(out.len(), MAX_FRAMES);
        assert!(out.frames().iter().all(|f| f.is_zero()));
    }
}
