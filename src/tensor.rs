//! Model input encoding: a normalized sequence packed into one flat f32 buffer.

use crate::types::{NormalizedSequence, MAX_FRAMES, NUM_KEYPOINTS};

/// Byte length of an encoded sequence: frames * features * f32
pub const TENSOR_BYTES: usize = MAX_FRAMES * NUM_KEYPOINTS * std::mem::size_of::<f32>();

/// Model input shape, batch of one
pub const INPUT_SHAPE: [usize; 3] = [1, MAX_FRAMES, NUM_KEYPOINTS];

/// Flat native-endian f32 buffer, frame-major then feature-minor.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// Raw bytes, starting at the first value of the first frame
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn shape(&self) -> [usize; 3] {
        INPUT_SHAPE
    }

}

pub fn encode(seq: &NormalizedSequence) -> InputTensor {
    let mut data = Vec::with_capacity(MAX_FRAMES * NUM_KEYPOINTS);
    for frame in seq.frames() {
        data.extend_from_slice(frame.as_slice());
    }
    InputTensor { data }
}

/// Reads an encoded buffer back into `[frame][feature]` rows.
/// Returns `None` when the length is not a whole `MAX_FRAMES x NUM_KEYPOINTS` grid.
pub fn decode(bytes: &[u8]) -> Option<Vec<Vec<f32>>> {
    if bytes.len() != TENSOR_BYTES {
        return None;
    }
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Some(values.chunks(NUM_KEYPOINTS).map(|row| row.to_vec()).collect())
}
