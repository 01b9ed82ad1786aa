//! Encoders
//!
//! Format-specific chunk producers sitting between the per-frame export loop
//! and a backend encoding session. Each encoder owns exactly one session,
//! buffers encoded chunks in presentation order, and concatenates them into
//! a media-typed blob once finalized.

mod audio;
mod video;

pub use audio::AudioEncoder;
pub use video::VideoEncoder;

use serde::{Deserialize, Serialize};

use crate::backend::EncodedChunk;

/// Encoded stream blob tagged with the container's declared media type
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedBlob {
    /// Declared media type, e.g. `video/mp4`
    pub media_type: String,
    /// Encoded chunks in presentation order
    pub chunks: Vec<EncodedChunk>,
}

impl EncodedBlob {
    /// Concatenated chunk payloads
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.byte_len();
        let mut bytes = Vec::with_capacity(len);
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.data);
        }
        bytes
    }

    /// Total payload size in bytes
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(EncodedChunk::len).sum()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_concatenation() {
        let blob = EncodedBlob {
            media_type: "video/mp4".to_string(),
            chunks: vec![
                EncodedChunk {
                    data: vec![1, 2],
                    timestamp: 0.0,
                    duration: 0.5,
                    is_key: true,
                },
                EncodedChunk {
                    data: vec![3],
                    timestamp: 0.5,
                    duration: 0.5,
                    is_key: false,
                },
            ],
        };

        assert_eq!(blob.chunk_count(), 2);
        assert_eq!(blob.byte_len(), 3);
        assert_eq!(blob.to_bytes(), vec![1, 2, 3]);
        assert!(!blob.is_empty());
    }
}
