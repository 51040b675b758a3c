//! Vector index construction and storage

mod builder;
mod vector_index;

pub use builder::{IndexBuilder, IndexSettings};
pub use vector_index::{
    cosine_similarity, l2_norm, IndexEntry, ScoredChunk, VectorIndex, SNAPSHOT_FILE,
};
