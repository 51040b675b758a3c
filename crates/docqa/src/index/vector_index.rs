//! In-memory vector index with exact cosine search and a JSON snapshot on disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// File name of the snapshot inside a session directory
pub const SNAPSHOT_FILE: &str = "index.json";

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with precomputed norms; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

/// A chunk and its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    #[serde(skip)]
    norm: f32,
}

/// Search hit
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Embedding model the vectors came from
    pub embed_model: String,
    /// Vector dimensions
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(embed_model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            embed_model: embed_model.into(),
            dimensions,
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Add a chunk; the vector must match the index dimensions
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::VectorIndex(format!(
                "Vector for chunk {} has {} dimensions, index expects {}",
                chunk.chunk_index,
                vector.len(),
                self.dimensions
            )));
        }
        let norm = l2_norm(&vector);
        self.entries.push(IndexEntry {
            chunk,
            vector,
            norm,
        });
        Ok(())
    }

    /// Top `top_k` entries by cosine similarity, most similar first
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk<'_>>> {
        if query.len() != self.dimensions {
            return Err(Error::VectorIndex(format!(
                "Query vector has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let query_norm = l2_norm(query);
        let mut hits: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: &e.chunk,
                score: cosine_similarity(query, &e.vector, query_norm, e.norm),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Write the snapshot to `dir`, replacing whatever snapshot was there.
    ///
    /// The new snapshot is written to a sibling staging directory first and
    /// renamed into place, so `dir` only ever holds one complete snapshot.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::VectorIndex(format!("Invalid index path: {}", dir.display())))?;

        fs::create_dir_all(parent)?;
        let staging = parent.join(format!(".{}.staging-{}", name, Uuid::new_v4().simple()));

        let result = self.write_staged(&staging, dir);
        if result.is_err() && staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                tracing::warn!("Failed to remove staging dir {}: {}", staging.display(), e);
            }
        }
        result?;

        Ok(dir.join(SNAPSHOT_FILE))
    }

    fn write_staged(&self, staging: &Path, dir: &Path) -> Result<()> {
        fs::create_dir_all(staging)?;
        let json = serde_json::to_vec(self)?;
        fs::write(staging.join(SNAPSHOT_FILE), json)?;

        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        fs::rename(staging, dir)?;
        Ok(())
    }

    /// Read a snapshot written by [`VectorIndex::persist`]
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SNAPSHOT_FILE);
        let bytes = fs::read(&path).map_err(|e| {
            Error::VectorIndex(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        let mut index: VectorIndex = serde_json::from_slice(&bytes)?;
        for entry in &mut index.entries {
            entry.norm = l2_norm(&entry.vector);
        }
        Ok(index)
    }
}
