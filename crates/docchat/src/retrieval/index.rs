//! Append-only per-session vector index with exact L2 search

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// One nearest-neighbor result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Euclidean distance to the query (smaller is closer)
    pub distance: f32,
}

/// Snapshot of an index's metadata
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub session_id: String,
    pub chunk_count: usize,
    pub document_count: usize,
    /// Unset until the first insert
    pub dimensions: Option<usize>,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
struct IndexInner {
    entries: Vec<Entry>,
    dimensions: Option<usize>,
    documents: HashSet<Uuid>,
}

/// Vector index for one session.
///
/// Entries are only ever appended. A batch becomes visible to readers as a
/// whole once the write lock is released, so a concurrent search sees either
/// none or all of it.
pub struct SessionIndex {
    session_id: String,
    created_at: DateTime<Utc>,
    inner: RwLock<IndexInner>,
}

impl SessionIndex {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            inner: RwLock::new(IndexInner::default()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append `(chunk, vector)` pairs.
    ///
    /// The first insert fixes the index dimensionality. Fails with
    /// `LengthMismatch`, `DimensionMismatch` or `InvalidVector` without
    /// appending anything.
    pub fn insert_batch(&self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(Error::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
            return Err(Error::InvalidVector(format!(
                "vector {} contains NaN or infinite values",
                bad
            )));
        }

        let mut inner = self.inner.write();

        let expected = match inner.dimensions.or_else(|| vectors.first().map(Vec::len)) {
            Some(dims) => dims,
            None => return Ok(0),
        };
        if expected == 0 {
            return Err(Error::InvalidVector("zero-length vector".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(Error::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let added = chunks.len();
        inner.dimensions = Some(expected);
        inner.entries.reserve(added);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            inner.documents.insert(chunk.document_id);
            inner.entries.push(Entry { chunk, vector });
        }

        tracing::debug!(
            "Session {}: appended {} entries ({} total)",
            self.session_id,
            added,
            inner.entries.len()
        );
        Ok(added)
    }

    /// Return up to `k` entries nearest to `query`, by ascending L2 distance.
    ///
    /// Equal distances keep insertion order. An empty index yields no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read();
        // Nothing to compare against, whatever the arguments
        let Some(dimensions) = inner.dimensions else {
            return Ok(Vec::new());
        };

        if k == 0 {
            return Err(Error::InvalidQuery("k must be > 0".to_string()));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidVector(
                "query vector contains NaN or infinite values".to_string(),
            ));
        }
        if query.len() != dimensions {
            return Err(Error::DimensionMismatch {
                expected: dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = inner
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, l2_distance(query, &entry.vector)))
            .collect();

        // Stable sort: equal distances stay in insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                chunk: inner.entries[position].chunk.clone(),
                distance,
            })
            .collect())
    }

    /// Current entry count
    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.inner.read().dimensions
    }

    /// Distinct documents with at least one entry
    pub fn document_count(&self) -> usize {
        self.inner.read().documents.len()
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            session_id: self.session_id.clone(),
            chunk_count: inner.entries.len(),
            document_count: inner.documents.len(),
            dimensions: inner.dimensions,
            created_at: self.created_at,
        }
    }
}

/// Euclidean distance between two equal-length vectors
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
