//! Brute-force cosine-similarity index over corpus chunks.
//!
//! The index is built once from every chunk of the corpus and persisted; later
//! runs load the snapshot as-is. Nothing checks a loaded snapshot against the
//! current corpus: after the documents change, rebuild explicitly.

use crate::chunker::Chunk;
use crate::embeddings::{Embedder, cosine_similarity};
use crate::error::{RagError, Result};
use crate::persistence;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::path::Path;

const EMBED_BATCH_SIZE: usize = 32;

/// A chunk and its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Vector index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct EmbeddingIndex {
    /// Model that produced the vectors.
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity (-1 to 1).
    pub score: f32,
}

/// How [`EmbeddingIndex::load_or_build`] obtained the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Loaded,
    Built,
}

impl EmbeddingIndex {
    /// Assemble an index from precomputed entries.
    pub fn from_entries(
        embedding_model: impl Into<String>,
        dimension: usize,
        entries: Vec<IndexEntry>,
    ) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            dimension,
            entries,
        }
    }

    /// Embed every chunk. An empty chunk list is an error, never an empty index.
    pub fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::IndexBuild(
                "no chunks to index (is the corpus empty?)".to_string(),
            ));
        }

        let total = chunks.len();
        let mut entries = Vec::with_capacity(total);

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts)?;

            if embeddings.len() != batch.len() {
                return Err(RagError::IndexBuild(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != embedder.dimension() {
                    return Err(RagError::IndexBuild(format!(
                        "chunk {} embedded with dimension {}, expected {}",
                        chunk.index,
                        embedding.len(),
                        embedder.dimension()
                    )));
                }
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    embedding,
                });
            }

            tracing::debug!("Embedded {}/{} chunks", entries.len(), total);
        }

        tracing::info!(
            "Built index of {} chunks with {}",
            entries.len(),
            embedder.model_name()
        );

        Ok(Self::from_entries(
            embedder.model_name(),
            embedder.dimension(),
            entries,
        ))
    }

    /// Load a snapshot without recomputing anything.
    pub fn load(path: &Path) -> Result<Self> {
        let index = persistence::load_index(path)?;
        tracing::info!("Loaded index of {} chunks from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save_index(self, path)?;
        tracing::info!("Saved index to {}", path.display());
        Ok(())
    }

    /// Load the snapshot at `path`, or build one from `chunk_source` and save it.
    ///
    /// An existing snapshot always wins unless `rebuild` is set; `chunk_source`
    /// only runs when building.
    pub fn load_or_build<F>(
        path: &Path,
        rebuild: bool,
        embedder: &dyn Embedder,
        chunk_source: F,
    ) -> Result<(Self, IndexOrigin)>
    where
        F: FnOnce() -> Result<Vec<Chunk>>,
    {
        if !rebuild && persistence::index_exists(path) {
            let index = Self::load(path)?;
            if index.embedding_model != embedder.model_name() {
                tracing::warn!(
                    "Index at {} was built with {}, querying with {}; rebuild if results look off",
                    path.display(),
                    index.embedding_model,
                    embedder.model_name()
                );
            }
            return Ok((index, IndexOrigin::Loaded));
        }

        if rebuild {
            tracing::info!("Rebuilding index at {}", path.display());
        } else {
            tracing::info!("No index at {}, building a new one", path.display());
        }

        let index = Self::build(chunk_source()?, embedder)?;
        index.save(path)?;
        Ok((index, IndexOrigin::Built))
    }

    /// The `k` chunks most similar to `query`, best first; ties keep chunk order.
    pub fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let query_embedding = embedder.embed(query)?;

        if query_embedding.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "query vector has dimension {}, index was built with {} ({})",
                query_embedding.len(),
                self.dimension,
                self.embedding_model
            )));
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        // Stable sort, so equal scores stay in chunk order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        Ok(hits)
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Maps a text onto fixed axes by keyword.
    struct AxisEmbedder {
        calls: Cell<usize>,
    }

    impl AxisEmbedder {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }

        fn dimension(&self) -> usize {
            3
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.calls.set(self.calls.get() + 1);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("mlo") { 1.0 } else { 0.0 },
                        if t.contains("qam") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }
    }

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: format!("doc{}.pdf", i + 1),
            page: Some(i + 1),
            index: i,
        }
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk(0, "MLO permite usar vários enlaces"),
            chunk(1, "4096-QAM aumenta a taxa"),
            chunk(2, "MLO e 4096-QAM juntos"),
            chunk(3, "Preâmbulo EHT"),
        ]
    }

    #[test]
    fn test_build_rejects_empty() {
        let result = EmbeddingIndex::build(Vec::new(), &AxisEmbedder::new());
        assert!(matches!(result, Err(RagError::IndexBuild(_))));
    }

    #[test]
    fn test_build_batches() {
        let embedder = AxisEmbedder::new();
        let chunks: Vec<_> = (0..70).map(|i| chunk(i, "texto")).collect();

        let index = EmbeddingIndex::build(chunks, &embedder).unwrap();
        assert_eq!(index.len(), 70);
        assert_eq!(embedder.calls.get(), 3);
        assert_eq!(index.embedding_model(), "axis");
        assert_eq!(index.dimension(), 3);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let embedder = AxisEmbedder::new();
        let index = EmbeddingIndex::build(sample_chunks(), &embedder).unwrap();

        let hits = index.search(&embedder, "o que é MLO?", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.index, 0);
        assert_eq!(hits[1].chunk.index, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let embedder = AxisEmbedder::new();
        let index = EmbeddingIndex::build(sample_chunks(), &embedder).unwrap();

        let hits = index.search(&embedder, "qualquer", 10).unwrap();
        assert_eq!(hits.len(), 4);
        // Bias-only query: chunks 0 and 1 tie and keep their order
        let order: Vec<_> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(order, [3, 0, 1, 2]);
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let embedder = AxisEmbedder::new();
        let index = EmbeddingIndex::from_entries(
            "other",
            5,
            vec![IndexEntry {
                chunk: chunk(0, "MLO"),
                embedding: vec![0.0; 5],
            }],
        );

        assert!(matches!(
            index.search(&embedder, "MLO", 1),
            Err(RagError::Embedding(_))
        ));
    }

    #[test]
    fn test_load_or_build_reuses_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_index.bin");
        let embedder = AxisEmbedder::new();

        let (built, origin) =
            EmbeddingIndex::load_or_build(&path, false, &embedder, || Ok(sample_chunks())).unwrap();
        assert_eq!(origin, IndexOrigin::Built);
        assert!(path.exists());

        let (loaded, origin) = EmbeddingIndex::load_or_build(&path, false, &embedder, || {
            panic!("chunk source must not run when a snapshot exists")
        })
        .unwrap();
        assert_eq!(origin, IndexOrigin::Loaded);
        assert_eq!(loaded, built);

        let (_, origin) = EmbeddingIndex::load_or_build(&path, true, &embedder, || {
            Ok(sample_chunks()[..1].to_vec())
        })
        .unwrap();
        assert_eq!(origin, IndexOrigin::Built);
        assert_eq!(EmbeddingIndex::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_corpus_never_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_index.bin");

        let result =
            EmbeddingIndex::load_or_build(&path, false, &AxisEmbedder::new(), || Ok(Vec::new()));
        assert!(matches!(result, Err(RagError::IndexBuild(_))));
        assert!(!path.exists());
    }
}
