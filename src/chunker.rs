//! Separator-aware text chunking with overlap.
//!
//! Text is split on the separator (a line break by default) into units,
//! and units are merged greedily into chunks of at most `chunk_size`
//! characters. Each new chunk starts with the shortest tail of the previous
//! one that covers `chunk_overlap` characters, so neighbouring chunks from the
//! same page share context.
//!
//! A unit longer than `chunk_size` is never cut: it becomes a chunk of its
//! own. Sizes are measured in `char`s, not bytes.

use crate::document::{Document, page_label};
use crate::error::{RagError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Configuration for text chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Preferred split boundary.
    pub separator: String,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separator: "\n".to_string(),
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separator.is_empty() {
            return Err(RagError::InvalidConfig(
                "chunk separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A chunk of text with the metadata of the page it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Chunk {
    /// Chunk text content.
    pub text: String,
    /// File name of the originating document.
    pub source: String,
    /// Page of the originating document.
    pub page: Option<usize>,
    /// Position in the corpus-wide chunk sequence.
    pub index: usize,
}

impl Chunk {
    /// `source (p.page)` as used in exports.
    pub fn citation(&self) -> String {
        format!("{} (p.{})", self.source, page_label(self.page))
    }
}

/// Split every document, numbering chunks across the whole corpus.
pub fn split_documents(documents: &[Document], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for doc in documents {
        for text in split_text(&doc.content, config) {
            chunks.push(Chunk {
                text,
                source: doc.source.clone(),
                page: doc.page,
                index: chunks.len(),
            });
        }
    }

    tracing::debug!(
        "Split {} documents into {} chunks (size {}, overlap {})",
        documents.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

/// Split one text into overlapping chunks.
pub fn split_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let sep = config.separator.as_str();
    let sep_len = sep.chars().count();

    let units: Vec<(&str, usize)> = text
        .split(sep)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| (u, u.chars().count()))
        .collect();

    let mut chunks = Vec::new();
    let mut window: Vec<(&str, usize)> = Vec::new();
    // Units in the window that no emitted chunk contains yet.
    let mut fresh = 0;

    for (unit, unit_len) in units {
        let overflows = |window: &[(&str, usize)]| {
            joined_len(window, sep_len) + sep_len + unit_len > config.chunk_size
        };

        if !window.is_empty() && overflows(&window) {
            if fresh > 0 {
                chunks.push(join(&window, sep));
                let keep = overlap_tail(&window, sep_len, config.chunk_overlap);
                window.drain(..window.len() - keep);
                fresh = 0;
            }
            while !window.is_empty() && overflows(&window) {
                window.remove(0);
            }
        }

        if unit_len > config.chunk_size {
            tracing::warn!(
                "Keeping oversized unit of {} chars whole (chunk_size {})",
                unit_len,
                config.chunk_size
            );
        }

        window.push((unit, unit_len));
        fresh += 1;
    }

    if fresh > 0 {
        chunks.push(join(&window, sep));
    }

    chunks
}

/// Number of trailing units to carry into the next chunk: the fewest whose
/// joined length reaches `overlap`, never the whole window.
fn overlap_tail(window: &[(&str, usize)], sep_len: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return 0;
    }

    let max_keep = window.len().saturating_sub(1);
    let mut covered = 0;
    for keep in 1..=max_keep {
        let (_, len) = window[window.len() - keep];
        covered += len + if keep > 1 { sep_len } else { 0 };
        if covered >= overlap {
            return keep;
        }
    }
    max_keep
}

fn joined_len(window: &[(&str, usize)], sep_len: usize) -> usize {
    let text: usize = window.iter().map(|(_, len)| len).sum();
    text + sep_len * window.len().saturating_sub(1)
}

fn join(window: &[(&str, usize)], sep: &str) -> String {
    window
        .iter()
        .map(|(unit, _)| *unit)
        .collect::<Vec<_>>()
        .join(sep)
}
