//! Corpus loading.
//!
//! Every file directly inside the corpus directory with a recognized
//! extension is turned into page-tagged [`Document`]s. PDF text is extracted
//! page by page; plain text files may use form feeds as page breaks,
//! otherwise the whole file is one unpaged unit.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PAGE_BREAK: char = '\x0C';

/// One page (or unpaged file) of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// File name the text came from.
    pub source: String,
    /// 1-indexed page number, when the format has pages.
    pub page: Option<usize>,
    /// Text content.
    pub content: String,
}

impl Document {
    /// Create a new document.
    pub fn new(source: impl Into<String>, page: Option<usize>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page,
            content: content.into(),
        }
    }

    /// Load a PDF, one document per non-blank page.
    pub fn from_pdf_file(path: &Path) -> Result<Vec<Self>> {
        let bytes = std::fs::read(path).map_err(|e| RagError::io(path, e))?;
        let parse_error = |reason: String| RagError::DocumentParse {
            path: path.to_path_buf(),
            reason,
        };
        // pdf-extract panics on some malformed font tables
        let texts =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
                .map_err(|_| parse_error("PDF extractor panicked".to_string()))?
                .map_err(|e| parse_error(e.to_string()))?;

        let source = file_name(path);
        let pages = number_pages(&source, texts.iter().map(String::as_str));
        if pages.is_empty() {
            return Err(parse_error(
                "no extractable text (scanned or image-only PDF?)".to_string(),
            ));
        }
        Ok(pages)
    }

    /// Load a text file. Form feeds split it into numbered pages.
    pub fn from_text_file(path: &Path) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let source = file_name(path);

        if content.contains(PAGE_BREAK) {
            Ok(number_pages(&source, content.split(PAGE_BREAK)))
        } else if content.trim().is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![Self::new(source, None, content)])
        }
    }
}

/// Render an optional page number, `N/A` when absent.
pub fn page_label(page: Option<usize>) -> String {
    page.map_or_else(|| "N/A".to_string(), |p| p.to_string())
}

/// Number pages from 1 and keep the non-blank ones.
fn number_pages<'a>(source: &str, pages: impl Iterator<Item = &'a str>) -> Vec<Document> {
    pages
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Document::new(source, Some(i + 1), page.trim()))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Result of scanning the corpus directory.
#[derive(Debug, Default)]
pub struct LoadedCorpus {
    /// Documents in file-name order, pages in page order.
    pub documents: Vec<Document>,
    /// Number of files that produced at least one document.
    pub files_loaded: usize,
    /// Files that failed to parse, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl LoadedCorpus {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Load every recognized file directly inside `dir`.
///
/// A file that fails to parse is logged and skipped. An empty directory
/// yields an empty corpus; a missing one is [`RagError::CorpusMissing`].
pub fn load_corpus(dir: &Path, extensions: &[String]) -> Result<LoadedCorpus> {
    if !dir.is_dir() {
        return Err(RagError::CorpusMissing(dir.to_path_buf()));
    }

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable corpus entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| recognized(path, extensions))
        .collect();

    let mut corpus = LoadedCorpus::default();

    for path in files {
        tracing::info!("Processing: {}", path.display());
        match load_file(&path) {
            Ok(documents) => {
                if !documents.is_empty() {
                    corpus.files_loaded += 1;
                }
                corpus.documents.extend(documents);
            }
            Err(e) => {
                tracing::error!("Failed to load {}: {}", path.display(), e);
                corpus.failures.push((path, e.to_string()));
            }
        }
    }

    tracing::info!(
        "Loaded {} pages from {} files ({} failed)",
        corpus.documents.len(),
        corpus.files_loaded,
        corpus.failures.len()
    );

    Ok(corpus)
}

fn load_file(path: &Path) -> Result<Vec<Document>> {
    match extension(path).as_deref() {
        Some("pdf") => Document::from_pdf_file(path),
        _ => Document::from_text_file(path),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn recognized(path: &Path, extensions: &[String]) -> bool {
    extension(path).is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}
