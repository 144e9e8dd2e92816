//! Error types for the benchmark pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while loading, indexing, generating or benchmarking.
#[derive(Error, Debug)]
pub enum RagError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus directory '{0}' does not exist or is not a directory")]
    CorpusMissing(PathBuf),

    /// A single corpus file could not be parsed.
    #[error("Failed to parse document '{path}': {reason}")]
    DocumentParse { path: PathBuf, reason: String },

    /// The index snapshot does not exist.
    #[error("Index snapshot not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// The vector index could not be built.
    #[error("Failed to build vector index: {0}")]
    IndexBuild(String),

    /// The embedding model failed to load or to embed text.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The model backend is unreachable or the model is not provisioned.
    #[error("Backend unavailable for model '{model}': {reason}")]
    BackendUnavailable {
        model: String,
        reason: String,
        model_missing: bool,
    },

    /// The backend answered with an error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The question file does not exist.
    #[error("Question file '{0}' not found")]
    QuestionFileMissing(PathBuf),

    /// The question file has a bad header or no questions.
    #[error("Malformed question file '{path}': {reason}")]
    MalformedQuestionFile { path: PathBuf, reason: String },

    /// A model id that is not in the configured roster.
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Backend could not be reached at all.
    pub fn unreachable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            model: model.into(),
            reason: reason.into(),
            model_missing: false,
        }
    }

    /// Backend is up but does not have the model.
    pub fn model_missing(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            model: model.into(),
            reason: reason.into(),
            model_missing: true,
        }
    }

    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// What the operator can do about it, for errors that are fixable outside the program.
    pub fn remediation_hint(&self) -> Option<String> {
        match self {
            Self::BackendUnavailable {
                model,
                model_missing: true,
                ..
            } => Some(format!("Pull the model first: ollama pull {}", model)),
            Self::BackendUnavailable { .. } => {
                Some("Start the backend and retry: ollama serve".to_string())
            }
            Self::CorpusMissing(path) => Some(format!(
                "Create '{}' or point corpus.dir / RAG_CORPUS_DIR at the document folder",
                path.display()
            )),
            Self::QuestionFileMissing(_) => Some(
                "Place the question file in the working directory or set RAG_QUESTIONS_FILE"
                    .to_string(),
            ),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}
