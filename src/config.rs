//! Configuration for the benchmark.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values, and every
//! section falls back to its defaults when absent from the file.

use crate::benchmark::Truncation;
use crate::chunker::ChunkConfig;
use crate::error::{RagError, Result};
use crate::llm::Prompts;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Model backend (Ollama) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,

    /// Per-request timeout. `None` waits for inference to finish however long it takes.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: None,
        }
    }
}

/// Where the documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory scanned (non-recursively) for documents.
    pub dir: PathBuf,

    /// Recognized file extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./base_tcc"),
            extensions: vec!["pdf".to_string(), "txt".to_string()],
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot path; `.bin` selects bincode, anything else JSON.
    pub path: PathBuf,

    /// Hugging Face id of the sentence-transformers model.
    pub embedding_model: String,

    /// Chunks retrieved per question.
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vector_index.bin"),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            top_k: 5,
        }
    }
}

/// One generation variant in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Identifier used on the command line and in batch exports.
    pub id: String,

    /// Model name as provisioned in the backend.
    pub model: String,

    /// Label used in comparative exports.
    pub label: String,

    #[serde(default)]
    pub description: String,

    /// Whether answers are grounded on retrieved chunks.
    pub retrieval: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Advisory thread count passed to the backend.
    #[serde(default)]
    pub num_thread: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

impl ModelConfig {
    /// A retrieval-enabled variant.
    pub fn rag(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        num_thread: u32,
    ) -> Self {
        let id = id.into();
        Self {
            model: id.clone(),
            id,
            label: label.into(),
            description: description.into(),
            retrieval: true,
            temperature: default_temperature(),
            num_thread: Some(num_thread),
        }
    }

    /// A no-retrieval control variant over `model`.
    pub fn control(
        id: impl Into<String>,
        model: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            label: label.into(),
            description: description.into(),
            retrieval: false,
            temperature: default_temperature(),
            num_thread: None,
        }
    }

    pub fn is_control(&self) -> bool {
        !self.retrieval
    }
}

/// The default roster: three RAG variants and a raw Llama 2 control.
pub fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::rag(
            "mistral",
            "Mistral (RAG)",
            "Mistral (4.4GB) - best quality for complex tasks",
            4,
        ),
        ModelConfig::rag(
            "llama2",
            "Llama2 (RAG)",
            "Llama 2 (3.8GB) - balance between quality and speed",
            4,
        ),
        ModelConfig::rag(
            "tinyllama",
            "TinyLlama (RAG)",
            "TinyLlama (637MB) - light and fast, for quick tests",
            2,
        ),
        ModelConfig::control(
            "llama2_raw",
            "llama2",
            "llama2 (CONTROLE)",
            "Llama 2 control (3.8GB) - no documents",
        ),
    ]
}

/// System personas sent with every generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Personas {
    /// Used by retrieval-enabled variants.
    pub rag: String,
    /// Used by control variants.
    pub control: String,
}

impl Default for Personas {
    fn default() -> Self {
        Self {
            rag: Prompts::rag_persona().to_string(),
            control: Prompts::control_persona().to_string(),
        }
    }
}

impl Personas {
    pub fn for_model(&self, model: &ModelConfig) -> &str {
        if model.retrieval {
            &self.rag
        } else {
            &self.control
        }
    }
}

/// Benchmark harness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Question file for batch mode.
    pub questions_file: PathBuf,

    /// Number of questions a complete batch file holds.
    pub expected_questions: usize,

    /// Directory receiving the CSV exports.
    pub output_dir: PathBuf,

    /// Limits applied to comparative rows.
    pub comparative_truncation: Truncation,

    /// Limits applied to batch rows.
    pub batch_truncation: Truncation,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            questions_file: PathBuf::from("perguntas.csv"),
            expected_questions: 100,
            output_dir: PathBuf::from("."),
            comparative_truncation: Truncation::comparative(),
            batch_truncation: Truncation::batch(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub corpus: CorpusConfig,
    pub chunking: ChunkConfig,
    pub index: IndexConfig,
    pub models: Vec<ModelConfig>,
    pub personas: Personas,
    pub benchmark: BenchmarkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            corpus: CorpusConfig::default(),
            chunking: ChunkConfig::default(),
            index: IndexConfig::default(),
            models: default_models(),
            personas: Personas::default(),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (OLLAMA_BASE_URL, RAG_CORPUS_DIR, RAG_INDEX_PATH, ...)
    /// 2. Config file (`explicit` if given, else ~/.config/rag-bench/config.yaml)
    /// 3. Default values
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = env::var("OLLAMA_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Ok(dir) = env::var("RAG_CORPUS_DIR") {
            self.corpus.dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("RAG_INDEX_PATH") {
            self.index.path = PathBuf::from(path);
        }
        if let Ok(model) = env::var("RAG_EMBEDDING_MODEL") {
            self.index.embedding_model = model;
        }
        if let Some(size) = env_parse("RAG_CHUNK_SIZE") {
            self.chunking.chunk_size = size;
        }
        if let Some(overlap) = env_parse("RAG_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = overlap;
        }
        if let Some(top_k) = env_parse("RAG_TOP_K") {
            self.index.top_k = top_k;
        }
        if let Ok(path) = env::var("RAG_QUESTIONS_FILE") {
            self.benchmark.questions_file = PathBuf::from(path);
        }
        if let Ok(dir) = env::var("RAG_OUTPUT_DIR") {
            self.benchmark.output_dir = PathBuf::from(dir);
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate ranges and the model roster.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.index.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "index.top_k must be greater than zero".to_string(),
            ));
        }

        if self.backend.base_url.is_empty() {
            return Err(RagError::InvalidConfig(
                "Backend URL is required. Set OLLAMA_BASE_URL or backend.base_url.".to_string(),
            ));
        }

        if self.models.is_empty() {
            return Err(RagError::InvalidConfig(
                "At least one model must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(RagError::InvalidConfig(format!(
                    "Duplicate model id '{}'",
                    model.id
                )));
            }
            if model.model.is_empty() {
                return Err(RagError::InvalidConfig(format!(
                    "Model '{}' has no backend model name",
                    model.id
                )));
            }
        }

        Ok(())
    }

    /// The corpus directory must exist before any model is queried.
    pub fn require_corpus(&self) -> Result<()> {
        if self.corpus.dir.is_dir() {
            Ok(())
        } else {
            Err(RagError::CorpusMissing(self.corpus.dir.clone()))
        }
    }

    /// Look up a roster entry by id.
    pub fn model(&self, id: &str) -> Result<&ModelConfig> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| RagError::UnknownModel(id.to_string()))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:11434");
        assert_eq!(config.corpus.dir, PathBuf::from("./base_tcc"));
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.index.top_k, 5);
        assert_eq!(config.benchmark.expected_questions, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_roster() {
        let models = default_models();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["mistral", "llama2", "tinyllama", "llama2_raw"]);

        let control = &models[3];
        assert!(control.is_control());
        assert_eq!(control.model, "llama2");
        assert_eq!(control.num_thread, None);

        assert_eq!(models[2].num_thread, Some(2));
        assert!(models.iter().all(|m| (m.temperature - 0.3).abs() < f32::EPSILON));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.index.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.models.push(config.models[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "corpus:\n  dir: ./docs\nchunking:\n  chunk_size: 800\n  chunk_overlap: 50\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.corpus.dir, PathBuf::from("./docs"));
        assert_eq!(config.corpus.extensions, vec!["pdf", "txt"]);
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.index.top_k, 5);
        assert_eq!(config.models.len(), 4);
    }

    #[test]
    fn test_require_corpus() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();

        config.corpus.dir = dir.path().join("base_tcc");
        assert!(matches!(
            config.require_corpus(),
            Err(RagError::CorpusMissing(path)) if path == dir.path().join("base_tcc")
        ));

        std::fs::create_dir(&config.corpus.dir).unwrap();
        assert!(config.require_corpus().is_ok());
    }

    #[test]
    fn test_model_lookup() {
        let config = Config::default();
        assert_eq!(config.model("tinyllama").unwrap().label, "TinyLlama (RAG)");
        assert!(matches!(
            config.model("gpt-9"),
            Err(RagError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_persona_selection() {
        let personas = Personas::default();
        let models = default_models();
        assert_eq!(personas.for_model(&models[0]), personas.rag);
        assert_eq!(personas.for_model(&models[3]), personas.control);
    }
}
