//! LLM integration module.
//!
//! Provides the [`Backend`] seam with its Ollama implementation, the
//! per-variant [`ModelAdapter`] and the personas and prompts sent to models.

mod adapter;
mod client;
mod prompts;

pub use adapter::ModelAdapter;
pub use client::{Backend, GenerationRequest, OllamaClient, has_model};
pub use prompts::{Prompts, build_context, build_rag_prompt};
