//! Question answering, with and without retrieval.

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::{EmbeddingIndex, SearchHit};
use crate::llm::{Backend, ModelAdapter, build_rag_prompt};
use std::time::Instant;

/// A generated answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    /// Retrieved chunks in retrieval order; empty for control answers.
    pub citations: Vec<SearchHit>,
    /// Wall time from retrieval start to response, rounded to hundredths.
    pub elapsed_secs: f64,
}

/// Answers grounded on the top-k chunks of an index.
pub struct RagResponder<'a> {
    index: &'a EmbeddingIndex,
    embedder: &'a dyn Embedder,
    top_k: usize,
}

impl<'a> RagResponder<'a> {
    pub fn new(index: &'a EmbeddingIndex, embedder: &'a dyn Embedder, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }

    /// Retrieve, build the grounded prompt and generate.
    pub async fn answer<B: Backend + ?Sized>(
        &self,
        question: &str,
        adapter: &ModelAdapter<'_, B>,
    ) -> Result<Answer> {
        let start = Instant::now();

        let citations = self.index.search(self.embedder, question, self.top_k)?;
        let prompt = build_rag_prompt(question, &citations);
        let response = adapter.generate(&prompt).await?;

        Ok(Answer {
            response,
            citations,
            elapsed_secs: round_secs(start.elapsed().as_secs_f64()),
        })
    }
}

/// Answers from the model's own knowledge: the question goes out unmodified.
pub struct ControlResponder;

impl ControlResponder {
    pub async fn answer<B: Backend + ?Sized>(
        question: &str,
        adapter: &ModelAdapter<'_, B>,
    ) -> Result<Answer> {
        let start = Instant::now();
        let response = adapter.generate(question).await?;

        Ok(Answer {
            response,
            citations: Vec::new(),
            elapsed_secs: round_secs(start.elapsed().as_secs_f64()),
        })
    }
}

fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::config::{Personas, default_models};
    use crate::error::RagError;
    use crate::index::IndexEntry;
    use crate::llm::GenerationRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneHot;

    impl Embedder for OneHot {
        fn model_name(&self) -> &str {
            "one-hot"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("MLO") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    #[derive(Default)]
    struct Capture {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Backend for Capture {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            if self.fail {
                return Err(RagError::unreachable(request.model, "connection refused"));
            }
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            Ok("resposta".to_string())
        }
    }

    fn index() -> EmbeddingIndex {
        let entry = |i: usize, text: &str, v: Vec<f32>| IndexEntry {
            chunk: Chunk {
                text: text.to_string(),
                source: format!("doc{}.pdf", i + 1),
                page: Some(i + 1),
                index: i,
            },
            embedding: v,
        };
        EmbeddingIndex::from_entries(
            "one-hot",
            2,
            vec![
                entry(0, "EHT usa 320 MHz", vec![0.0, 1.0]),
                entry(1, "MLO agrega enlaces", vec![1.0, 0.0]),
            ],
        )
    }

    #[tokio::test]
    async fn test_rag_answer_cites_in_retrieval_order() {
        let index = index();
        let responder = RagResponder::new(&index, &OneHot, 2);
        let backend = Capture::default();
        let models = default_models();
        let personas = Personas::default();
        let adapter = ModelAdapter::new(&backend, &models[0], &personas);

        let answer = responder.answer("Como funciona MLO?", &adapter).await.unwrap();

        assert_eq!(answer.response, "resposta");
        let sources: Vec<_> = answer.citations.iter().map(|h| h.chunk.source.as_str()).collect();
        assert_eq!(sources, ["doc2.pdf", "doc1.pdf"]);
        assert!(answer.elapsed_secs >= 0.0);

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Fonte: doc2.pdf (Página 2)\nConteúdo: MLO agrega enlaces"));
        assert!(prompts[0].ends_with("Pergunta: Como funciona MLO?"));
    }

    #[tokio::test]
    async fn test_control_answer_sends_question_verbatim() {
        let backend = Capture::default();
        let models = default_models();
        let personas = Personas::default();
        let adapter = ModelAdapter::new(&backend, &models[3], &personas);

        let answer = ControlResponder::answer("O que é Wi-Fi 7?", &adapter).await.unwrap();

        assert!(answer.citations.is_empty());
        assert_eq!(backend.prompts.lock().unwrap()[0], "O que é Wi-Fi 7?");
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let index = index();
        let responder = RagResponder::new(&index, &OneHot, 5);
        let backend = Capture {
            fail: true,
            ..Default::default()
        };
        let models = default_models();
        let personas = Personas::default();
        let adapter = ModelAdapter::new(&backend, &models[1], &personas);

        let err = responder.answer("MLO?", &adapter).await.unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn test_round_secs() {
        assert_eq!(round_secs(1.23456), 1.23);
        assert_eq!(round_secs(0.005_1), 0.01);
    }
}
