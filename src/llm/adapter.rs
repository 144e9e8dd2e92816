//! Binds a roster entry to a backend.

use super::client::{Backend, GenerationRequest};
use crate::config::{ModelConfig, Personas};
use crate::error::Result;

/// A configured model variant: backend, sampling parameters and persona.
pub struct ModelAdapter<'a, B: Backend + ?Sized> {
    backend: &'a B,
    config: &'a ModelConfig,
    persona: &'a str,
}

impl<'a, B: Backend + ?Sized> ModelAdapter<'a, B> {
    /// The persona follows the variant's retrieval flag.
    pub fn new(backend: &'a B, config: &'a ModelConfig, personas: &'a Personas) -> Self {
        Self {
            backend,
            config,
            persona: personas.for_model(config),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        self.config
    }

    /// Send one prompt and return the full response.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerationRequest {
            model: &self.config.model,
            system: self.persona,
            prompt,
            temperature: self.config.temperature,
            num_thread: self.config.num_thread,
        };
        self.backend.generate(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_models;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, String, Option<u32>)>>,
    }

    #[async_trait]
    impl Backend for Recorder {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            self.seen.lock().unwrap().push((
                request.model.to_string(),
                request.system.to_string(),
                request.num_thread,
            ));
            Ok(format!("eco: {}", request.prompt))
        }
    }

    #[tokio::test]
    async fn test_control_variant_uses_control_persona() {
        let backend = Recorder::default();
        let models = default_models();
        let personas = Personas::default();

        let adapter = ModelAdapter::new(&backend, &models[3], &personas);
        assert_eq!(adapter.generate("Oi").await.unwrap(), "eco: Oi");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0, "llama2");
        assert_eq!(seen[0].1, personas.control);
        assert_eq!(seen[0].2, None);
    }

    #[tokio::test]
    async fn test_rag_variant_passes_thread_hint() {
        let backend = Recorder::default();
        let models = default_models();
        let personas = Personas::default();

        ModelAdapter::new(&backend, &models[2], &personas)
            .generate("Oi")
            .await
            .unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0, "tinyllama");
        assert_eq!(seen[0].1, personas.rag);
        assert_eq!(seen[0].2, Some(2));
    }
}
