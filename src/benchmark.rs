//! Benchmark harness.
//!
//! Runs questions through the model roster and records one [`QueryResult`]
//! per (question, model) pair. A failing pair becomes an error row; it never
//! stops the run.

use crate::config::{ModelConfig, Personas};
use crate::error::{RagError, Result};
use crate::llm::{Backend, ModelAdapter};
use crate::responder::{Answer, ControlResponder, RagResponder};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Sources field of a control row.
pub const CONTROL_SOURCES: &str = "N/A (resposta controle)";
/// Sources field of a failed row.
pub const FAILED_SOURCES: &str = "N/A";
/// Response prefix of a failed row.
pub const ERROR_PREFIX: &str = "ERRO: ";

/// Character limits applied to recorded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub question_chars: usize,
    pub response_chars: usize,
    /// Append `...` to cut text.
    pub ellipsis: bool,
}

impl Truncation {
    /// Limits for comparative mode: short, marked cuts.
    pub fn comparative() -> Self {
        Self {
            question_chars: 80,
            response_chars: 500,
            ellipsis: true,
        }
    }

    /// Limits for batch mode: long, silent cuts.
    pub fn batch() -> Self {
        Self {
            question_chars: 500,
            response_chars: 2000,
            ellipsis: false,
        }
    }

    pub fn question(&self, text: &str) -> String {
        truncate(text, self.question_chars, self.ellipsis)
    }

    pub fn response(&self, text: &str) -> String {
        truncate(text.trim(), self.response_chars, self.ellipsis)
    }
}

fn truncate(text: &str, max_chars: usize, ellipsis: bool) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) if ellipsis => format!("{}...", &text[..cut]),
        Some((cut, _)) => text[..cut].to_string(),
    }
}

/// One recorded (question, model) outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Model column: the label in comparative runs, the id in batch runs.
    pub model: String,
    pub question: String,
    /// Two decimals; zero for failed rows.
    pub elapsed_secs: f64,
    pub response: String,
    /// `source (p.page)` per retrieved chunk, in retrieval order.
    pub sources: Vec<String>,
    pub control: bool,
    pub error: Option<String>,
}

impl QueryResult {
    fn answered(
        model: &ModelConfig,
        question: String,
        answer: Answer,
        truncation: &Truncation,
    ) -> Self {
        Self {
            model: model.label.clone(),
            question,
            elapsed_secs: answer.elapsed_secs,
            response: truncation.response(&answer.response),
            sources: answer.citations.iter().map(|hit| hit.chunk.citation()).collect(),
            control: model.is_control(),
            error: None,
        }
    }

    fn failed(model: &ModelConfig, question: String, error: &RagError) -> Self {
        Self {
            model: model.label.clone(),
            question,
            elapsed_secs: 0.0,
            response: format!("{}{}", ERROR_PREFIX, error),
            sources: Vec::new(),
            control: model.is_control(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The `Fontes` column.
    pub fn sources_field(&self) -> String {
        if !self.is_success() {
            FAILED_SOURCES.to_string()
        } else if self.control {
            CONTROL_SOURCES.to_string()
        } else {
            self.sources.join("; ")
        }
    }
}

/// What kind of run produced a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Comparative,
    Batch { model: String },
}

/// All rows of a run plus timing.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub mode: RunMode,
    pub rows: Vec<QueryResult>,
    /// Questions processed.
    pub questions: usize,
    /// Wall time of the whole run (seconds).
    pub total_time_secs: f64,
}

impl BenchmarkReport {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            rows: Vec::new(),
            questions: 0,
            total_time_secs: 0.0,
        }
    }

    pub fn attempted(&self) -> usize {
        self.rows.len()
    }

    pub fn succeeded(&self) -> usize {
        self.rows.iter().filter(|r| r.is_success()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean elapsed time of successful rows, per model in first-seen order.
    /// A model with no successful row is reported as `None`.
    pub fn average_times(&self) -> Vec<(String, Option<f64>)> {
        let mut models: Vec<(String, f64, usize)> = Vec::new();

        for row in &self.rows {
            let pos = match models.iter().position(|(m, _, _)| *m == row.model) {
                Some(pos) => pos,
                None => {
                    models.push((row.model.clone(), 0.0, 0));
                    models.len() - 1
                }
            };
            if row.is_success() {
                models[pos].1 += row.elapsed_secs;
                models[pos].2 += 1;
            }
        }

        models
            .into_iter()
            .map(|(model, total, n)| (model, (n > 0).then(|| total / n as f64)))
            .collect()
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Benchmark Results ==========");
        match &self.mode {
            RunMode::Comparative => println!("Mode: comparative"),
            RunMode::Batch { model } => println!("Mode: batch ({})", model),
        }
        println!("Questions: {}", self.questions);
        println!("----------------------------------------");
        for (model, avg) in self.average_times() {
            match avg {
                Some(avg) => println!("{:<24} avg {:>7.2}s", model, avg),
                None => println!("{:<24} no answers", model),
            }
        }
        println!("----------------------------------------");
        println!("Answered: {}/{}", self.succeeded(), self.attempted());
        println!("Total time: {:.1}s", self.total_time_secs);
        println!("========================================\n");
    }
}

/// Runs questions across the roster.
pub struct Harness<'a, B: Backend + ?Sized> {
    backend: &'a B,
    rag: Option<RagResponder<'a>>,
    roster: &'a [ModelConfig],
    personas: &'a Personas,
    comparative: Truncation,
    batch: Truncation,
}

impl<'a, B: Backend + ?Sized> Harness<'a, B> {
    /// Without a RAG responder, only control variants can answer.
    pub fn new(
        backend: &'a B,
        rag: Option<RagResponder<'a>>,
        roster: &'a [ModelConfig],
        personas: &'a Personas,
    ) -> Self {
        Self {
            backend,
            rag,
            roster,
            personas,
            comparative: Truncation::comparative(),
            batch: Truncation::batch(),
        }
    }

    /// Override the per-mode truncation limits.
    pub fn with_truncation(mut self, comparative: Truncation, batch: Truncation) -> Self {
        self.comparative = comparative;
        self.batch = batch;
        self
    }

    /// Answer one question with one variant, untruncated.
    pub async fn answer(&self, model: &ModelConfig, question: &str) -> Result<Answer> {
        let adapter = ModelAdapter::new(self.backend, model, self.personas);

        if model.is_control() {
            return ControlResponder::answer(question, &adapter).await;
        }

        match &self.rag {
            Some(rag) => rag.answer(question, &adapter).await,
            None => Err(RagError::InvalidConfig(format!(
                "model '{}' uses retrieval but no index is loaded",
                model.id
            ))),
        }
    }

    /// Answer and record; a failure becomes an error row.
    pub async fn run_one(
        &self,
        model: &ModelConfig,
        question: &str,
        truncation: &Truncation,
    ) -> QueryResult {
        let recorded_question = truncation.question(question);

        match self.answer(model, question).await {
            Ok(answer) => {
                tracing::info!("✓ {:<24} | {:.2}s", model.label, answer.elapsed_secs);
                QueryResult::answered(model, recorded_question, answer, truncation)
            }
            Err(e) => {
                tracing::error!("✗ {} failed: {}", model.label, e);
                if let Some(hint) = e.remediation_hint() {
                    tracing::warn!("{}", hint);
                }
                QueryResult::failed(model, recorded_question, &e)
            }
        }
    }

    /// Every control variant first, then every RAG variant, in roster order.
    pub async fn compare(&self, question: &str) -> Vec<QueryResult> {
        let ordered = self
            .roster
            .iter()
            .filter(|m| m.is_control())
            .chain(self.roster.iter().filter(|m| !m.is_control()));

        let mut rows = Vec::with_capacity(self.roster.len());
        for model in ordered {
            rows.push(self.run_one(model, question, &self.comparative).await);
        }
        rows
    }

    /// Compare every question of a (possibly interactive) sequence until it ends.
    pub async fn compare_session<I>(&self, questions: I) -> BenchmarkReport
    where
        I: IntoIterator<Item = String>,
    {
        let start = Instant::now();
        let mut report = BenchmarkReport::new(RunMode::Comparative);

        for question in questions {
            tracing::info!(
                "Comparing {} models on: {}",
                self.roster.len(),
                truncate(&question, 70, true)
            );
            report.rows.extend(self.compare(&question).await);
            report.questions += 1;
        }

        report.total_time_secs = start.elapsed().as_secs_f64();
        report
    }

    /// Run `questions` in order with one variant.
    pub async fn run_batch(&self, model: &ModelConfig, questions: &[String]) -> BenchmarkReport {
        let start = Instant::now();
        let mut report = BenchmarkReport::new(RunMode::Batch {
            model: model.id.clone(),
        });
        let total = questions.len();

        tracing::info!("Running {} questions with {}", total, model.id);

        for (i, question) in questions.iter().enumerate() {
            tracing::info!("Progress: {}/{} | {}", i + 1, total, truncate(question, 70, true));

            let mut row = self.run_one(model, question, &self.batch).await;
            row.model = model.id.clone();
            report.rows.push(row);
            report.questions += 1;
        }

        report.total_time_secs = start.elapsed().as_secs_f64();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_models;
    use crate::llm::GenerationRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the model name; fails for the models listed in `down`.
    struct Scripted {
        down: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(down: Vec<&'static str>) -> Self {
            Self {
                down,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Backend for Scripted {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            self.calls.lock().unwrap().push(request.model.to_string());
            if self.down.iter().any(|m| *m == request.model) {
                return Err(RagError::unreachable(request.model, "connection refused"));
            }
            Ok(format!("  resposta de {}  ", request.model))
        }
    }

    fn controls_only() -> Vec<ModelConfig> {
        default_models().into_iter().filter(|m| m.is_control()).collect()
    }

    #[test]
    fn test_truncation_limits() {
        let cmp = Truncation::comparative();
        let long = "é".repeat(100);
        let cut = cmp.question(&long);
        assert_eq!(cut.chars().count(), 83);
        assert!(cut.ends_with("..."));
        assert_eq!(cmp.question("curta"), "curta");

        let batch = Truncation::batch();
        let response = "x".repeat(2500);
        assert_eq!(batch.response(&response).len(), 2000);
        assert_eq!(batch.question(&"q".repeat(80)).len(), 80);
    }

    #[test]
    fn test_sources_field() {
        let models = default_models();
        let answer = Answer {
            response: "ok".to_string(),
            citations: Vec::new(),
            elapsed_secs: 1.5,
        };

        let control = QueryResult::answered(&models[3], "q".into(), answer, &Truncation::batch());
        assert_eq!(control.sources_field(), CONTROL_SOURCES);

        let failed = QueryResult::failed(&models[0], "q".into(), &RagError::LlmApi("500".into()));
        assert_eq!(failed.sources_field(), FAILED_SOURCES);
        assert_eq!(failed.elapsed_secs, 0.0);
        assert!(failed.response.starts_with("ERRO: "));
    }

    #[tokio::test]
    async fn test_compare_runs_controls_first() {
        let backend = Scripted::new(vec![]);
        let models = default_models();
        let personas = Personas::default();
        let harness = Harness::new(&backend, None, &models, &personas);

        let rows = harness.compare("O que é Wi-Fi 7?").await;
        let labels: Vec<_> = rows.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(
            labels,
            ["llama2 (CONTROLE)", "Mistral (RAG)", "Llama2 (RAG)", "TinyLlama (RAG)"]
        );

        // Control answered; RAG rows fail without an index but are still recorded
        assert!(rows[0].is_success());
        assert_eq!(rows[0].response, "resposta de llama2");
        assert!(rows[1..].iter().all(|r| !r.is_success()));
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_row_does_not_stop_batch() {
        let backend = Scripted::new(vec!["llama2"]);
        let models = controls_only();
        let personas = Personas::default();
        let harness = Harness::new(&backend, None, &models, &personas);

        let questions = vec!["um?".to_string(), "dois?".to_string()];
        let report = harness.run_batch(&models[0], &questions).await;

        assert_eq!(report.attempted(), 2);
        assert_eq!(report.succeeded(), 0);
        assert!(report.rows.iter().all(|r| r.model == "llama2_raw"));
        assert!(report.rows.iter().all(|r| r.elapsed_secs == 0.0));
        assert_eq!(report.average_times(), vec![("llama2_raw".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_session_ends_with_its_input() {
        let backend = Scripted::new(vec![]);
        let models = controls_only();
        let personas = Personas::default();
        let harness = Harness::new(&backend, None, &models, &personas);

        let report = harness
            .compare_session(vec!["a?".to_string(), "b?".to_string(), "c?".to_string()])
            .await;

        assert_eq!(report.questions, 3);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.mode, RunMode::Comparative);
    }

    #[test]
    fn test_average_times_skip_failures() {
        let models = default_models();
        let ok = |secs: f64| {
            QueryResult::answered(
                &models[0],
                "q".into(),
                Answer {
                    response: "r".into(),
                    citations: Vec::new(),
                    elapsed_secs: secs,
                },
                &Truncation::batch(),
            )
        };

        let mut report = BenchmarkReport::new(RunMode::Comparative);
        report.rows = vec![
            ok(1.0),
            QueryResult::failed(&models[0], "q".into(), &RagError::LlmApi("x".into())),
            ok(3.0),
        ];

        assert_eq!(
            report.average_times(),
            vec![("Mistral (RAG)".to_string(), Some(2.0))]
        );
    }
}
