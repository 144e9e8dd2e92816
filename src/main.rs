//! rag-bench CLI
//!
//! Ask one model, compare the whole roster, or run a question file in batch,
//! against a local Ollama server. Without a subcommand an interactive menu
//! opens.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rag_bench::{
    benchmark::{BenchmarkReport, Harness},
    chunker::split_documents,
    config::{Config, ModelConfig},
    document::{load_corpus, page_label},
    embeddings::EmbeddingModel,
    error::RagError,
    export::save_report,
    index::{EmbeddingIndex, IndexOrigin},
    llm::{OllamaClient, has_model},
    persistence::index_size,
    questions::load_questions,
    responder::RagResponder,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Benchmark LLMs with and without retrieval-augmented generation
#[derive(Parser)]
#[command(name = "rag-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Rebuild the vector index even if a snapshot exists
    #[arg(long, global = true)]
    rebuild_index: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one model; interactive when no question is given
    Ask {
        /// Model id from the roster
        model: String,

        /// Question to answer
        question: Option<String>,
    },

    /// Ask every model the same questions; interactive when none are given
    Compare {
        /// Questions to compare on
        questions: Vec<String>,
    },

    /// Run the question file with one model and export the results
    Batch {
        /// Model id from the roster
        model: String,

        /// Question file (overrides benchmark.questions_file)
        #[arg(short, long)]
        questions: Option<PathBuf>,
    },

    /// Build (or load) the vector index and show information about it
    Index,

    /// List the model roster and whether each model is provisioned
    Models,

    /// Test the backend connection
    Test,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Only the backend checks run without a corpus
    let backend_only = matches!(cli.command, Some(Commands::Models | Commands::Test));
    if !backend_only {
        config.require_corpus().map_err(report_hint)?;
    }

    let backend = OllamaClient::new(config.backend.clone())?;
    let app = App {
        config,
        backend,
        rebuild_index: cli.rebuild_index,
    };

    match cli.command {
        Some(Commands::Ask { model, question }) => app.cmd_ask(&model, question).await,
        Some(Commands::Compare { questions }) => app.cmd_compare(questions).await,
        Some(Commands::Batch { model, questions }) => app.cmd_batch(&model, questions).await,
        Some(Commands::Index) => app.cmd_index(),
        Some(Commands::Models) => app.cmd_models().await,
        Some(Commands::Test) => app.cmd_test().await,
        None => app.menu().await,
    }
}

/// Loaded embedding model and index.
struct Retrieval {
    embedder: EmbeddingModel,
    index: EmbeddingIndex,
}

struct App {
    config: Config,
    backend: OllamaClient,
    rebuild_index: bool,
}

impl App {
    fn open_retrieval(&self) -> Result<Retrieval> {
        let corpus_dir = &self.config.corpus.dir;
        let embedder = EmbeddingModel::load(&self.config.index.embedding_model)
            .context("Failed to load embedding model")?;

        let (index, origin) = EmbeddingIndex::load_or_build(
            &self.config.index.path,
            self.rebuild_index,
            &embedder,
            || {
                let corpus = load_corpus(corpus_dir, &self.config.corpus.extensions)?;
                Ok(split_documents(&corpus.documents, &self.config.chunking))
            },
        )
        .context("Failed to prepare the vector index")?;

        match origin {
            IndexOrigin::Loaded => println!("Loaded index: {} chunks", index.len()),
            IndexOrigin::Built => println!("Built index: {} chunks", index.len()),
        }

        Ok(Retrieval { embedder, index })
    }

    /// Retrieval is only loaded when some model in `models` needs it.
    fn retrieval_for(&self, models: &[&ModelConfig]) -> Result<Option<Retrieval>> {
        if models.iter().any(|m| m.retrieval) {
            self.open_retrieval().map(Some)
        } else {
            Ok(None)
        }
    }

    fn harness<'a>(&'a self, retrieval: Option<&'a Retrieval>) -> Harness<'a, OllamaClient> {
        let rag = retrieval
            .map(|r| RagResponder::new(&r.index, &r.embedder, self.config.index.top_k));
        Harness::new(&self.backend, rag, &self.config.models, &self.config.personas)
            .with_truncation(
                self.config.benchmark.comparative_truncation,
                self.config.benchmark.batch_truncation,
            )
    }

    async fn ensure_model(&self, model: &ModelConfig) -> Result<()> {
        self.backend
            .ensure_model(&model.model)
            .await
            .map_err(report_hint)
            .with_context(|| format!("Model '{}' is not ready", model.id))
    }

    async fn cmd_ask(&self, model_id: &str, question: Option<String>) -> Result<()> {
        let model = self.config.model(model_id)?;
        self.ensure_model(model).await?;

        let retrieval = self.retrieval_for(&[model])?;
        let harness = self.harness(retrieval.as_ref());

        match question {
            Some(question) => ask_once(&harness, model, &question).await,
            None => {
                println!("\nReady: {} ({})", model.label, model.description);
                println!("Type a question, or 'sair' to go back.");
                while let Some(question) = read_question("\nPergunta: ") {
                    ask_once(&harness, model, &question).await;
                }
            }
        }

        Ok(())
    }

    async fn cmd_compare(&self, questions: Vec<String>) -> Result<()> {
        let models: Vec<&ModelConfig> = self.config.models.iter().collect();
        let retrieval = self.retrieval_for(&models)?;
        let harness = self.harness(retrieval.as_ref());

        println!("\nComparing, in order:");
        for (i, model) in ordered_roster(&self.config.models).iter().enumerate() {
            println!("{}. {}", i + 1, model.label);
        }

        let report = if questions.is_empty() {
            let prompts =
                std::iter::from_fn(|| read_question("\nPergunta para comparar (ou 'sair'): "));
            harness.compare_session(prompts).await
        } else {
            harness.compare_session(questions).await
        };

        self.finish(&report)
    }

    async fn cmd_batch(&self, model_id: &str, questions_file: Option<PathBuf>) -> Result<()> {
        let model = self.config.model(model_id)?;

        let path = questions_file.unwrap_or_else(|| self.config.benchmark.questions_file.clone());
        let set = match load_questions(&path, self.config.benchmark.expected_questions) {
            Ok(set) => set,
            Err(e) => {
                println!("Cannot run batch: {}", report_hint(e));
                return Ok(());
            }
        };
        for warning in &set.warnings {
            println!("Warning: {}", warning);
        }
        println!("{} questions loaded", set.questions.len());

        self.ensure_model(model).await?;
        let retrieval = self.retrieval_for(&[model])?;
        let harness = self.harness(retrieval.as_ref());

        let report = harness.run_batch(model, &set.questions).await;
        self.finish(&report)
    }

    fn cmd_index(&self) -> Result<()> {
        let start = Instant::now();
        let retrieval = self.open_retrieval()?;
        let index = &retrieval.index;
        let path = &self.config.index.path;

        println!("\nIndex: {}", path.display());
        println!("  Chunks:     {}", index.len());
        println!("  Model:      {}", index.embedding_model());
        println!("  Dimension:  {}", index.dimension());
        if let Ok(size) = index_size(path) {
            println!("  File size:  {:.1} KB", size as f64 / 1024.0);
        }
        println!("  Time:       {:.2?}", start.elapsed());

        Ok(())
    }

    async fn cmd_models(&self) -> Result<()> {
        let available = match self.backend.list_models().await {
            Ok(models) => Some(models),
            Err(e) => {
                println!("Backend not reachable: {}", report_hint(e));
                None
            }
        };

        println!("\n{:<12} {:<20} {:<10} {}", "ID", "LABEL", "STATUS", "DESCRIPTION");
        for model in &self.config.models {
            let status = match &available {
                Some(names) if has_model(names, &model.model) => "ready",
                Some(_) => "missing",
                None => "unknown",
            };
            println!(
                "{:<12} {:<20} {:<10} {}",
                model.id, model.label, status, model.description
            );
        }

        Ok(())
    }

    async fn cmd_test(&self) -> Result<()> {
        println!("Testing backend at {}...", self.config.backend.base_url);

        match self.backend.test_connection().await {
            Ok(count) => {
                println!("Connection successful! {} models provisioned.", count);
                Ok(())
            }
            Err(e) => {
                let e = report_hint(e);
                bail!("Connection failed: {}", e)
            }
        }
    }

    fn finish(&self, report: &BenchmarkReport) -> Result<()> {
        report.print_summary();
        match save_report(report, &self.config.benchmark.output_dir)
            .context("Failed to export results")?
        {
            Some(path) => println!("Results saved to {}", path.display()),
            None => println!("Nothing to export."),
        }
        Ok(())
    }

    async fn menu(&self) -> Result<()> {
        println!("\n{}", "=".repeat(50));
        println!("{:^50}", "LLM MODEL COMPARISON");
        println!("{}", "=".repeat(50));

        loop {
            println!("\n1. Individual mode (one model)");
            println!("2. Comparative benchmark (all models)");
            println!("3. Batch test (question file)");
            println!("4. Exit");

            let Some(choice) = read_line("\nChoose a mode (1/2/3/4): ") else {
                return Ok(());
            };

            // A failed mode reports and returns to the menu
            let outcome = match choice.as_str() {
                "1" => match self.select_model() {
                    Some(id) => self.cmd_ask(&id, None).await,
                    None => continue,
                },
                "2" => self.cmd_compare(Vec::new()).await,
                "3" => match self.select_model() {
                    Some(id) => self.cmd_batch(&id, None).await,
                    None => continue,
                },
                "4" => {
                    println!("Bye.");
                    return Ok(());
                }
                _ => {
                    println!("Invalid option.");
                    continue;
                }
            };

            if let Err(e) = outcome {
                println!("\nError: {:#}", e);
            }
        }
    }

    fn select_model(&self) -> Option<String> {
        println!("\nAvailable models:");
        for (i, model) in self.config.models.iter().enumerate() {
            println!("{}. {:<12} {}", i + 1, model.id, model.description);
        }

        loop {
            let choice = read_line("Model (number or id): ")?;
            let picked = choice
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| self.config.models.get(i))
                .or_else(|| self.config.models.iter().find(|m| m.id == choice));

            match picked {
                Some(model) => return Some(model.id.clone()),
                None => println!("Unknown model '{}'.", choice),
            }
        }
    }
}

async fn ask_once(harness: &Harness<'_, OllamaClient>, model: &ModelConfig, question: &str) {
    match harness.answer(model, question).await {
        Ok(answer) => {
            println!("\nAnswer ({}s):", answer.elapsed_secs);
            println!("{}", answer.response.trim());
            if !answer.citations.is_empty() {
                println!("\nSources:");
                for hit in &answer.citations {
                    println!(
                        "- {} (página {}) [{:.3}]",
                        hit.chunk.source,
                        page_label(hit.chunk.page),
                        hit.score
                    );
                }
            }
        }
        Err(e) => println!("\nError: {}", report_hint(e)),
    }
}

/// Controls first, then RAG variants, as the comparison runs them.
fn ordered_roster(models: &[ModelConfig]) -> Vec<&ModelConfig> {
    let mut ordered: Vec<&ModelConfig> = models.iter().filter(|m| m.is_control()).collect();
    ordered.extend(models.iter().filter(|m| !m.is_control()));
    ordered
}

/// Print the remediation hint, if any, and hand the error back.
fn report_hint(err: RagError) -> RagError {
    if let Some(hint) = err.remediation_hint() {
        println!("Hint: {}", hint);
    }
    err
}

/// One trimmed line from stdin; `None` at end of input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    std::io::stdout().flush().ok()?;

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Next non-empty question; `None` at end of input or on `sair` / `quit`.
fn read_question(prompt: &str) -> Option<String> {
    loop {
        let line = read_line(prompt)?;
        match line.to_lowercase().as_str() {
            "sair" | "quit" => return None,
            "" => continue,
            _ => return Some(line),
        }
    }
}
