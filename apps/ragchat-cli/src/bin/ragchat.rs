use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use ragchat_core::config::{Config, Settings, StoreBackend};
use ragchat_core::data_processor::{DataProcessor, TextChunker};
use ragchat_core::traits::{EmbeddingProvider, VectorStore};
use ragchat_embed::get_default_embedder;
use ragchat_orchestrator::fingerprint::fingerprint;
use ragchat_orchestrator::{Answer, IngestMode, Ingestor, Orchestrator, Session};
use ragchat_remote::{DuckDuckGoSearch, OpenAiChat};
use ragchat_vector::open_store;

#[derive(Debug, Parser)]
#[command(name = "ragchat", about = "Document-first question answering with web fallback")]
struct Cli {
    /// Configuration environment (dev, prod, test); defaults to RUST_ENV
    #[arg(long, global = true, env = "RUST_ENV", default_value = "dev")]
    env: String,

    /// Override store.backend
    #[arg(long, global = true, value_parser = parse_backend)]
    backend: Option<StoreBackend>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chunk, embed and store every .txt/.md file under a directory
    Ingest {
        dir: PathBuf,
        /// Replace the stored corpus instead of appending
        #[arg(long)]
        replace: bool,
        /// Only process the first N files
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Answer a single question
    Ask {
        question: String,
        #[command(flatten)]
        opts: SessionOpts,
    },
    /// Interactive conversation (/retry, /stats, /reset, /quit)
    Chat {
        #[command(flatten)]
        opts: SessionOpts,
    },
    /// Show store contents and its fingerprint
    Stats,
}

#[derive(Debug, Args)]
struct SessionOpts {
    /// Load this directory as the corpus before answering (replaces the stored corpus)
    #[arg(long)]
    docs: Option<PathBuf>,
    /// Add `--docs` to the stored corpus instead of replacing it
    #[arg(long, requires = "docs")]
    append: bool,
    /// Disable the web-search fallback
    #[arg(long)]
    no_web: bool,
}

impl SessionOpts {
    fn docs_mode(&self) -> IngestMode {
        if self.append {
            IngestMode::Append
        } else {
            IngestMode::Replace
        }
    }
}

fn parse_backend(s: &str) -> std::result::Result<StoreBackend, String> {
    match s {
        "flat" => Ok(StoreBackend::Flat),
        "lance" => Ok(StoreBackend::Lance),
        other => Err(format!("unknown backend '{other}' (expected flat or lance)")),
    }
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).with_writer(std::io::stderr).init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let config = Config::load_for_env(&cli.env).context("loading configuration")?;
    let mut settings = config.settings().context("validating configuration")?;
    if let Some(backend) = cli.backend {
        settings.store.backend = backend;
    }
    Ok(settings)
}

struct Runtime {
    settings: Settings,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl Runtime {
    async fn open(settings: Settings) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::from(get_default_embedder(&settings.embedding).context("loading embedder")?);
        let store = open_store(&settings.store, embedder.dim()).await.context("opening vector store")?;
        info!(store = %store.kind(), embedder = embedder.id(), "ready");
        Ok(Self { settings, embedder, store })
    }

    async fn ingest(&self, dir: &Path, mode: IngestMode, limit: Option<usize>) -> Result<usize> {
        let chunker = TextChunker::from_settings(&self.settings.ingest)?;
        let batch = DataProcessor::new(chunker).process_directory(dir, limit)?;
        if batch.is_empty() {
            println!("No .txt or .md files found under {}", dir.display());
            return Ok(0);
        }

        let pb = ProgressBar::new(batch.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
                .context("progress template")?
                .progress_chars("#>-"),
        );
        let ingestor = Ingestor::new(Arc::clone(&self.embedder));
        let written = ingestor
            .ingest_with_progress(self.store.as_ref(), batch, mode, |n| pb.set_position(n as u64))
            .await?;
        pb.finish_and_clear();
        println!("Stored {written} chunks from {} ({} backend)", dir.display(), self.store.kind());
        Ok(written)
    }

    fn session(&self, opts: &SessionOpts) -> Result<Session> {
        let llm = Arc::new(OpenAiChat::from_settings(&self.settings.llm)?);
        let mut orchestrator = Orchestrator::from_settings(&self.settings, Arc::clone(&self.embedder), llm);
        if !opts.no_web {
            orchestrator = orchestrator.with_web_search(Arc::new(DuckDuckGoSearch::default()));
        }
        Ok(Session::new(Arc::new(orchestrator), &self.settings.cache.eviction).with_store(Arc::clone(&self.store)))
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    let origin = if answer.cached { ", cached" } else { "" };
    println!("\n(answered in {:.2}s{origin})", answer.elapsed_seconds);
}

async fn print_timings(session: &Session) {
    let summary = session.timings().summary().await;
    if summary.is_empty() {
        println!("No timed answers yet.");
    }
    for line in summary {
        println!("{}: {} answers, average {:.2}s", line.kind, line.count, line.mean_seconds);
    }
    let stats = session.cache().stats().await;
    println!("cache: {} entries, {} hits, {} misses", stats.entries, stats.hits, stats.misses);
}

async fn chat(mut session: Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        let result = match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/stats" => {
                print_timings(&session).await;
                continue;
            }
            "/reset" => {
                session.reset().await;
                println!("History and cache cleared.");
                continue;
            }
            "/retry" => session.retry().await,
            question => session.ask(question).await,
        };
        match result {
            Ok(answer) => print_answer(&answer),
            Err(e) if session.pending().is_some() => eprintln!("error: {e}\n(type /retry to try again)"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    print_timings(&session).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let runtime = Runtime::open(settings).await?;

    match &cli.command {
        Command::Ingest { dir, replace, limit } => {
            let mode = if *replace { IngestMode::Replace } else { IngestMode::Append };
            runtime.ingest(dir, mode, *limit).await?;
        }
        Command::Ask { question, opts } => {
            if let Some(dir) = &opts.docs {
                runtime.ingest(dir, opts.docs_mode(), None).await?;
            }
            let mut session = runtime.session(opts)?;
            let answer = session.ask(question).await?;
            print_answer(&answer);
        }
        Command::Chat { opts } => {
            if let Some(dir) = &opts.docs {
                runtime.ingest(dir, opts.docs_mode(), None).await?;
            }
            chat(runtime.session(opts)?).await?;
        }
        Command::Stats => {
            let count = runtime.store.count().await?;
            println!("backend:     {}", runtime.store.kind());
            println!("dimension:   {}", runtime.store.dimension());
            println!("chunks:      {count}");
            println!("fingerprint: {}", fingerprint(runtime.store.as_ref()).await);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_opts(args: &[&str]) -> SessionOpts {
        match Cli::try_parse_from(args).unwrap().command {
            Command::Ask { opts, .. } | Command::Chat { opts } => opts,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn docs_replace_the_corpus_by_default() {
        let opts = session_opts(&["ragchat", "ask", "what?", "--docs", "notes"]);
        assert_eq!(opts.docs_mode(), IngestMode::Replace);
        let opts = session_opts(&["ragchat", "chat", "--docs", "notes"]);
        assert_eq!(opts.docs_mode(), IngestMode::Replace);
    }

    #[test]
    fn append_flag_keeps_the_stored_corpus() {
        let opts = session_opts(&["ragchat", "chat", "--docs", "notes", "--append"]);
        assert_eq!(opts.docs_mode(), IngestMode::Append);
        assert!(Cli::try_parse_from(["ragchat", "chat", "--append"]).is_err(), "--append needs --docs");
    }
}
