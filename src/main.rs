use std::{io::Write, path::PathBuf, sync::Arc};

use ai_llm_service::{LlmServiceProfiles, telemetry};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use contextor::{AskOptions, Contextor, ContextorConfig, IndicatifProgress, Language, Reference};
use futures::StreamExt;
use rag_store::{LlmEmbedder, RagConfig, RagStore};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "docqa", version, about = "Question answering over ingested documents", rename_all = "kebab")]
struct Args {
    /// Log level for the workspace crates (overridden per target by RUST_LOG).
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Answer a question from the command line.
    Ask {
        question: String,
        /// Restrict retrieval to these documents (repeatable).
        #[arg(long = "include")]
        include: Vec<String>,
        /// Exclude these documents (repeatable).
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        /// Answer language: zh or en.
        #[arg(long)]
        language: Option<String>,
        /// Search with the original question only.
        #[arg(long)]
        no_split: bool,
        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
        /// Also search blocked documents.
        #[arg(long)]
        include_blocked: bool,
    },
    /// Store a chunk file (JSON array or JSONL) under a document id.
    Ingest {
        #[arg(long)]
        document_id: String,
        file: PathBuf,
    },
    /// List stored documents.
    Documents {
        #[arg(long)]
        only_blocked: bool,
        /// Print collection totals instead of the document list.
        #[arg(long)]
        stats: bool,
    },
    /// Hide a document from retrieval.
    Block { document_id: String },
    /// Make a blocked document searchable again.
    Unblock { document_id: String },
    /// Delete every chunk of a document.
    Delete { document_id: String },
    /// Drop the whole collection.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;

    match args.command {
        Command::Serve => api::start().await?,
        Command::Ask {
            question,
            include,
            exclude,
            language,
            no_split,
            stream,
            include_blocked,
        } => {
            let language = language
                .as_deref()
                .map(str::parse::<Language>)
                .transpose()?;
            let opts = AskOptions {
                include_documents: (!include.is_empty()).then_some(include),
                exclude_documents: exclude,
                include_blocked,
                language,
                decompose: !no_split,
            };
            ask(&question, opts, stream).await?;
        }
        Command::Ingest { document_id, file } => {
            let (_, store) = open_store()?;
            let report = store
                .insert_file(&document_id, &file, true)
                .await
                .with_context(|| format!("ingesting {}", file.display()))?;
            println!(
                "{}: stored {} of {} chunks ({} empty skipped)",
                report.document_id, report.chunks_stored, report.chunks_received, report.skipped_empty
            );
        }
        Command::Documents {
            only_blocked,
            stats,
        } => {
            let (_, store) = open_store()?;
            if stats {
                println!("{}", serde_json::to_string_pretty(&store.stats().await?)?);
            } else {
                let docs = store.list_documents(only_blocked.then_some(true)).await?;
                for d in &docs {
                    let flag = if d.blocked { "blocked" } else { "active" };
                    println!(
                        "{}\t{flag}\t{} pages\t{} chunks",
                        d.document_id, d.page_count, d.chunk_count
                    );
                }
                info!(count = docs.len(), "documents listed");
            }
        }
        Command::Block { document_id } => {
            open_store()?.1.set_blocked(&document_id, true).await?;
            println!("{document_id} blocked");
        }
        Command::Unblock { document_id } => {
            open_store()?.1.set_blocked(&document_id, false).await?;
            println!("{document_id} unblocked");
        }
        Command::Delete { document_id } => {
            open_store()?.1.delete_document(&document_id).await?;
            println!("{document_id} deleted");
        }
        Command::Clear => {
            let (_, store) = open_store()?;
            store.clear().await?;
            println!("collection {} cleared", store.collection());
        }
    }

    Ok(())
}

/// Console output keeps third-party crates at their RUST_LOG level and the
/// workspace crates at `log_level`.
fn init_tracing(log_level: Option<&str>) -> anyhow::Result<()> {
    let level = telemetry::parse_level(log_level);
    let filter: EnvFilter = telemetry::env_filter_with_level("warn", level);
    tracing_subscriber::registry()
        .with(filter)
        .with(telemetry::layer())
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

fn open_store() -> anyhow::Result<(Arc<LlmServiceProfiles>, RagStore)> {
    let llm = Arc::new(LlmServiceProfiles::from_env().context("loading model profiles")?);
    let cfg = RagConfig::from_env().context("loading vector store config")?;
    cfg.check_embedding_dim(llm.embedding_dim())?;
    let store = RagStore::new(cfg, Arc::new(LlmEmbedder::new(llm.clone())))?;
    Ok((llm, store))
}

async fn ask(question: &str, opts: AskOptions, stream: bool) -> anyhow::Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }
    let (llm, store) = open_store()?;
    let cfg = ContextorConfig::from_env().context("loading pipeline config")?;
    let contextor =
        Contextor::from_services(cfg, &store, llm)?.with_progress(Arc::new(IndicatifProgress::spinner()));

    if stream {
        let answer = contextor.ask_stream(question, opts).await?;
        let mut out = std::io::stdout();
        let mut fragments = answer.fragments;
        while let Some(fragment) = fragments.next().await {
            write!(out, "{fragment}")?;
            out.flush()?;
        }
        writeln!(out)?;
        print_references(&answer.references);
    } else {
        let qa = contextor.ask(question, opts).await?;
        println!("{}", qa.answer);
        print_references(&qa.references);
    }
    Ok(())
}

fn print_references(refs: &[Reference]) {
    if refs.is_empty() {
        return;
    }
    println!("\nReferences:");
    for r in refs {
        println!(
            "  [{}] {} p.{} ({:.3})",
            r.rank, r.document_id, r.page, r.relevance_score
        );
    }
}
