use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use coderag_core::config::{Config, Settings};
use coderag_core::traits::VectorIndexer;
use coderag_core::types::RetrievalResult;
use coderag_graph::DependencyGraph;
use coderag_hybrid::{reranker_for, CodeRetriever, DenseIndex, HybridRetriever, LexicalIndex, MultiQueryRetriever, SearchOptions};

mod input;

#[derive(Parser)]
#[command(name = "coderag", about = "Hybrid lexical + dense retrieval over code chunks")]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Corpus {
    /// JSONL file with one chunk per line
    #[arg(long)]
    chunks: PathBuf,
    /// Source tree for the import graph
    #[arg(long)]
    source: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Index the chunks and print collection stats
    Index {
        #[command(flatten)]
        corpus: Corpus,
    },
    /// Index, then run one query
    Search {
        query: String,
        #[command(flatten)]
        corpus: Corpus,
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,
        /// Dense results only
        #[arg(long)]
        dense_only: bool,
        #[arg(long)]
        no_deps: bool,
        /// Metadata equality filter, repeatable: --filter file_path=a.py
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Apply the configured reranker
        #[arg(long)]
        rerank: bool,
        /// Search every synonym expansion of the query
        #[arg(long)]
        expand: bool,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Dense collection name and row count
    Stats,
    /// Delete every row of the dense collection
    Drop,
    /// Import graph report for a source tree
    Graph {
        source: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn open_dense(settings: &Settings) -> Result<DenseIndex> {
    let embedder = coderag_embed::default_embedder(&settings.embedding)?;
    Ok(DenseIndex::open(&settings.vector_store, embedder)?)
}

fn build_retriever(settings: &Settings, corpus: &Corpus) -> Result<CodeRetriever> {
    let chunks = input::read_chunks(&corpus.chunks)?;
    let files = corpus.source.as_deref().map(input::collect_sources).transpose()?;
    let mut retriever = HybridRetriever::new(settings.retrieval.clone(), LexicalIndex::empty(), open_dense(settings)?)?
        .with_reranker(reranker_for(&settings.reranker)?);
    retriever.index(&chunks, files.as_deref()).context("indexing failed")?;
    Ok(retriever)
}

fn print_result(rank: usize, r: &RetrievalResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(r)?);
        return Ok(());
    }
    let name = r.metadata.name.as_deref().unwrap_or("-");
    let tag = if r.is_dependency() { " [dependency]" } else { "" };
    println!(
        "{rank:>3}. {:.4}  {}:{}-{}  {} {name}{tag}",
        r.score, r.metadata.file_path, r.metadata.start_line, r.metadata.end_line, r.metadata.chunk_type
    );
    Ok(())
}

fn graph_report(source: &Path, top: usize) -> Result<()> {
    let files = input::collect_sources(source)?;
    let graph = DependencyGraph::build(&files)?;
    if graph.is_null() {
        println!("No Python files parsed under {}", source.display());
        return Ok(());
    }
    println!("{} files, {} import edges", graph.node_count(), graph.edge_count());
    println!("\nMost connected:");
    for (path, degree) in graph.most_connected(top) {
        println!("  {degree:>4}  {path}");
    }
    println!("\nCore modules:");
    for (path, in_degree) in graph.core_modules(top) {
        println!("  {in_degree:>4}  {path}");
    }
    println!("\nEntry points:");
    for path in graph.entry_points().into_iter().take(top) {
        println!("        {path}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config_dir).context("loading configuration")?;
    let settings = config.settings()?;

    match cli.command {
        Command::Index { corpus } => {
            let retriever = build_retriever(&settings, &corpus)?;
            let stats = retriever.get_stats()?;
            println!("Indexed {} chunks into collection '{}'", stats.count, stats.name);
            if let Some(graph) = retriever.dependency_graph() {
                println!("Import graph: {} files, {} edges", graph.node_count(), graph.edge_count());
            }
        }
        Command::Search { query, corpus, top_k, dense_only, no_deps, filters, rerank, expand, json } => {
            let retriever = build_retriever(&settings, &corpus)?;
            if expand {
                for (i, hit) in MultiQueryRetriever::new(&retriever).search(&query, top_k)?.iter().enumerate() {
                    print_result(i + 1, &hit.result, json)?;
                    if !json {
                        println!("       matched: {}", hit.matched_queries.join(" | "));
                    }
                }
                return Ok(());
            }
            let opts = SearchOptions { top_k, use_hybrid: !dense_only, use_dependencies: !no_deps, filter: input::parse_filter(&filters)? };
            let mut results = retriever.search(&query, &opts)?;
            if rerank {
                results = retriever.rerank(&query, results, Some(top_k))?;
            }
            if results.is_empty() && !json {
                println!("No results for \"{query}\"");
            }
            for (i, r) in results.iter().enumerate() {
                print_result(i + 1, r, json)?;
            }
        }
        Command::Stats => {
            let stats = DenseIndex::open_admin(&settings.vector_store)?.stats()?;
            println!("{}: {} chunks", stats.name, stats.count);
        }
        Command::Drop => {
            let mut dense = DenseIndex::open_admin(&settings.vector_store)?;
            dense.delete_collection()?;
            println!("Cleared collection '{}'", dense.collection());
        }
        Command::Graph { source, top } => graph_report(&source, top)?,
    }
    Ok(())
}
