use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use search_core::{
    log_duration, process_queries, process_queries_joined, remove_duplicates, status_is,
    DocumentStatus, ExecutionPolicy, RequestQueue, SearchConfig, SearchServer,
};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: i32,
    text: String,
    #[serde(default)]
    status: DocumentStatus,
    #[serde(default)]
    ratings: Vec<i32>,
}

#[derive(Parser)]
#[command(name = "search-cli")]
#[command(about = "Query an in-memory TF-IDF index built from JSON/JSONL documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CorpusArgs {
    /// Input path (file or directory of .json/.jsonl documents)
    #[arg(long)]
    corpus: String,
    /// Space-separated stop words
    #[arg(long, default_value = "")]
    stop_words: String,
    /// Worker threads for parallel operations (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the top documents for a query
    Search {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(long)]
        query: String,
        /// Only documents with this status (actual, irrelevant, banned, removed)
        #[arg(long, default_value = "actual")]
        status: DocumentStatus,
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Print the query words found in one document
    Match {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(long)]
        query: String,
        #[arg(long)]
        id: i32,
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Run every line of a file as a query on the worker pool
    Batch {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// File with one query per line
        #[arg(long)]
        queries: PathBuf,
        /// Print one flat list instead of one list per query
        #[arg(long, default_value_t = false)]
        joined: bool,
    },
    /// Remove documents whose word sets repeat an earlier document
    Dedup {
        #[command(flatten)]
        corpus: CorpusArgs,
    },
    /// Replay queries through a request queue and report requests without results
    Stats {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(long)]
        queries: PathBuf,
        #[arg(long, default_value_t = search_core::MIN_IN_DAY)]
        window: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search { corpus, query, status, parallel } => {
            let server = load_server(&corpus)?;
            let docs = server.find_top_documents_policy(policy(parallel), &query, status_is(status))?;
            for doc in docs {
                println!("{}", serde_json::to_string(&doc)?);
            }
        }
        Commands::Match { corpus, query, id, parallel } => {
            let server = load_server(&corpus)?;
            let (words, status) = server.match_document_policy(policy(parallel), &query, id)?;
            let out = serde_json::json!({ "document_id": id, "status": status, "words": words });
            println!("{out}");
        }
        Commands::Batch { corpus, queries, joined } => {
            let server = load_server(&corpus)?;
            let queries = read_queries(&queries)?;
            log_duration!("batch queries");
            if joined {
                for doc in process_queries_joined(&server, &queries)? {
                    println!("{}", serde_json::to_string(&doc)?);
                }
            } else {
                for (query, docs) in queries.iter().zip(process_queries(&server, &queries)?) {
                    let out = serde_json::json!({ "query": query, "results": docs });
                    println!("{out}");
                }
            }
        }
        Commands::Dedup { corpus } => {
            let mut server = load_server(&corpus)?;
            let removed = remove_duplicates(&mut server);
            tracing::info!(removed = removed.len(), remaining = server.document_count(), "dedup complete");
            println!("{}", serde_json::to_string(&removed)?);
        }
        Commands::Stats { corpus, queries, window } => {
            let server = load_server(&corpus)?;
            let mut queue = RequestQueue::with_window(&server, window)?;
            for query in read_queries(&queries)? {
                queue.add_find_request(&query)?;
            }
            println!("Total empty requests: {}", queue.no_result_requests());
        }
    }
    Ok(())
}

fn policy(parallel: bool) -> ExecutionPolicy {
    if parallel {
        ExecutionPolicy::Parallel
    } else {
        ExecutionPolicy::Sequential
    }
}

fn load_server(args: &CorpusArgs) -> Result<SearchServer> {
    log_duration!("load corpus");
    let config = args.workers.map(SearchConfig::with_workers).unwrap_or_default();
    let mut server = SearchServer::with_config(args.stop_words.split(' '), config)?;
    for file in collect_files(Path::new(&args.corpus)) {
        for doc in read_docs(&file)? {
            server
                .add_document(doc.id, &doc.text, doc.status, &doc.ratings)
                .with_context(|| format!("document {} in {}", doc.id, file.display()))?;
        }
    }
    tracing::info!(
        num_docs = server.document_count(),
        workers = server.config().workers,
        corpus = %args.corpus,
        "corpus loaded"
    );
    Ok(server)
}

fn collect_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn read_docs(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("open {}", file.display()))?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut docs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            docs.push(serde_json::from_str(&line)?);
        }
        return Ok(docs);
    }
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => {
            arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<InputDoc>, _>>()?
        }
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

fn read_queries(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(text.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect())
}
