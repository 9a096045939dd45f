//! Corpus packing binary.
//!
//! Ingests a directory of plain-text files, builds per-document
//! co-occurrence indices, runs a multi-topic query, and prints the
//! rendered super-chunk package (or the structured result as JSON).
//!
//! The paragraph chunker here stands in for the external chunker the
//! engine expects; the core never re-chunks.
//!
//! Usage:
//! ```bash
//! cargo run --release --bin pack -- ./docs \
//!   --topic "fuel system" --topic "safety procedures" \
//!   --tier standard --json
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

use corpuslens::{
    AccountTier, Chunk, DocumentInfo, Engine, MemoryStore, QuerySpec, TopicSpec,
};

/// Target chunk size in bytes; paragraphs accumulate up to this.
const CHUNK_TARGET: usize = 2000;

#[derive(Debug, Clone)]
struct Config {
    docs_dir: PathBuf,
    topics: Vec<String>,
    tier: AccountTier,
    max_chars: Option<u32>,
    limit: Option<u32>,
    json: bool,
}

impl Config {
    fn from_args() -> Result<Self, String> {
        let mut docs_dir: Option<PathBuf> = None;
        let mut topics: Vec<String> = Vec::new();
        let mut tier = AccountTier::Standard;
        let mut max_chars: Option<u32> = None;
        let mut limit: Option<u32> = None;
        let mut json = false;

        let args: Vec<String> = std::env::args().collect();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--topic" => {
                    i += 1;
                    if let Some(topic) = args.get(i) {
                        topics.push(topic.clone());
                    }
                }
                "--tier" => {
                    i += 1;
                    let name = args.get(i).map(String::as_str).unwrap_or("");
                    tier = AccountTier::parse(name).map_err(|e| e.to_string())?;
                }
                "--max-chars" => {
                    i += 1;
                    max_chars = args.get(i).and_then(|s| s.replace('_', "").parse().ok());
                }
                "--limit" => {
                    i += 1;
                    limit = args.get(i).and_then(|s| s.parse().ok());
                }
                "--json" => {
                    json = true;
                }
                other if !other.starts_with("--") && docs_dir.is_none() => {
                    docs_dir = Some(PathBuf::from(other));
                }
                _ => {}
            }
            i += 1;
        }

        let docs_dir = docs_dir.ok_or("usage: pack <docs-dir> --topic <question> ...")?;
        if topics.is_empty() {
            return Err("at least one --topic is required".to_string());
        }

        Ok(Self {
            docs_dir,
            topics,
            tier,
            max_chars,
            limit,
            json,
        })
    }
}

/// Split a file into paragraph-aligned chunks of roughly CHUNK_TARGET bytes.
fn chunk_file(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + paragraph.len() + 2 > CHUNK_TARGET {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn ingest_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap(),
    );
    pb.set_message("Indexing documents".to_string());
    pb
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::from_args() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    if !config.json {
        println!("corpuslens packer");
        println!("=================");
        println!("Documents: {}", config.docs_dir.display());
        println!("Topics: {}", config.topics.join(" | "));
        println!();
    }

    // Discover text files, stable order so runs are reproducible.
    let mut files: Vec<PathBuf> = std::fs::read_dir(&config.docs_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    files.sort();

    if files.is_empty() {
        eprintln!("no .txt or .md files under {}", config.docs_dir.display());
        std::process::exit(1);
    }

    // Ingest into an in-memory store and build indices.
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone());

    let pb = ingest_progress_bar(files.len() as u64);
    let mut next_chunk_id = 0u64;
    for (doc_idx, path) in files.iter().enumerate() {
        let doc_id = doc_idx as u32 + 1;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("document {doc_id}"));
        let text = std::fs::read_to_string(path)?;

        let chunks: Vec<Chunk> = chunk_file(&text)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk::new(next_chunk_id + i as u64, doc_id, i as u32, content))
            .collect();
        next_chunk_id += chunks.len() as u64;

        store.add_document(DocumentInfo { id: doc_id, name }, chunks);
        engine.index_document(doc_id, &text).await?;
        pb.inc(1);
    }
    pb.finish_with_message("Indexed");

    // Build and run the query.
    let topics: Vec<TopicSpec> = config
        .topics
        .iter()
        .enumerate()
        .map(|(i, question)| TopicSpec::new(i as u32 + 1, question.clone()))
        .collect();

    let mut spec = QuerySpec::documents(store.document_ids(), topics);
    spec.account_tier = config.tier;
    spec.max_chars_per_super_chunk = config.max_chars;
    if let Some(limit) = config.limit {
        spec.limit_super_chunks = true;
        spec.max_super_chunks_per_topic = limit;
    }

    let outcome = engine.execute_query(&spec).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for (i, result) in outcome.topic_results.iter().enumerate() {
            println!(
                "topic {}: {} chunk(s), pattern {:?}",
                i + 1,
                result.chunks.len(),
                result.pattern
            );
        }
        println!(
            "{} distinct chunk(s) packed into {} super chunk(s)\n",
            outcome.total_chunks,
            outcome.super_chunks.len()
        );
        for sc in &outcome.super_chunks {
            println!("{}", sc.content);
            println!();
        }
    }

    Ok(())
}
