use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;
use webdex_core::models::{count_terms, max_tf, Document};
use webdex_core::store::BuildInfo;
use webdex_core::tokenizer::tokenize;
use webdex_core::{Indexer, IndexStore};

/// One crawled page as the fetch pipeline hands it over.
#[derive(Debug, Deserialize)]
struct CrawlRecord {
    uri: String,
    title: String,
    body: String,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    byte_len: u64,
    #[serde(default = "unknown_modified")]
    modified: i64,
}

fn unknown_modified() -> i64 {
    -1
}

impl CrawlRecord {
    fn into_document(self) -> Document {
        let body_terms = count_terms(&tokenize(&self.body));
        let title_terms = count_terms(&tokenize(&self.title));
        let byte_len = if self.byte_len == 0 {
            self.body.len() as u64
        } else {
            self.byte_len
        };
        Document {
            uri: self.uri,
            title: self.title,
            links: self.links,
            max_body_tf: max_tf(&body_terms),
            max_title_tf: max_tf(&title_terms),
            body_terms,
            title_terms,
            byte_len,
            modified: self.modified,
        }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and manage the web search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index crawled JSON/JSONL records from a file or directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Index store directory
        #[arg(long, default_value = "./index")]
        store: String,
        /// Empty the store before indexing
        #[arg(long, default_value_t = false)]
        drop: bool,
    },
    /// Empty every table of the store
    Drop {
        /// Index store directory
        #[arg(long, default_value = "./index")]
        store: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, store, drop } => build(&input, &store, drop),
        Commands::Drop { store } => {
            let store = IndexStore::open(&store)?;
            store.drop_all()?;
            tracing::info!("store emptied");
            Ok(())
        }
    }
}

fn build(input: &str, store_path: &str, drop: bool) -> Result<()> {
    let store = Arc::new(IndexStore::open(store_path)?);
    let indexer = Indexer::new(store.clone());
    if drop {
        indexer.drop_all()?;
    }

    let files = discover_inputs(Path::new(input))?;
    if files.is_empty() {
        bail!("no .json or .jsonl inputs under {input}");
    }

    let mut ingested = 0u64;
    for file in &files {
        for record in read_records(file)? {
            indexer.ingest(&record.into_document())?;
            ingested += 1;
            if ingested % 1000 == 0 {
                tracing::info!(ingested, "ingestion progress");
            }
        }
    }
    tracing::info!(ingested, files = files.len(), "ingestion complete");

    indexer.flush_postings()?;
    indexer.rebuild_adjacency()?;
    indexer.recompute_weights()?;
    indexer.recompute_authority()?;

    let built_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    store.set_build_info(&BuildInfo { built_at, documents: store.document_count()? })?;
    store.flush()?;
    tracing::info!(store = store_path, "index build complete");
    Ok(())
}

fn discover_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if input.is_file() {
        files.push(input.to_path_buf());
        return Ok(files);
    }
    for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            if matches!(ext, "json" | "jsonl") {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn read_records(file: &Path) -> Result<Vec<CrawlRecord>> {
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let reader = BufReader::new(File::open(file)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        return Ok(records);
    }

    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}
