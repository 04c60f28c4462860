#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use webdex_core::models::{count_terms, max_tf, Document};
use webdex_core::tokenizer::tokenize;
use webdex_core::{Indexer, IndexStore};

pub fn open_store(dir: &Path) -> Arc<IndexStore> {
    Arc::new(IndexStore::open(dir).expect("open store"))
}

/// Ingest everything and run the full derivation sequence.
pub fn build_index(store: &Arc<IndexStore>, docs: &[Document]) {
    let indexer = Indexer::new(store.clone());
    indexer.drop_all().unwrap();
    for doc in docs {
        indexer.ingest(doc).unwrap();
    }
    indexer.flush_postings().unwrap();
    indexer.rebuild_adjacency().unwrap();
    indexer.recompute_weights().unwrap();
    indexer.recompute_authority().unwrap();
}

/// Pages titled "0".."9": page i carries i copies of the digit token i in
/// its body and links to every other page.
pub fn digit_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let title = i.to_string();
            let links = (0..count)
                .filter(|j| *j != i)
                .map(|j| format!("http://{j}.com/"))
                .collect();
            let body_tokens: Vec<(String, usize)> =
                (0..i).map(|pos| (i.to_string(), pos)).collect();
            let body_terms = count_terms(&body_tokens);
            let title_terms = count_terms(&tokenize(&title));
            Document {
                uri: format!("http://{i}.com/"),
                max_body_tf: max_tf(&body_terms),
                max_title_tf: max_tf(&title_terms),
                title,
                links,
                body_terms,
                title_terms,
                byte_len: 0,
                modified: -1,
            }
        })
        .collect()
}

/// Build a document the way the indexer binary does: body and title run
/// through the normalizer.
pub fn page_from_text(uri: &str, title: &str, body: &str, links: &[&str]) -> Document {
    let body_terms = count_terms(&tokenize(body));
    let title_terms = count_terms(&tokenize(title));
    Document {
        uri: uri.to_string(),
        title: title.to_string(),
        links: links.iter().map(|l| l.to_string()).collect(),
        max_body_tf: max_tf(&body_terms),
        max_title_tf: max_tf(&title_terms),
        body_terms,
        title_terms,
        byte_len: body.len() as u64,
        modified: -1,
    }
}
