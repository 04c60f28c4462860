use crate::encoding::{
    bytes_to_i64, bytes_to_u64, composite_key, f64_to_bytes, i64_to_bytes, positions_to_bytes,
    split_composite, u64_to_bytes,
};
use crate::models::{Document, TermEntry};
use crate::store::{Field, IndexStore, PageId, WordId};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use sled::Batch;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use url::Url;

const DAMPING: f64 = 0.85;
const AUTHORITY_ITERATIONS: usize = 15;

/// Postings staged in memory for the lifetime of one crawl batch, flushed
/// in bulk by [`Indexer::flush_postings`]. One mutex guards all mutation.
#[derive(Default)]
struct Staging {
    body: HashMap<WordId, HashMap<PageId, Vec<u32>>>,
    title: HashMap<WordId, HashMap<PageId, Vec<u32>>>,
}

impl Staging {
    fn field(&mut self, field: Field) -> &mut HashMap<WordId, HashMap<PageId, Vec<u32>>> {
        match field {
            Field::Body => &mut self.body,
            Field::Title => &mut self.title,
        }
    }
}

/// Writes crawled pages into the store and derives the ranking tables.
/// One instance per ingestion batch; the store does not support concurrent
/// batches.
pub struct Indexer {
    store: Arc<IndexStore>,
    staging: Mutex<Staging>,
    workers: usize,
}

impl Indexer {
    pub fn new(store: Arc<IndexStore>) -> Self {
        let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Indexer {
            store,
            staging: Mutex::new(Staging::default()),
            workers,
        }
    }

    pub fn contains_url(&self, url: &str) -> Result<bool> {
        self.store.contains_url(url)
    }

    /// Index one page: resolve its id, fan the term work across a scoped
    /// task group (staging postings, persisting forward entries), and write
    /// the metadata record once every term task has joined.
    ///
    /// Re-ingesting a URI overwrites the metadata record but contributes
    /// postings additively; a clean reindex goes through [`Indexer::drop_all`].
    pub fn ingest(&self, doc: &Document) -> Result<()> {
        let page = self.store.resolve_page(&doc.uri)?;

        let body_entries: Vec<(&String, &TermEntry)> = doc.body_terms.iter().collect();
        let title_entries: Vec<(&String, &TermEntry)> = doc.title_terms.iter().collect();
        thread::scope(|scope| -> Result<()> {
            let mut tasks = Vec::new();
            for (field, entries) in [(Field::Body, &body_entries), (Field::Title, &title_entries)] {
                for chunk in chunked(entries, self.workers) {
                    tasks.push(scope.spawn(move || -> Result<()> {
                        for (word, entry) in chunk {
                            let word_id = self.store.resolve_word(word)?;
                            self.stage(field, word_id, page, &entry.positions);
                            self.store.put_forward(field, page, word_id, entry.tf)?;
                        }
                        Ok(())
                    }));
                }
            }
            for task in tasks {
                task.join().map_err(|_| anyhow!("term task panicked"))??;
            }
            Ok(())
        })?;

        self.store.set_max_tf(Field::Body, page, doc.max_body_tf)?;
        self.store.set_max_tf(Field::Title, page, doc.max_title_tf)?;
        self.store.put_document(page, doc)?;
        debug!(uri = %doc.uri, page, "ingested page");
        Ok(())
    }

    fn stage(&self, field: Field, word: WordId, page: PageId, positions: &[u32]) {
        let mut staged = self.staging.lock();
        staged
            .field(field)
            .entry(word)
            .or_default()
            .insert(page, positions.to_vec());
    }

    /// Write every staged posting list to the inverted tables, one atomic
    /// batch per word, words flushed concurrently. Must run after an
    /// ingestion batch and before weight computation.
    pub fn flush_postings(&self) -> Result<()> {
        let staged = std::mem::take(&mut *self.staging.lock());
        self.flush_field(Field::Body, &staged.body)?;
        self.flush_field(Field::Title, &staged.title)?;
        Ok(())
    }

    fn flush_field(
        &self,
        field: Field,
        staged: &HashMap<WordId, HashMap<PageId, Vec<u32>>>,
    ) -> Result<()> {
        let mut word_ids: Vec<WordId> = staged.keys().copied().collect();
        // ascending word ids for sequential write locality
        word_ids.sort_unstable();
        info!(field = field.name(), words = word_ids.len(), "flushing postings");

        thread::scope(|scope| -> Result<()> {
            let mut tasks = Vec::new();
            for chunk in chunked(&word_ids, self.workers) {
                tasks.push(scope.spawn(move || -> Result<()> {
                    for word in chunk {
                        let mut batch = Batch::default();
                        for (page, positions) in &staged[word] {
                            batch.insert(
                                &composite_key(*word, *page)[..],
                                positions_to_bytes(positions),
                            );
                        }
                        self.store.inverted(field).apply_batch(batch)?;
                    }
                    Ok(())
                }));
            }
            for task in tasks {
                task.join().map_err(|_| anyhow!("flush task panicked"))??;
            }
            Ok(())
        })
    }

    /// Derive the adjacency table from every page's stored links. Only
    /// links resolving to a known page contribute; a parent linking to the
    /// same child twice keeps the later entry.
    pub fn rebuild_adjacency(&self) -> Result<()> {
        self.store.adjacency.clear()?;
        let mut batch = Batch::default();
        let mut edges = 0u64;
        for item in self.store.pages.iter() {
            let (key, blob) = item?;
            let page = bytes_to_u64(&key);
            let doc: Document = match bincode::deserialize(&blob) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(page, error = %e, "undecodable page record, skipping");
                    continue;
                }
            };
            // raw link count, duplicates included
            let out_degree = doc.links.len() as i64;
            for link in &doc.links {
                let Some(normalized) = normalize_link(link) else {
                    continue;
                };
                let Some(child) = self.store.page_id(&normalized)? else {
                    continue;
                };
                batch.insert(&composite_key(child, page)[..], &i64_to_bytes(out_degree)[..]);
                edges += 1;
            }
        }
        self.store.adjacency.apply_batch(batch)?;
        info!(edges, "adjacency list rebuilt");
        Ok(())
    }

    /// Recompute tf-idf weights and per-page magnitudes for both fields.
    /// Deterministic over a fixed index: rebuilding without new ingestion
    /// yields bit-identical tables.
    pub fn recompute_weights(&self) -> Result<()> {
        for field in Field::ALL {
            self.recompute_field_weights(field)?;
        }
        Ok(())
    }

    fn recompute_field_weights(&self, field: Field) -> Result<()> {
        let weights = self.store.weights(field);
        let magnitudes = self.store.magnitudes(field);
        weights.clear()?;
        magnitudes.clear()?;

        let corpus = self.store.document_count()? as f64;
        if corpus == 0.0 {
            return Ok(());
        }

        let mut df_cache: HashMap<WordId, f64> = HashMap::new();
        let mut weight_batch = Batch::default();
        let mut magnitude_batch = Batch::default();
        // (page, max tf) of the page whose entries are being scanned; the
        // 8-byte root key sorts before the page's 16-byte term keys
        let mut current: Option<(PageId, f64)> = None;
        let mut sum_sq = 0.0;

        for item in self.store.forward(field).iter() {
            let (key, value) = item?;
            if key.len() == 8 {
                if let Some((page, _)) = current.take() {
                    magnitude_batch
                        .insert(&u64_to_bytes(page)[..], &f64_to_bytes(sum_sq.sqrt())[..]);
                }
                current = Some((bytes_to_u64(&key), bytes_to_i64(&value) as f64));
                sum_sq = 0.0;
                continue;
            }
            let Some((_, word)) = split_composite(&key) else {
                continue;
            };
            let Some((_, max_tf)) = current else {
                continue;
            };
            if max_tf <= 0.0 {
                continue;
            }
            let df = match df_cache.get(&word) {
                Some(df) => *df,
                None => {
                    let df = self
                        .store
                        .inverted(field)
                        .scan_prefix(u64_to_bytes(word))
                        .filter_map(|r| r.ok())
                        .count() as f64;
                    df_cache.insert(word, df);
                    df
                }
            };
            if df == 0.0 {
                debug!(word, field = field.name(), "word has no posting list, skipping");
                continue;
            }
            let tf = bytes_to_i64(&value) as f64;
            let weight = tf * (corpus / df).log2() / max_tf;
            sum_sq += weight * weight;
            weight_batch.insert(&key[..], &f64_to_bytes(weight)[..]);
        }
        if let Some((page, _)) = current {
            magnitude_batch.insert(&u64_to_bytes(page)[..], &f64_to_bytes(sum_sq.sqrt())[..]);
        }

        weights.apply_batch(weight_batch)?;
        magnitudes.apply_batch(magnitude_batch)?;
        info!(field = field.name(), pages = corpus, "term weights recomputed");
        Ok(())
    }

    /// Iterate authority scores over the inbound-link graph. Every page
    /// with at least one inbound link starts at 1.0; each of the 15 rounds
    /// reads only the previous round's committed scores.
    pub fn recompute_authority(&self) -> Result<()> {
        let mut graph: BTreeMap<PageId, Vec<(PageId, i64)>> = BTreeMap::new();
        for item in self.store.adjacency.iter() {
            let (key, value) = item?;
            let Some((child, parent)) = split_composite(&key) else {
                continue;
            };
            graph
                .entry(child)
                .or_default()
                .push((parent, bytes_to_i64(&value)));
        }

        let mut scores: BTreeMap<PageId, f64> = graph.keys().map(|page| (*page, 1.0)).collect();
        for _ in 0..AUTHORITY_ITERATIONS {
            let previous = scores.clone();
            for (child, parents) in &graph {
                let inbound: f64 = parents
                    .iter()
                    .filter_map(|(parent, out_degree)| {
                        if *out_degree <= 0 {
                            return None;
                        }
                        previous.get(parent).map(|score| score / *out_degree as f64)
                    })
                    .sum();
                scores.insert(*child, (1.0 - DAMPING) + DAMPING * inbound);
            }
        }

        self.store.authority.clear()?;
        let mut batch = Batch::default();
        for (page, score) in &scores {
            batch.insert(&u64_to_bytes(*page)[..], &f64_to_bytes(*score)[..]);
        }
        self.store.authority.apply_batch(batch)?;
        info!(pages = scores.len(), "authority scores recomputed");
        Ok(())
    }

    /// Empty the store and the staging buffer for a full reindex.
    pub fn drop_all(&self) -> Result<()> {
        *self.staging.lock() = Staging::default();
        self.store.drop_all()
    }
}

fn chunked<T>(items: &[T], parts: usize) -> impl Iterator<Item = &[T]> {
    let size = items.len().div_ceil(parts.max(1)).max(1);
    items.chunks(size)
}

fn normalize_link(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}{}", parsed.scheme(), host, parsed.path()))
}
