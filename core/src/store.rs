use crate::encoding::{
    bytes_to_f64, bytes_to_i64, bytes_to_positions, bytes_to_u64, composite_key, i64_to_bytes,
    split_composite, u64_to_bytes,
};
use crate::models::Document;
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::warn;

pub type PageId = u64;
pub type WordId = u64;

/// The two indexed fields of a page. Forward, inverted, weight, and
/// magnitude tables exist once per field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Body,
    Title,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Body, Field::Title];

    pub fn name(self) -> &'static str {
        match self {
            Field::Body => "body",
            Field::Title => "title",
        }
    }
}

const WORD_TO_ID: &str = "word2id";
const ID_TO_WORD: &str = "id2word";
const URL_TO_ID: &str = "url2id";
const ID_TO_URL: &str = "id2url";
const FORWARD_BODY: &str = "forward_body";
const FORWARD_TITLE: &str = "forward_title";
const INVERTED_BODY: &str = "inverted_body";
const INVERTED_TITLE: &str = "inverted_title";
const PAGES: &str = "pages";
const ADJACENCY: &str = "adjacency";
const WEIGHTS_BODY: &str = "weights_body";
const WEIGHTS_TITLE: &str = "weights_title";
const MAGNITUDE_BODY: &str = "magnitude_body";
const MAGNITUDE_TITLE: &str = "magnitude_title";
const AUTHORITY: &str = "authority";
const META: &str = "meta";

const WORD_SEQ: &[u8] = b"word_seq";
const PAGE_SEQ: &[u8] = b"page_seq";
const BUILD_INFO: &[u8] = b"build_info";

/// Stamp written after a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub built_at: String,
    pub documents: u64,
}

/// Persistent key-value storage for the whole index: id registries, forward
/// and inverted indexes, page metadata, the link graph, and the derived
/// weight/magnitude/authority tables.
///
/// Sub-buckets (posting lists, adjacency lists, per-page forward entries)
/// are composite keys: an 8-byte big-endian parent id followed by an 8-byte
/// child id, scanned by prefix. Forward trees additionally keep one 8-byte
/// root key per page holding that page's max term frequency; the root
/// records double as the page's "sub-table exists" marker and their count is
/// the corpus size N.
pub struct IndexStore {
    db: Db,
    pub(crate) word2id: Tree,
    pub(crate) id2word: Tree,
    pub(crate) url2id: Tree,
    pub(crate) id2url: Tree,
    pub(crate) forward_body: Tree,
    pub(crate) forward_title: Tree,
    pub(crate) inverted_body: Tree,
    pub(crate) inverted_title: Tree,
    pub(crate) pages: Tree,
    pub(crate) adjacency: Tree,
    pub(crate) weights_body: Tree,
    pub(crate) weights_title: Tree,
    pub(crate) magnitude_body: Tree,
    pub(crate) magnitude_title: Tree,
    pub(crate) authority: Tree,
    meta: Tree,
    word_mint: Mutex<()>,
    page_mint: Mutex<()>,
}

impl IndexStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .with_context(|| format!("opening index store at {}", path.as_ref().display()))?;
        let word2id = db.open_tree(WORD_TO_ID)?;
        let id2word = db.open_tree(ID_TO_WORD)?;
        let url2id = db.open_tree(URL_TO_ID)?;
        let id2url = db.open_tree(ID_TO_URL)?;
        let forward_body = db.open_tree(FORWARD_BODY)?;
        let forward_title = db.open_tree(FORWARD_TITLE)?;
        let inverted_body = db.open_tree(INVERTED_BODY)?;
        let inverted_title = db.open_tree(INVERTED_TITLE)?;
        let pages = db.open_tree(PAGES)?;
        let adjacency = db.open_tree(ADJACENCY)?;
        let weights_body = db.open_tree(WEIGHTS_BODY)?;
        let weights_title = db.open_tree(WEIGHTS_TITLE)?;
        let magnitude_body = db.open_tree(MAGNITUDE_BODY)?;
        let magnitude_title = db.open_tree(MAGNITUDE_TITLE)?;
        let authority = db.open_tree(AUTHORITY)?;
        let meta = db.open_tree(META)?;
        Ok(IndexStore {
            db,
            word2id,
            id2word,
            url2id,
            id2url,
            forward_body,
            forward_title,
            inverted_body,
            inverted_title,
            pages,
            adjacency,
            weights_body,
            weights_title,
            magnitude_body,
            magnitude_title,
            authority,
            meta,
            word_mint: Mutex::new(()),
            page_mint: Mutex::new(()),
        })
    }

    pub(crate) fn forward(&self, field: Field) -> &Tree {
        match field {
            Field::Body => &self.forward_body,
            Field::Title => &self.forward_title,
        }
    }

    pub(crate) fn inverted(&self, field: Field) -> &Tree {
        match field {
            Field::Body => &self.inverted_body,
            Field::Title => &self.inverted_title,
        }
    }

    pub(crate) fn weights(&self, field: Field) -> &Tree {
        match field {
            Field::Body => &self.weights_body,
            Field::Title => &self.weights_title,
        }
    }

    pub(crate) fn magnitudes(&self, field: Field) -> &Tree {
        match field {
            Field::Body => &self.magnitude_body,
            Field::Title => &self.magnitude_title,
        }
    }

    // --- id registry ---

    fn next_id(&self, counter: &[u8]) -> Result<u64> {
        let value = self.meta.update_and_fetch(counter, |old| {
            let next = old.map(bytes_to_u64).unwrap_or(0) + 1;
            Some(u64_to_bytes(next).to_vec())
        })?;
        Ok(value.map(|v| bytes_to_u64(&v)).unwrap_or(0))
    }

    fn put_mapping(&self, forward: &Tree, inverse: &Tree, text: &str, id: u64) -> Result<()> {
        let id_bytes = u64_to_bytes(id);
        let outcome: sled::transaction::TransactionResult<()> =
            (forward, inverse).transaction(|(fw, inv)| {
                fw.insert(text.as_bytes(), &id_bytes[..])?;
                inv.insert(&id_bytes[..], text.as_bytes())?;
                Ok(())
            });
        outcome.map_err(|e| anyhow!("id mapping write failed: {e:?}"))
    }

    /// Get-or-create the id for a word. Lock-free read first; losers of the
    /// mint race re-check under the lock and adopt the winner's id.
    pub fn resolve_word(&self, word: &str) -> Result<WordId> {
        if let Some(existing) = self.word2id.get(word.as_bytes())? {
            return Ok(bytes_to_u64(&existing));
        }
        let _guard = self.word_mint.lock();
        if let Some(existing) = self.word2id.get(word.as_bytes())? {
            return Ok(bytes_to_u64(&existing));
        }
        let id = self.next_id(WORD_SEQ)?;
        self.put_mapping(&self.word2id, &self.id2word, word, id)?;
        Ok(id)
    }

    /// Get-or-create the id for a URL. Creation also seeds the page's
    /// forward root records for both fields, so the combined step is
    /// serialized behind a lock of its own.
    pub fn resolve_page(&self, url: &str) -> Result<PageId> {
        if let Some(existing) = self.url2id.get(url.as_bytes())? {
            return Ok(bytes_to_u64(&existing));
        }
        let _guard = self.page_mint.lock();
        if let Some(existing) = self.url2id.get(url.as_bytes())? {
            return Ok(bytes_to_u64(&existing));
        }
        let id = self.next_id(PAGE_SEQ)?;
        self.put_mapping(&self.url2id, &self.id2url, url, id)?;
        for field in Field::ALL {
            self.forward(field).insert(u64_to_bytes(id), &i64_to_bytes(0)[..])?;
        }
        Ok(id)
    }

    pub fn word_id(&self, word: &str) -> Result<Option<WordId>> {
        Ok(self.word2id.get(word.as_bytes())?.map(|v| bytes_to_u64(&v)))
    }

    pub fn page_id(&self, url: &str) -> Result<Option<PageId>> {
        Ok(self.url2id.get(url.as_bytes())?.map(|v| bytes_to_u64(&v)))
    }

    pub fn page_url(&self, id: PageId) -> Result<Option<String>> {
        Ok(self
            .id2url
            .get(u64_to_bytes(id))?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    pub fn contains_url(&self, url: &str) -> Result<bool> {
        Ok(self.url2id.get(url.as_bytes())?.is_some())
    }

    // --- forward index ---

    pub(crate) fn put_forward(
        &self,
        field: Field,
        page: PageId,
        word: WordId,
        tf: u32,
    ) -> Result<()> {
        self.forward(field)
            .insert(composite_key(page, word), &i64_to_bytes(tf as i64)[..])?;
        Ok(())
    }

    pub(crate) fn set_max_tf(&self, field: Field, page: PageId, tf: u32) -> Result<()> {
        self.forward(field)
            .insert(u64_to_bytes(page), &i64_to_bytes(tf as i64)[..])?;
        Ok(())
    }

    /// Number of pages with a forward/body root record.
    pub fn document_count(&self) -> Result<u64> {
        let mut n = 0;
        for item in self.forward_body.iter() {
            let (key, _) = item?;
            if key.len() == 8 {
                n += 1;
            }
        }
        Ok(n)
    }

    // --- page metadata ---

    pub(crate) fn put_document(&self, page: PageId, doc: &Document) -> Result<()> {
        let encoded = bincode::serialize(doc).context("encoding page record")?;
        self.pages.insert(u64_to_bytes(page), encoded)?;
        Ok(())
    }

    /// Fetch and decode a page record. Undecodable records are reported and
    /// treated as absent so a scan over many pages survives one bad blob.
    pub fn document(&self, page: PageId) -> Result<Option<Document>> {
        let Some(blob) = self.pages.get(u64_to_bytes(page))? else {
            return Ok(None);
        };
        match bincode::deserialize(&blob) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                warn!(page, error = %e, "undecodable page record, skipping");
                Ok(None)
            }
        }
    }

    // --- inverted index ---

    /// Page ids in a word's posting list, ascending.
    pub fn posting_pages(&self, field: Field, word: WordId) -> Result<Vec<PageId>> {
        let mut pages = Vec::new();
        for item in self.inverted(field).scan_prefix(u64_to_bytes(word)) {
            let (key, _) = item?;
            if let Some((_, page)) = split_composite(&key) {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    pub fn positions(&self, field: Field, word: WordId, page: PageId) -> Result<Vec<u32>> {
        Ok(self
            .inverted(field)
            .get(composite_key(word, page))?
            .map(|v| bytes_to_positions(&v))
            .unwrap_or_default())
    }

    // --- derived tables ---

    pub fn term_weight(&self, field: Field, page: PageId, word: WordId) -> Result<f64> {
        Ok(self
            .weights(field)
            .get(composite_key(page, word))?
            .map(|v| bytes_to_f64(&v))
            .unwrap_or(0.0))
    }

    pub fn magnitude(&self, field: Field, page: PageId) -> Result<f64> {
        Ok(self
            .magnitudes(field)
            .get(u64_to_bytes(page))?
            .map(|v| bytes_to_f64(&v))
            .unwrap_or(0.0))
    }

    /// Authority score, or `None` for pages without an inbound link.
    pub fn authority_score(&self, page: PageId) -> Result<Option<f64>> {
        Ok(self.authority.get(u64_to_bytes(page))?.map(|v| bytes_to_f64(&v)))
    }

    /// Inbound parents of a page with each parent's out-degree.
    pub fn parents(&self, page: PageId) -> Result<Vec<(PageId, i64)>> {
        let mut parents = Vec::new();
        for item in self.adjacency.scan_prefix(u64_to_bytes(page)) {
            let (key, value) = item?;
            if let Some((_, parent)) = split_composite(&key) {
                parents.push((parent, bytes_to_i64(&value)));
            }
        }
        Ok(parents)
    }

    // --- lifecycle ---

    pub fn set_build_info(&self, info: &BuildInfo) -> Result<()> {
        let encoded = bincode::serialize(info).context("encoding build info")?;
        self.meta.insert(BUILD_INFO, encoded)?;
        Ok(())
    }

    pub fn build_info(&self) -> Result<Option<BuildInfo>> {
        let Some(blob) = self.meta.get(BUILD_INFO)? else {
            return Ok(None);
        };
        match bincode::deserialize(&blob) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                warn!(error = %e, "undecodable build info record");
                Ok(None)
            }
        }
    }

    /// Empty every table, counters included. Used for a full reindex.
    pub fn drop_all(&self) -> Result<()> {
        for tree in self.all_trees() {
            tree.clear()?;
        }
        self.db.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn all_trees(&self) -> [&Tree; 16] {
        [
            &self.word2id,
            &self.id2word,
            &self.url2id,
            &self.id2url,
            &self.forward_body,
            &self.forward_title,
            &self.inverted_body,
            &self.inverted_title,
            &self.pages,
            &self.adjacency,
            &self.weights_body,
            &self.weights_title,
            &self.magnitude_body,
            &self.magnitude_title,
            &self.authority,
            &self.meta,
        ]
    }
}
