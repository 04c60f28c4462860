mod boolean;
mod phrase;
mod vspace;

use crate::models::{PageView, VIEW_SAMPLE};
use crate::store::{IndexStore, PageId};
use crate::tokenizer::normalize_terms;
use anyhow::Result;
use phrase::{extract_phrases, phrase_scores};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use vspace::vspace_scores;

const MAX_RESULTS: usize = 50;

/// Stateless, read-only query interface over an index store. All query text
/// passes through the same normalizer the builder uses.
pub struct Searcher {
    store: Arc<IndexStore>,
}

impl Searcher {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Searcher { store }
    }

    /// Conjunctive term query. Results carry score 1, in page-id order.
    pub fn retrieve_boolean(&self, query: &str) -> Result<Vec<PageView>> {
        let terms = normalize_terms(query);
        let ids = boolean::boolean_filter(&self.store, &terms)?;
        self.views(&ids, None)
    }

    /// Vector-space ranking over the union of per-term matches.
    pub fn retrieve_vspace(&self, query: &str) -> Result<Vec<PageView>> {
        let (scores, mut ids) = vspace_scores(&self.store, &normalize_terms(query))?;
        sort_by_score(&mut ids, &scores);
        ids.truncate(MAX_RESULTS);
        self.views(&ids, Some(&scores))
    }

    /// Quoted-phrase query; a query without quotes degrades to plain
    /// vector-space retrieval.
    pub fn retrieve_phrase(&self, query: &str) -> Result<Vec<PageView>> {
        let phrases = extract_phrases(query);
        if phrases.is_empty() {
            return self.retrieve_vspace(query);
        }
        let (scores, mut ids) = phrase_scores(&self.store, &phrases, query)?;
        sort_by_score(&mut ids, &scores);
        ids.truncate(MAX_RESULTS);
        self.views(&ids, Some(&scores))
    }

    /// Search for `needle` within the results of `haystack`. The haystack
    /// side is truncated to its top results first; the needle side is not.
    pub fn retrieve_nested(&self, haystack: &str, needle: &str) -> Result<Vec<PageView>> {
        let (scores, mut hay_ids) = self.search_keyword(haystack)?;
        let (_, mut needle_ids) = self.search_keyword(needle)?;

        sort_by_score(&mut hay_ids, &scores);
        hay_ids.truncate(MAX_RESULTS);

        hay_ids.sort_unstable();
        needle_ids.sort_unstable();
        let mut combined = boolean::intersect(&hay_ids, &needle_ids);
        sort_by_score(&mut combined, &scores);
        self.views(&combined, Some(&scores))
    }

    /// Vector-space top results re-ranked by stored authority score; pages
    /// without an authority entry re-rank as zero.
    pub fn retrieve_pagerank(&self, query: &str) -> Result<Vec<PageView>> {
        let (scores, mut ids) = vspace_scores(&self.store, &normalize_terms(query))?;
        sort_by_score(&mut ids, &scores);
        ids.truncate(MAX_RESULTS);

        let mut authority = HashMap::new();
        for id in &ids {
            authority.insert(*id, self.store.authority_score(*id)?.unwrap_or(0.0));
        }
        sort_by_score(&mut ids, &authority);
        self.views(&ids, Some(&authority))
    }

    fn search_keyword(&self, query: &str) -> Result<(HashMap<PageId, f64>, Vec<PageId>)> {
        let phrases = extract_phrases(query);
        if phrases.is_empty() {
            vspace_scores(&self.store, &normalize_terms(query))
        } else {
            phrase_scores(&self.store, &phrases, query)
        }
    }

    /// Build result views. Ids without a decodable metadata record are
    /// skipped.
    fn views(&self, ids: &[PageId], scores: Option<&HashMap<PageId, f64>>) -> Result<Vec<PageView>> {
        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(doc) = self.store.document(*id)? else {
                continue;
            };
            let mut view = PageView::from_document(&doc);
            view.score = match scores {
                Some(scores) => scores.get(id).copied().unwrap_or(0.0),
                None => 1.0,
            };
            view.parents = self.parent_urls(*id)?;
            views.push(view);
        }
        Ok(views)
    }

    fn parent_urls(&self, page: PageId) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        for (parent, _) in self.store.parents(page)? {
            if urls.len() == VIEW_SAMPLE {
                break;
            }
            if let Some(url) = self.store.page_url(parent)? {
                urls.push(url);
            }
        }
        Ok(urls)
    }
}

/// Descending by score, ascending page id on ties, so rankings are
/// reproducible.
fn sort_by_score(ids: &mut [PageId], scores: &HashMap<PageId, f64>) {
    ids.sort_by(|a, b| {
        let score_a = scores.get(a).copied().unwrap_or(0.0);
        let score_b = scores.get(b).copied().unwrap_or(0.0);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
}
