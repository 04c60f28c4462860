use super::boolean::containing_pages;
use crate::store::{Field, IndexStore, PageId};
use anyhow::Result;
use std::collections::HashMap;

const TITLE_BOOST: f64 = 1.5;

/// Disjunctive candidate set: every page containing any query term, each
/// scored once, in first-seen order.
pub(crate) fn vspace_scores(
    store: &IndexStore,
    terms: &[String],
) -> Result<(HashMap<PageId, f64>, Vec<PageId>)> {
    let mut scores = HashMap::new();
    let mut ids = Vec::new();
    for term in terms {
        for page in containing_pages(store, term)? {
            if !scores.contains_key(&page) {
                scores.insert(page, cosine_score(store, terms, page)?);
                ids.push(page);
            }
        }
    }
    Ok((scores, ids))
}

/// Score a fixed candidate set (phrase ranking) with the same cosine.
pub(crate) fn document_scores(
    store: &IndexStore,
    terms: &[String],
    candidates: &[PageId],
) -> Result<(HashMap<PageId, f64>, Vec<PageId>)> {
    let mut scores = HashMap::new();
    let mut ids = Vec::new();
    for page in candidates {
        if !scores.contains_key(page) {
            scores.insert(*page, cosine_score(store, terms, *page)?);
            ids.push(*page);
        }
    }
    Ok((scores, ids))
}

/// `bodyCos + 1.5 · titleCos`. A field with zero stored magnitude produces
/// a non-finite cosine and drops out of the sum rather than counting as
/// zero.
fn cosine_score(store: &IndexStore, terms: &[String], page: PageId) -> Result<f64> {
    let query_magnitude = (terms.len() as f64).sqrt();
    let mut score = 0.0;
    for field in Field::ALL {
        let mut inner = 0.0;
        for term in terms {
            if let Some(word) = store.word_id(term)? {
                inner += store.term_weight(field, page, word)?;
            }
        }
        let cosine = inner / (query_magnitude * store.magnitude(field, page)?);
        if cosine.is_finite() {
            score += match field {
                Field::Body => cosine,
                Field::Title => TITLE_BOOST * cosine,
            };
        }
    }
    Ok(score)
}
