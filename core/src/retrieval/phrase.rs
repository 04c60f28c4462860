use super::boolean::{boolean_filter, intersect};
use super::vspace::document_scores;
use crate::store::{Field, IndexStore, PageId};
use crate::tokenizer::normalize_terms;
use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

/// Double-quoted substrings of the raw query, in order of appearance.
pub(crate) fn extract_phrases(query: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in query.char_indices() {
        if ch != '"' {
            continue;
        }
        match start.take() {
            None => start = Some(i),
            Some(opened) => phrases.push(query[opened + 1..i].to_string()),
        }
    }
    phrases
}

/// True when `first` immediately precedes `second` somewhere in the field:
/// the second word's positions, shifted down by one, meet the first word's.
fn has_bigram(
    store: &IndexStore,
    page: PageId,
    first: &str,
    second: &str,
    field: Field,
) -> Result<bool> {
    let Some(first_id) = store.word_id(first)? else {
        return Ok(false);
    };
    let Some(second_id) = store.word_id(second)? else {
        return Ok(false);
    };
    let first_positions = store.positions(field, first_id, page)?;
    let shifted: Vec<u32> = store
        .positions(field, second_id, page)?
        .iter()
        .filter_map(|p| p.checked_sub(1))
        .collect();
    Ok(!intersect(&first_positions, &shifted).is_empty())
}

/// Pages containing the bigram in body or title; either field suffices.
fn pages_with_bigram(store: &IndexStore, first: &str, second: &str) -> Result<Vec<PageId>> {
    let candidates = boolean_filter(store, &[first, second])?;
    let mut matched = Vec::new();
    for page in candidates {
        if has_bigram(store, page, first, second, Field::Body)?
            || has_bigram(store, page, first, second, Field::Title)?
        {
            matched.push(page);
        }
    }
    Ok(matched)
}

/// Pages containing the phrase, approximated as every adjacent bigram
/// occurring somewhere in the page. Single-word phrases fall back to the
/// boolean filter.
pub(crate) fn filter_phrase(store: &IndexStore, terms: &[String]) -> Result<Vec<PageId>> {
    if terms.len() <= 1 {
        return boolean_filter(store, terms);
    }
    let mut sets = Vec::new();
    for pair in terms.windows(2) {
        sets.push(pages_with_bigram(store, &pair[0], &pair[1])?);
    }
    debug!(bigrams = sets.len(), "phrase bigram filter");
    sets.sort_by_key(Vec::len);
    let mut result = sets[0].clone();
    for set in &sets[1..] {
        if result.is_empty() {
            break;
        }
        result = intersect(&result, set);
    }
    Ok(result)
}

/// Pages satisfying every quoted phrase, ranked by vector-space scoring of
/// the full query text.
pub(crate) fn phrase_scores(
    store: &IndexStore,
    phrases: &[String],
    query: &str,
) -> Result<(HashMap<PageId, f64>, Vec<PageId>)> {
    let mut candidates: Option<Vec<PageId>> = None;
    for phrase in phrases {
        let matched = filter_phrase(store, &normalize_terms(phrase))?;
        candidates = Some(match candidates {
            None => matched,
            Some(existing) => intersect(&existing, &matched),
        });
    }
    let candidates = candidates.unwrap_or_default();
    document_scores(store, &normalize_terms(query), &candidates)
}
