use crate::store::{Field, IndexStore, PageId};
use anyhow::Result;
use std::cmp::Ordering;

/// Linear two-pointer intersection of two ascending lists.
pub(crate) fn intersect<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    out
}

fn merge_union(a: &[PageId], b: &[PageId]) -> Vec<PageId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Pages containing the term in body or title: the deduplicated, ascending
/// union of both posting lists.
pub(crate) fn containing_pages(store: &IndexStore, term: &str) -> Result<Vec<PageId>> {
    let Some(word) = store.word_id(term)? else {
        return Ok(Vec::new());
    };
    let body = store.posting_pages(Field::Body, word)?;
    let title = store.posting_pages(Field::Title, word)?;
    Ok(merge_union(&body, &title))
}

/// Conjunction over all terms, folding intersections cheapest list first.
/// An empty query or any term with an empty posting list yields nothing.
pub(crate) fn boolean_filter<S: AsRef<str>>(store: &IndexStore, terms: &[S]) -> Result<Vec<PageId>> {
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let mut lists: Vec<Vec<PageId>> = Vec::with_capacity(terms.len());
    for term in terms {
        lists.push(containing_pages(store, term.as_ref())?);
    }
    lists.sort_by_key(Vec::len);
    let mut result = lists[0].clone();
    for list in &lists[1..] {
        if result.is_empty() {
            break;
        }
        result = intersect(&result, list);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_is_a_sorted_merge() {
        assert_eq!(intersect(&[1u64, 3, 5, 7], &[2, 3, 4, 7, 9]), vec![3, 7]);
        assert!(intersect(&[1u64, 2], &[]).is_empty());
    }

    #[test]
    fn union_deduplicates() {
        assert_eq!(merge_union(&[1, 2, 5], &[2, 3, 5, 8]), vec![1, 2, 3, 5, 8]);
        assert_eq!(merge_union(&[], &[4]), vec![4]);
    }
}
