use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// One term's occurrence data within a single field of a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub tf: u32,
    /// Zero-based token positions, ascending.
    pub positions: Vec<u32>,
}

/// A crawled page as handed over by the fetch pipeline. Immutable once
/// created; the builder persists the full record as page metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub uri: String,
    pub title: String,
    /// Outgoing links in page order, duplicates allowed.
    pub links: Vec<String>,
    pub body_terms: HashMap<String, TermEntry>,
    pub title_terms: HashMap<String, TermEntry>,
    pub max_body_tf: u32,
    pub max_title_tf: u32,
    pub byte_len: u64,
    /// Last-modified as epoch seconds; negative means unknown.
    pub modified: i64,
}

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[day] [month repr:short] [year]");

impl Document {
    pub fn size_str(&self) -> String {
        if self.byte_len == 0 {
            return "Not available".into();
        }
        const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
        let mut size = self.byte_len as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} B", self.byte_len)
        } else {
            format!("{size:.1} {}", UNITS[unit])
        }
    }

    pub fn date_str(&self) -> String {
        if self.modified < 0 {
            return "No date available".into();
        }
        OffsetDateTime::from_unix_timestamp(self.modified)
            .ok()
            .and_then(|t| t.format(DATE_FORMAT).ok())
            .unwrap_or_else(|| "No date available".into())
    }
}

/// Fold normalizer output into per-term frequencies and position lists.
pub fn count_terms(tokens: &[(String, usize)]) -> HashMap<String, TermEntry> {
    let mut terms: HashMap<String, TermEntry> = HashMap::new();
    for (word, pos) in tokens {
        let entry = terms.entry(word.clone()).or_default();
        entry.tf += 1;
        entry.positions.push(*pos as u32);
    }
    terms
}

pub fn max_tf(terms: &HashMap<String, TermEntry>) -> u32 {
    terms.values().map(|e| e.tf).max().unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct Keyword {
    pub word: String,
    pub tf: u32,
}

/// Presentation model for one search result.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub title: String,
    pub uri: String,
    pub date: String,
    pub size: String,
    /// Sample of inbound parent URLs, at most five.
    pub parents: Vec<String>,
    /// Sample of outgoing links, at most five.
    pub children: Vec<String>,
    /// Top body keywords by term frequency, at most five.
    pub keywords: Vec<Keyword>,
    /// The ranking score that produced this result list.
    pub score: f64,
}

pub(crate) const VIEW_SAMPLE: usize = 5;

impl PageView {
    pub fn from_document(doc: &Document) -> Self {
        let mut words: Vec<&String> = doc.body_terms.keys().collect();
        words.sort_by(|a, b| {
            let tf_a = doc.body_terms[*a].tf;
            let tf_b = doc.body_terms[*b].tf;
            tf_b.cmp(&tf_a).then_with(|| a.cmp(b))
        });
        let keywords = words
            .into_iter()
            .take(VIEW_SAMPLE)
            .map(|w| Keyword { word: w.clone(), tf: doc.body_terms[w].tf })
            .collect();

        PageView {
            title: doc.title.clone(),
            uri: doc.uri.clone(),
            date: doc.date_str(),
            size: doc.size_str(),
            parents: Vec::new(),
            children: doc.links.iter().take(VIEW_SAMPLE).cloned().collect(),
            keywords,
            score: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_terms(pairs: &[(&str, u32)]) -> Document {
        let body_terms = pairs
            .iter()
            .map(|(w, tf)| {
                (w.to_string(), TermEntry { tf: *tf, positions: (0..*tf).collect() })
            })
            .collect();
        Document {
            uri: "http://a.com/".into(),
            title: "a".into(),
            links: vec![],
            max_body_tf: max_tf(&body_terms),
            body_terms,
            title_terms: HashMap::new(),
            max_title_tf: 0,
            byte_len: 0,
            modified: -1,
        }
    }

    #[test]
    fn count_terms_accumulates_positions() {
        let tokens = vec![
            ("web".to_string(), 0),
            ("index".to_string(), 1),
            ("web".to_string(), 3),
        ];
        let terms = count_terms(&tokens);
        assert_eq!(terms["web"], TermEntry { tf: 2, positions: vec![0, 3] });
        assert_eq!(terms["index"].tf, 1);
        assert_eq!(max_tf(&terms), 2);
    }

    #[test]
    fn keywords_rank_by_tf_then_word() {
        let doc = doc_with_terms(&[("b", 2), ("a", 2), ("c", 9), ("d", 1), ("e", 1), ("f", 1)]);
        let view = PageView::from_document(&doc);
        let words: Vec<&str> = view.keywords.iter().map(|k| k.word.as_str()).collect();
        assert_eq!(words, vec!["c", "a", "b", "d", "e"]);
    }

    #[test]
    fn unknown_date_and_size() {
        let doc = doc_with_terms(&[]);
        assert_eq!(doc.date_str(), "No date available");
        assert_eq!(doc.size_str(), "Not available");
    }
}
