mod common;

use common::{build_index, digit_documents, open_store, page_from_text};
use tempfile::tempdir;
use webdex_core::Searcher;

#[test]
fn boolean_finds_each_digit_page() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    for i in 0..10 {
        let results = searcher.retrieve_boolean(&i.to_string()).unwrap();
        assert_eq!(results.len(), 1, "digit {i}");
        assert_eq!(results[0].title, i.to_string());
        assert_eq!(results[0].score, 1.0);
    }
}

#[test]
fn quoted_digit_phrase_finds_one_page() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    for i in 0..10 {
        let results = searcher.retrieve_phrase(&format!("\"{i}\"")).unwrap();
        assert_eq!(results.len(), 1, "digit {i}");
        assert_eq!(results[0].title, i.to_string());
    }
}

#[test]
fn vspace_finds_each_digit_page() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    for i in 0..10 {
        let results = searcher.retrieve_vspace(&i.to_string()).unwrap();
        assert_eq!(results.len(), 1, "digit {i}");
        assert_eq!(results[0].title, i.to_string());
        assert!(results[0].score > 0.0);
    }
}

#[test]
fn nested_restricts_haystack_to_needle_matches() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    let results = searcher.retrieve_nested("1 2 3", "2").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "2");
}

#[test]
fn pagerank_scores_are_equal_across_the_complete_graph() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    let query = (0..10).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
    let results = searcher.retrieve_pagerank(&query).unwrap();
    assert_eq!(results.len(), 10);
    for view in &results {
        assert!((view.score - results[0].score).abs() < 1e-9);
    }
}

#[test]
fn pagerank_prefers_linked_pages() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let docs = vec![
        page_from_text("http://a.com/", "a", "alpha", &["http://b.com/"]),
        page_from_text("http://b.com/", "b", "beta", &[]),
    ];
    build_index(&store, &docs);
    let searcher = Searcher::new(store);

    let results = searcher.retrieve_pagerank("alpha beta").unwrap();
    assert_eq!(results.len(), 2);
    // b has an inbound link; a has no authority entry and re-ranks as zero
    assert_eq!(results[0].title, "b");
    assert!((results[0].score - 0.15).abs() < 1e-12);
    assert_eq!(results[1].score, 0.0);
}

#[test]
fn degenerate_queries_return_nothing() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(3));
    let searcher = Searcher::new(store);

    assert!(searcher.retrieve_boolean("").unwrap().is_empty());
    assert!(searcher.retrieve_boolean("the and of").unwrap().is_empty());
    assert!(searcher.retrieve_vspace("").unwrap().is_empty());
    assert!(searcher.retrieve_phrase("\"\"").unwrap().is_empty());
    assert!(searcher.retrieve_boolean("unindexed").unwrap().is_empty());
    // one known and one unknown term conjoin to nothing
    assert!(searcher.retrieve_boolean("1 unindexed").unwrap().is_empty());
}

#[test]
fn phrase_requires_adjacent_words() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let docs = vec![
        page_from_text(
            "http://a.com/",
            "a",
            "big data search engine built from scratch",
            &[],
        ),
        // same vocabulary, shuffled order
        page_from_text("http://b.com/", "b", "engine search data big", &[]),
        page_from_text("http://c.com/", "c", "big data but nothing else", &[]),
    ];
    build_index(&store, &docs);
    let searcher = Searcher::new(store);

    let results = searcher.retrieve_phrase("\"big data\"").unwrap();
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"a") && titles.contains(&"c"));

    // every quoted phrase must hold
    let results = searcher
        .retrieve_phrase("\"big data\" \"search engine\"")
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "a");
}

#[test]
fn phrase_matches_in_title_alone() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let docs = vec![
        page_from_text("http://a.com/", "machine learning weekly", "neural networks", &[]),
        page_from_text("http://b.com/", "b", "machine tools and learning", &[]),
    ];
    build_index(&store, &docs);
    let searcher = Searcher::new(store);

    let results = searcher.retrieve_phrase("\"machine learning\"").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "machine learning weekly");
}

#[test]
fn queries_without_quotes_fall_back_to_vspace() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    let phrase = searcher.retrieve_phrase("5").unwrap();
    let vspace = searcher.retrieve_vspace("5").unwrap();
    assert_eq!(phrase.len(), vspace.len());
    assert_eq!(phrase[0].uri, vspace[0].uri);
    assert_eq!(phrase[0].score, vspace[0].score);
}

#[test]
fn views_carry_bounded_samples() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    build_index(&store, &digit_documents(10));
    let searcher = Searcher::new(store);

    let results = searcher.retrieve_boolean("9").unwrap();
    let view = &results[0];
    // nine links and nine parents, sampled down to five each
    assert_eq!(view.children.len(), 5);
    assert_eq!(view.parents.len(), 5);
    assert_eq!(view.keywords.len(), 1);
    assert_eq!(view.keywords[0].word, "9");
    assert_eq!(view.keywords[0].tf, 9);
    assert_eq!(view.date, "No date available");
}

#[test]
fn title_matches_boost_ranking() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path());
    let docs = vec![
        page_from_text("http://body.com/", "irrelevant", "rust rust rust programming", &[]),
        page_from_text("http://title.com/", "rust programming", "systems language", &[]),
    ];
    build_index(&store, &docs);
    let searcher = Searcher::new(store);

    let results = searcher.retrieve_vspace("rust").unwrap();
    assert_eq!(results.len(), 2);
    // the title match outscores the body-only match through the 1.5 boost
    assert_eq!(results[0].uri, "http://title.com/");
    assert!(results[0].score > results[1].score);
}
