//! Function queries over a two-segment index on disk.

use std::sync::Arc;

use tempfile::TempDir;

use xiphos::prelude::*;
use xiphos::search::function::{
    ConstValueSource, DefFunction, DocFreqValueSource, ExistsFunction, FunctionQuery,
    IfFunction, MaxDocValueSource, MultiFloatFunction, MultiOp, NumDocsValueSource,
    NumericFieldSource, QueryValueSource, ValueSource, ValueSourceComparator,
};
use xiphos::search::{MatchAllDocsQuery, Query, TermQuery, TopDocs};
use xiphos::storage::FileStorageConfig;

fn fruit(title: &str, price: Option<i64>, popularity: Option<i64>) -> Document {
    let mut doc = Document::new()
        .with(Field::string("id", title, true))
        .with(Field::text("title", title, false));
    if let Some(price) = price {
        doc.add(Field::long("price", price, true));
    }
    if let Some(popularity) = popularity {
        doc.add(Field::numeric_doc_values("popularity", popularity));
    }
    doc
}

/// Segment `_0` holds docs 0 and 1, `_1` holds docs 2 and 3. Doc 4 is
/// deleted.
fn build_index(dir: &TempDir) -> IndexSearcher {
    let config = StorageConfig::File(FileStorageConfig::new(dir.path()));
    {
        let storage = StorageFactory::create(config.clone()).unwrap();
        let mut writer = SegmentWriter::new(storage.clone(), "_0", SegmentWriterConfig::default());
        writer.add_document(&fruit("red apple", Some(30), Some(5))).unwrap();
        writer.add_document(&fruit("green apple", Some(10), None)).unwrap();
        writer.flush().unwrap();

        let mut writer = SegmentWriter::new(storage, "_1", SegmentWriterConfig::default());
        writer.add_document(&fruit("red cherry red", Some(20), Some(9))).unwrap();
        writer.add_document(&fruit("banana", None, None)).unwrap();
        writer.add_document(&fruit("rotten apple", Some(1), Some(100))).unwrap();
        writer.delete_document(2).unwrap();
        writer.flush().unwrap();
    }

    let storage = StorageFactory::create(config).unwrap();
    IndexSearcher::new(IndexReader::open(storage, &["_0", "_1"]).unwrap())
}

fn ranked(top: &TopDocs) -> Vec<(i32, f32)> {
    top.score_docs.iter().map(|hit| (hit.doc, hit.score)).collect()
}

fn price() -> Arc<dyn ValueSource> {
    Arc::new(NumericFieldSource::long("price"))
}

fn popularity() -> Arc<dyn ValueSource> {
    Arc::new(NumericFieldSource::long("popularity"))
}

#[test]
fn test_def_fills_missing_price() {
    let dir = TempDir::new().unwrap();
    let searcher = build_index(&dir);
    let def = DefFunction::new(vec![price(), Arc::new(ConstValueSource::new(42.0))]).unwrap();
    let top = searcher.search(&FunctionQuery::new(Arc::new(def)), 10).unwrap();
    assert_eq!(top.total_hits, 4);
    assert_eq!(ranked(&top), vec![(3, 42.0), (0, 30.0), (2, 20.0), (1, 10.0)]);
}

#[test]
fn test_if_exists_selects_branch() {
    let dir = TempDir::new().unwrap();
    let searcher = build_index(&dir);
    let choice = IfFunction::new(
        Arc::new(ExistsFunction::new(popularity())),
        popularity(),
        Arc::new(ConstValueSource::new(-1.0)),
    );
    let query = FunctionQuery::new(Arc::new(choice));
    assert_eq!(
        query.description(),
        "if(exists(long(popularity)),long(popularity),const(-1))"
    );
    let top = searcher.search(&query, 10).unwrap();
    assert_eq!(ranked(&top), vec![(2, 9.0), (0, 5.0), (1, -1.0), (3, -1.0)]);
}

#[test]
fn test_boosted_product() {
    let dir = TempDir::new().unwrap();
    let searcher = build_index(&dir);
    let product = MultiFloatFunction::new(
        MultiOp::Product,
        vec![price(), Arc::new(ConstValueSource::new(2.0))],
    );
    let query = FunctionQuery::new(Arc::new(product)).with_boost(0.5);
    let top = searcher.search(&query, 2).unwrap();
    assert_eq!(top.total_hits, 4);
    assert_eq!(ranked(&top), vec![(0, 30.0), (2, 20.0)]);
}

#[test]
fn test_query_value_source_scores_matches_only() {
    let dir = TempDir::new().unwrap();
    let searcher = build_index(&dir);
    let red: Arc<dyn Query> = Arc::new(TermQuery::new("title", "red"));
    let source = QueryValueSource::new(red, 0.0);
    let top = searcher.search(&FunctionQuery::new(Arc::new(source)), 10).unwrap();
    assert_eq!(top.total_hits, 4);
    for hit in &top.score_docs {
        match hit.doc {
            0 | 2 => assert!(hit.score > 0.0, "doc {} scored {}", hit.doc, hit.score),
            _ => assert_eq!(hit.score, 0.0),
        }
    }
}

#[test]
fn test_sort_by_price_missing_first() {
    let dir = TempDir::new().unwrap();
    let searcher = build_index(&dir);
    let comparator = ValueSourceComparator::new(price());
    let top = searcher
        .search_sorted(&MatchAllDocsQuery::new(), 10, &comparator)
        .unwrap();
    let docs: Vec<i32> = top.score_docs.iter().map(|hit| hit.doc).collect();
    assert_eq!(docs, vec![3, 1, 2, 0]);

    let stored = searcher.document(docs[3]).unwrap();
    assert_eq!(stored[0].1.as_str(), Some("red apple"));
}

#[test]
fn test_index_statistics_sources() {
    let dir = TempDir::new().unwrap();
    let searcher = build_index(&dir);
    let sum = MultiFloatFunction::new(
        MultiOp::Sum,
        vec![
            Arc::new(DocFreqValueSource::new("title", "apple")) as Arc<dyn ValueSource>,
            Arc::new(MaxDocValueSource),
            Arc::new(NumDocsValueSource),
        ],
    );
    let top = searcher.search(&FunctionQuery::new(Arc::new(sum)), 10).unwrap();
    // Deleted documents still count towards doc freq and max doc.
    assert!(top.score_docs.iter().all(|hit| hit.score == 3.0 + 5.0 + 4.0));
}
