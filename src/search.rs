//! Searching a composite reader.
//!
//! Queries compile into weights once per search, weights bind to each leaf
//! as scorers, and the searcher collects the best hits across leaves.

pub mod function;
pub mod query;
pub mod searcher;
pub mod similarity;

pub use self::query::{DocIdSetIterator, MatchAllDocsQuery, Query, Scorer, TermQuery, Weight};
pub use self::searcher::{IndexSearcher, ScoreDoc, TopDocs};
pub use self::similarity::{Bm25Similarity, DefaultSimilarity, Similarity};
