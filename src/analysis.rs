//! Text analysis.
//!
//! An [`Analyzer`] turns field text into a stream of [`Token`]s, which the
//! segment writer inverts into postings and term vectors. Only simple
//! analyzers are provided; anything richer plugs in through the trait.

pub mod analyzer;
pub mod token;

pub use analyzer::{Analyzer, KeywordAnalyzer, WhitespaceAnalyzer};
pub use token::{Token, TokenStream};
