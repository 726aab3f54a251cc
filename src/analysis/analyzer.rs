//! Analyzers.

use std::fmt::Debug;

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// Turns text into tokens.
pub trait Analyzer: Send + Sync + Debug {
    /// Analyze `text` into a token stream.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Name of this analyzer.
    fn name(&self) -> &'static str;
}

/// Splits text on whitespace, optionally lowercasing each token.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceAnalyzer {
    lowercase: bool,
}

impl WhitespaceAnalyzer {
    pub fn new() -> Self {
        WhitespaceAnalyzer::default()
    }

    /// A whitespace analyzer that lowercases tokens.
    pub fn lowercase() -> Self {
        WhitespaceAnalyzer { lowercase: true }
    }
}

impl Analyzer for WhitespaceAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        let mut tokens = Vec::new();
        let mut start = None;
        for (index, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
            match (c.is_whitespace(), start) {
                (true, Some(begin)) => {
                    let word = &text[begin..index];
                    let word = if self.lowercase {
                        word.to_lowercase()
                    } else {
                        word.to_string()
                    };
                    tokens.push(Token::new(word, begin, index));
                    start = None;
                }
                (false, None) => start = Some(index),
                _ => {}
            }
        }
        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

/// Emits the whole input as a single token. Empty input yields no token.
#[derive(Clone, Debug, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        if text.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        Ok(Box::new(std::iter::once(Token::new(text, 0, text.len()))))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_offsets() {
        let tokens: Vec<Token> = WhitespaceAnalyzer::new()
            .analyze("  the Quick\tfox ")
            .unwrap()
            .collect();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["the", "Quick", "fox"]);
        assert_eq!((tokens[1].start_offset, tokens[1].end_offset), (6, 11));
        assert_eq!((tokens[2].start_offset, tokens[2].end_offset), (12, 15));
    }

    #[test]
    fn test_lowercase() {
        let tokens: Vec<Token> = WhitespaceAnalyzer::lowercase()
            .analyze("Hello WORLD")
            .unwrap()
            .collect();
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].text, "world");
    }

    #[test]
    fn test_keyword() {
        let tokens: Vec<Token> = KeywordAnalyzer::new().analyze("a b").unwrap().collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "a b");
        assert_eq!(KeywordAnalyzer::new().analyze("").unwrap().count(), 0);
    }
}
