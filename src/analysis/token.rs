//! Token types for text analysis.

/// A single unit of analyzed text.
///
/// Positions are not stored on the token. The writer derives them by adding
/// `position_increment` to the position of the previous token, so an
/// increment of 0 stacks a token on the previous one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// The term text.
    pub text: String,

    /// Positions advanced from the previous token (default: 1).
    pub position_increment: u32,

    /// Byte offset where the token starts in the original text.
    pub start_offset: usize,

    /// Byte offset just past the end of the token in the original text.
    pub end_offset: usize,

    /// Optional payload recorded with this occurrence.
    pub payload: Option<Vec<u8>>,
}

impl Token {
    /// Create a token with the given text and offsets.
    pub fn new<S: Into<String>>(text: S, start_offset: usize, end_offset: usize) -> Self {
        Token {
            text: text.into(),
            position_increment: 1,
            start_offset,
            end_offset,
            payload: None,
        }
    }

    pub fn with_position_increment(mut self, increment: u32) -> Self {
        self.position_increment = increment;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A stream of tokens produced by an analyzer.
pub type TokenStream = Box<dyn Iterator<Item = Token>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_builders() {
        let token = Token::new("fox", 4, 7)
            .with_position_increment(0)
            .with_payload(b"p".to_vec());
        assert_eq!(token.text, "fox");
        assert_eq!(token.len(), 3);
        assert_eq!(token.position_increment, 0);
        assert_eq!(token.payload.as_deref(), Some(&b"p"[..]));
    }
}
