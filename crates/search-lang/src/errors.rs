/// ParseError reports a rejected JSONPath or filter expression.
/// Byte positions refer to the original expression text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("only absolute JSONPath expressions starting with '$' are supported, got {0:?}")]
    NotAbsolute(String),
    #[error("empty segment in JSONPath {0:?}")]
    EmptySegment(String),
    #[error("unsupported JSONPath segment {0:?}")]
    UnsupportedSegment(String),
    #[error("a field path requires at least one segment")]
    EmptyPath,

    #[error("unexpected character {ch:?} at byte {at}")]
    UnexpectedChar { ch: char, at: usize },
    #[error("unexpected identifier {word:?} at byte {at}")]
    UnexpectedIdentifier { word: String, at: usize },
    #[error("unterminated string literal starting at byte {at}")]
    UnterminatedString { at: usize },
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    #[error("expected a JSONPath at byte {at}")]
    ExpectedPath { at: usize },
    #[error("expected a comparison operator at byte {at}")]
    ExpectedOperator { at: usize },
    #[error("expected a literal value at byte {at}")]
    ExpectedValue { at: usize },
    #[error("missing ')' at byte {at}")]
    MissingParen { at: usize },
    #[error("unexpected trailing tokens at byte {at}")]
    TrailingTokens { at: usize },
}
