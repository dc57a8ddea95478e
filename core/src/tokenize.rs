//! Command-line tokens as the matcher sees them.
//!
//! The host shell splits the line into words; each word becomes a [`Token`]
//! that remembers its raw form (reused verbatim in completions), its
//! unquoted text, the quote it opened with, and whether that quote was
//! closed. Unquoted words of the form `key=value` also carry the parsed
//! [`Assignment`].

use serde::{Deserialize, Serialize};

/// Quote character a token opened with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    /// Bare word.
    #[default]
    None,
    /// `"..."`; backslash escapes `"` and `\`.
    Double,
    /// `'...'`; no escapes.
    Single,
}

impl QuoteKind {
    /// Maps a quote character to its kind.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '"' => Some(Self::Double),
            '\'' => Some(Self::Single),
            _ => None,
        }
    }

    /// The quote character, if any.
    pub fn as_char(self) -> Option<char> {
        match self {
            Self::None => None,
            Self::Double => Some('"'),
            Self::Single => Some('\''),
        }
    }
}

/// `key=value` split of an unquoted word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Unescaped text before the first `=`.
    pub key: String,
    /// Everything after the `=`, parsed as its own token.
    pub value: Token,
}

/// One word of the command line.
///
/// # Examples
///
/// ```
/// use command_suggest_core::{QuoteKind, Token};
///
/// let open = Token::parse("\"With sp");
/// assert_eq!(open.text(), "With sp");
/// assert_eq!(open.quote(), QuoteKind::Double);
/// assert!(!open.is_closed());
///
/// let assign = Token::parse("--cleanup='strip'");
/// let assignment = assign.assignment().unwrap();
/// assert_eq!(assignment.key, "--cleanup");
/// assert_eq!(assignment.value.text(), "strip");
/// assert!(assignment.value.is_closed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    raw: String,
    text: String,
    quote: QuoteKind,
    closed: bool,
    assignment: Option<Box<Assignment>>,
}

impl Token {
    /// Parses a raw shell word.
    pub fn parse(raw: &str) -> Self {
        Self::parse_word(raw, true)
    }

    fn parse_word(raw: &str, split: bool) -> Self {
        let mut chars = raw.chars();
        if let Some(quote) = chars.next().and_then(QuoteKind::from_char) {
            let (text, closed) = unquote(chars.as_str(), quote);
            return Self {
                raw: raw.to_string(),
                text,
                quote,
                closed,
                assignment: None,
            };
        }

        if split {
            if let Some(index) = assignment_index(raw) {
                let key = unescape(&raw[..index]);
                let value = Self::parse_word(&raw[index + 1..], false);
                return Self {
                    raw: raw.to_string(),
                    text: format!("{key}={}", value.text),
                    quote: QuoteKind::None,
                    closed: value.closed,
                    assignment: Some(Box::new(Assignment { key, value })),
                };
            }
        }

        Self {
            raw: raw.to_string(),
            text: unescape(raw),
            quote: QuoteKind::None,
            closed: true,
            assignment: None,
        }
    }

    /// The word exactly as typed.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The word with quotes and escapes removed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The opening quote.
    pub fn quote(&self) -> QuoteKind {
        self.quote
    }

    /// `false` while a quote is still open.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the word started with a quote.
    pub fn is_quoted(&self) -> bool {
        self.quote != QuoteKind::None
    }

    /// The `key=value` split, if the word has one.
    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_deref()
    }

    /// Bare word starting with `-`.
    pub fn is_flag_like(&self) -> bool {
        !self.is_quoted() && self.text.starts_with('-')
    }
}

// Returns the unescaped content after the opening quote and whether the
// quote was closed. Text following the closing quote is kept.
fn unquote(body: &str, quote: QuoteKind) -> (String, bool) {
    let close = quote.as_char();
    let mut text = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if quote == QuoteKind::Double && c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    text.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        if Some(c) == close {
            let rest: String = chars.by_ref().collect();
            text.push_str(&unescape(&rest));
            return (text, true);
        }
        text.push(c);
    }
    (text, false)
}

fn unescape(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => text.push(chars.next().unwrap_or('\\')),
            _ => text.push(c),
        }
    }
    text
}

// First unescaped `=` with a non-empty key, before any quote.
fn assignment_index(raw: &str) -> Option<usize> {
    let mut escaped = false;
    for (index, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' | '\'' => return None,
            '=' if index > 0 => return Some(index),
            '=' => return None,
            _ => {}
        }
    }
    None
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'))
}

/// Renders `text` as a shell word, reusing the quote style the user opened.
///
/// # Examples
///
/// ```
/// use command_suggest_core::{QuoteKind, quote_literal};
///
/// assert_eq!(quote_literal("First", QuoteKind::None), "First");
/// assert_eq!(quote_literal("With space", QuoteKind::None), "\"With space\"");
/// assert_eq!(quote_literal("First", QuoteKind::Single), "'First'");
/// ```
pub fn quote_literal(text: &str, quote: QuoteKind) -> String {
    match quote {
        QuoteKind::Single if !text.contains('\'') => format!("'{text}'"),
        QuoteKind::None if !needs_quoting(text) => text.to_string(),
        _ => {
            let mut out = String::with_capacity(text.len() + 2);
            out.push('"');
            for c in text.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
            out
        }
    }
}

/// Tokens of one command line plus whether it ends in whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
    trailing_space: bool,
}

impl TokenStream {
    /// Wraps already parsed tokens.
    pub fn new(tokens: Vec<Token>, trailing_space: bool) -> Self {
        Self {
            tokens,
            trailing_space,
        }
    }

    /// Tokens in order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Whether the cursor sits after whitespace.
    pub fn has_trailing_space(&self) -> bool {
        self.trailing_space
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the line has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Builds a stream from shell words.
///
/// Empty words are dropped; a final empty word, which shells pass for a
/// cursor after whitespace, sets the trailing-space flag.
pub fn tokenize<I>(words: I, trailing_space: bool) -> TokenStream
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut tokens = Vec::new();
    let mut trailing = trailing_space;
    let mut last_empty = false;
    for word in words {
        let word = word.as_ref();
        last_empty = word.is_empty();
        if !last_empty {
            tokens.push(Token::parse(word));
        }
    }
    if last_empty && !tokens.is_empty() {
        trailing = true;
    }
    TokenStream::new(tokens, trailing)
}

/// Splits a raw line into shell words, keeping quotes and escapes.
///
/// Returns the words and whether the line ends in unquoted whitespace.
///
/// # Examples
///
/// ```
/// use command_suggest_core::split_line;
///
/// let (words, trailing) = split_line(r#"git checkout "With sp"#);
/// assert_eq!(words, vec!["git", "checkout", "\"With sp"]);
/// assert!(!trailing);
///
/// let (_, trailing) = split_line("git commit ");
/// assert!(trailing);
/// ```
pub fn split_line(line: &str) -> (Vec<String>, bool) {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut quote: Option<char> = None;
    let mut trailing = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        trailing = false;
        match (quote, c) {
            (None, c) if c.is_whitespace() => {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
                trailing = true;
            }
            (Some('\''), '\'') => {
                quote = None;
                word.push(c);
            }
            (Some('\''), _) => word.push(c),
            (_, '\\') => {
                word.push(c);
                if let Some(next) = chars.next() {
                    word.push(next);
                }
            }
            (Some('"'), '"') => {
                quote = None;
                word.push(c);
            }
            (None, '"' | '\'') => {
                quote = Some(c);
                word.push(c);
            }
            _ => word.push(c),
        }
    }
    if !word.is_empty() {
        words.push(word);
    }
    (words, trailing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_word_unescapes() {
        let token = Token::parse(r"With\ space");
        assert_eq!(token.text(), "With space");
        assert!(token.is_closed());
        assert!(!token.is_quoted());
    }

    #[test]
    fn test_double_quote_escapes() {
        let token = Token::parse(r#""say \"hi\" C:\dir""#);
        assert_eq!(token.text(), r#"say "hi" C:\dir"#);
        assert!(token.is_closed());

        let open = Token::parse(r#""test"#);
        assert_eq!(open.text(), "test");
        assert!(!open.is_closed());
    }

    #[test]
    fn test_single_quote_has_no_escapes() {
        let token = Token::parse(r"'a\b'");
        assert_eq!(token.text(), r"a\b");
        assert_eq!(token.quote(), QuoteKind::Single);
        assert!(token.is_closed());
    }

    #[test]
    fn test_assignment_split() {
        let token = Token::parse(r#"-m="test"#);
        let assignment = token.assignment().unwrap();
        assert_eq!(assignment.key, "-m");
        assert_eq!(assignment.value.quote(), QuoteKind::Double);
        assert!(!token.is_closed());

        let closed = Token::parse(r#"-m="test""#);
        assert!(closed.is_closed());
        assert_eq!(closed.text(), "-m=test");
    }

    #[test]
    fn test_no_assignment_inside_quotes_or_escaped() {
        assert!(Token::parse(r#""a=b""#).assignment().is_none());
        assert!(Token::parse(r"a\=b").assignment().is_none());
        assert!(Token::parse("=b").assignment().is_none());
    }

    #[test]
    fn test_quote_literal_falls_back_to_double() {
        assert_eq!(quote_literal("it's", QuoteKind::Single), r#""it's""#);
        assert_eq!(quote_literal(r#"a"b"#, QuoteKind::None), r#""a\"b""#);
        assert_eq!(quote_literal("strip", QuoteKind::Double), r#""strip""#);
    }

    #[test]
    fn test_tokenize_trailing_empty_word() {
        let stream = tokenize(["git", "commit", ""], false);
        assert_eq!(stream.len(), 2);
        assert!(stream.has_trailing_space());

        let stream = tokenize(["git", "commit"], false);
        assert!(!stream.has_trailing_space());
    }

    #[test]
    fn test_split_line_keeps_raw_words() {
        let (words, trailing) = split_line(r#"git commit -m "a b" --cleanup='x y' "#);
        assert_eq!(
            words,
            vec!["git", "commit", "-m", "\"a b\"", "--cleanup='x y'"]
        );
        assert!(trailing);

        let (words, trailing) = split_line(r"ls With\ space");
        assert_eq!(words, vec!["ls", r"With\ space"]);
        assert!(!trailing);
    }
}
