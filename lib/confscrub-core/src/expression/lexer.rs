use std::ops::Range;

/// Shape of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    OpenParen,
    CloseParen,
    And,
    Or,
    /// `!`
    Not,
    /// A run of comparison characters, e.g. `==`, `^=`, `~`.
    Symbol,
    /// A quoted string, `"…"` or `'…'`.
    Quoted { quote: char, terminated: bool },
    /// A raw string literal, `r#"…"#`.
    Raw { terminated: bool },
    /// Anything else: field names, keywords, numbers, addresses.
    Word,
}

/// A token and its byte span in the source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token<'src> {
    pub(crate) kind: TokenKind,
    pub(crate) text: &'src str,
    pub(crate) span: Range<usize>,
}

const SYMBOL_CHARS: &[char] = &['=', '!', '<', '>', '^', '~'];

/// Splits an expression into tokens.
///
/// Parentheses and logical connectives are always separate tokens, even without
/// surrounding whitespace. Quoted and raw strings are kept whole, escapes included; an
/// unterminated string runs to the end of the input.
pub(crate) fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut position = 0;

    while let Some(current) = source.get(position..).and_then(|rest| rest.chars().next()) {
        let rest = source.get(position..).unwrap_or_default();
        if current.is_whitespace() {
            position += current.len_utf8();
            continue;
        }

        let (kind, len) = if current == '(' {
            (TokenKind::OpenParen, 1)
        } else if current == ')' {
            (TokenKind::CloseParen, 1)
        } else if rest.starts_with("&&") {
            (TokenKind::And, 2)
        } else if rest.starts_with("||") {
            (TokenKind::Or, 2)
        } else if current == '"' || current == '\'' {
            quoted(rest, current)
        } else if let Some(raw) = raw_string(rest) {
            raw
        } else if SYMBOL_CHARS.contains(&current) {
            let len = rest
                .find(|it: char| !SYMBOL_CHARS.contains(&it))
                .unwrap_or(rest.len());
            let kind = if rest.get(..len) == Some("!") {
                TokenKind::Not
            } else {
                TokenKind::Symbol
            };
            (kind, len)
        } else {
            (TokenKind::Word, word_len(rest))
        };

        let span = position..position + len;
        tokens.push(Token {
            kind,
            text: source.get(span.clone()).unwrap_or_default(),
            span,
        });
        position += len;
    }

    tokens
}

/// Scans a quoted string. A quote wrapping exactly one raw string, `"r#"…"#"`, ends after
/// the raw string even when its body contains the quote character.
fn quoted(rest: &str, quote: char) -> (TokenKind, usize) {
    let unterminated = (
        TokenKind::Quoted {
            quote,
            terminated: false,
        },
        rest.len(),
    );
    let opening = quote.len_utf8();
    let inner = rest.get(opening..).unwrap_or_default();

    let start = match raw_string(inner) {
        Some((TokenKind::Raw { terminated: true }, len))
            if inner.get(len..).is_some_and(|tail| tail.starts_with(quote)) =>
        {
            opening + len
        }
        Some((TokenKind::Raw { terminated: false }, _)) if inner.starts_with("r#") => {
            return unterminated;
        }
        _ => opening,
    };

    let mut escaped = false;
    let scanned = rest.get(start..).unwrap_or_default();
    for (index, current) in scanned.char_indices() {
        if escaped {
            escaped = false;
        } else if current == '\\' {
            escaped = true;
        } else if current == quote {
            let kind = TokenKind::Quoted {
                quote,
                terminated: true,
            };
            return (kind, start + index + current.len_utf8());
        }
    }

    unterminated
}

fn raw_string(rest: &str) -> Option<(TokenKind, usize)> {
    let after_r = rest.strip_prefix('r')?;
    let hashes = after_r.len() - after_r.trim_start_matches('#').len();
    let body = after_r.get(hashes..)?.strip_prefix('"')?;

    let closing = format!("\"{}", "#".repeat(hashes));
    let opening_len = 1 + hashes + 1;
    let kind = match body.find(&closing) {
        Some(end) => (
            TokenKind::Raw { terminated: true },
            opening_len + end + closing.len(),
        ),
        None => (TokenKind::Raw { terminated: false }, rest.len()),
    };
    Some(kind)
}

fn word_len(rest: &str) -> usize {
    rest.char_indices()
        .find(|(index, current)| {
            current.is_whitespace()
                || matches!(current, '(' | ')' | '"' | '\'')
                || SYMBOL_CHARS.contains(current)
                || rest
                    .get(*index..)
                    .is_some_and(|tail| tail.starts_with("&&") || tail.starts_with("||"))
        })
        .map_or(rest.len(), |(index, _)| index)
}
