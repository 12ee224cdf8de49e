//! Sanitization of route-matching expressions.
//!
//! An expression combines `<field> <operator> <value>` predicates with `&&`, `||`, `!`
//! and parentheses:
//!
//! ```text
//! (http.path ^= "/api" && lower(http.host) == "example.com") || net.src.ip in 10.0.0.0/8
//! ```
//!
//! Only predicate values are rewritten; fields, operators, connectives and whitespace are
//! copied byte-for-byte from the input.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::value::ValueSanitizer;

mod address;
mod lexer;

pub(crate) use self::address::sanitize_address;
use self::lexer::{Token, TokenKind, tokenize};

const FIELD_PREFIXES: &[&str] = &["http.", "net.", "tls."];

const OPERATORS: &[&str] = &["==", "!=", ">=", "<=", ">", "<", "^=", "=^", "~"];

/// Fields whose values come from a closed vocabulary.
const PRESERVED_FIELDS: &[&str] = &[
    "http.method",
    "net.protocol",
    "http.protocol",
    "tls.protocol",
];

static DOTTED_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z0-9_*-]+)+$").expect("a valid regex")
});

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("a valid regex"));

/// Sanitizes the literal values of every predicate in `expression`.
///
/// Quoted strings keep their quotes and raw strings their delimiters, only the text in
/// between is hashed. IP addresses and CIDR blocks are replaced by private addresses of the
/// same family. Other bare values, such as numbers, are kept.
///
/// Malformed input is tolerated: an unterminated string is still hashed up to the end of the
/// expression, and a warning is emitted.
pub(crate) fn sanitize_expression(values: &ValueSanitizer, expression: &str) -> String {
    let tokens = tokenize(expression);

    let mut sanitized = String::with_capacity(expression.len());
    let mut copied = 0;
    for value in predicate_values(&tokens) {
        let Some(replacement) = sanitize_value(values, value) else {
            continue;
        };
        sanitized.push_str(expression.get(copied..value.span.start).unwrap_or_default());
        sanitized.push_str(&replacement);
        copied = value.span.end;
    }
    sanitized.push_str(expression.get(copied..).unwrap_or_default());

    sanitized
}

/// Finds the value token of every `field operator value` triple whose field is not
/// preserved.
fn predicate_values<'tok, 'src>(tokens: &'tok [Token<'src>]) -> Vec<&'tok Token<'src>> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while cursor < tokens.len() {
        let Some((field, after_field)) = field_at(tokens, cursor) else {
            cursor += 1;
            continue;
        };
        let Some(after_operator) = operator_at(tokens, after_field) else {
            cursor = after_field;
            continue;
        };

        match tokens.get(after_operator) {
            Some(value) if is_value(value) => {
                if !PRESERVED_FIELDS.contains(&field) {
                    found.push(value);
                }
                cursor = after_operator + 1;
            }
            _ => cursor = after_operator,
        }
    }

    found
}

/// Returns the field name starting at `cursor` and the index of the following token.
///
/// A field wrapped in a transformation function, e.g. `lower(http.path)`, counts as the
/// field itself.
fn field_at<'src>(tokens: &[Token<'src>], cursor: usize) -> Option<(&'src str, usize)> {
    let token = tokens.get(cursor)?;
    if token.kind != TokenKind::Word {
        return None;
    }
    if is_field(token.text) {
        return Some((token.text, cursor + 1));
    }

    // function(field)
    if !FUNCTION_NAME.is_match(token.text) {
        return None;
    }
    match (
        tokens.get(cursor + 1),
        tokens.get(cursor + 2),
        tokens.get(cursor + 3),
    ) {
        (Some(open), Some(field), Some(close))
            if open.kind == TokenKind::OpenParen
                && field.kind == TokenKind::Word
                && is_field(field.text)
                && close.kind == TokenKind::CloseParen =>
        {
            Some((field.text, cursor + 4))
        }
        _ => None,
    }
}

fn is_field(text: &str) -> bool {
    FIELD_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
        || DOTTED_IDENTIFIER.is_match(text)
}

/// Returns the index of the token following the operator at `cursor`.
fn operator_at(tokens: &[Token<'_>], cursor: usize) -> Option<usize> {
    let token = tokens.get(cursor)?;
    match (token.kind, token.text) {
        (TokenKind::Symbol, text) if OPERATORS.contains(&text) => Some(cursor + 1),
        (TokenKind::Word, "in" | "contains") => Some(cursor + 1),
        (TokenKind::Word, "not") => tokens
            .get(cursor + 1)
            .filter(|next| next.kind == TokenKind::Word && next.text == "in")
            .map(|_| cursor + 2),
        _ => None,
    }
}

fn is_value(token: &Token<'_>) -> bool {
    matches!(
        token.kind,
        TokenKind::Quoted { .. } | TokenKind::Raw { .. } | TokenKind::Word
    )
}

/// Returns the replacement text of a value token, `None` to keep it.
fn sanitize_value(values: &ValueSanitizer, token: &Token<'_>) -> Option<String> {
    match token.kind {
        TokenKind::Quoted { quote, terminated } => {
            let inner = token.text.strip_prefix(quote).unwrap_or(token.text);
            let inner = if terminated {
                inner.strip_suffix(quote).unwrap_or(inner)
            } else {
                warn!(offset = token.span.start, "unterminated string in expression");
                inner
            };

            let body = match raw_parts(inner) {
                Some((open, body, close)) => format!("{open}{}{close}", values.sanitize(body)),
                None => values.sanitize(inner),
            };
            let close = if terminated {
                quote.to_string()
            } else {
                String::new()
            };
            Some(format!("{quote}{body}{close}"))
        }
        TokenKind::Raw { terminated } => {
            if let Some((open, body, close)) = raw_parts(token.text) {
                return Some(format!("{open}{}{close}", values.sanitize(body)));
            }
            if !terminated {
                warn!(offset = token.span.start, "unterminated raw string in expression");
            }
            let (open, body) = raw_opening(token.text)?;
            Some(format!("{open}{}", values.sanitize(body)))
        }
        TokenKind::Word => sanitize_address(values, token.text),
        _ => None,
    }
}

/// Splits a complete raw string `r#"…"#` into opening delimiter, body and closing
/// delimiter.
fn raw_parts(text: &str) -> Option<(&str, &str, &str)> {
    let (open, rest) = raw_opening(text)?;
    let hashes = open.len() - 2;
    let close_len = hashes + 1;
    let body_len = rest.len().checked_sub(close_len)?;
    let (body, close) = rest.split_at_checked(body_len)?;
    let expected_close = format!("\"{}", "#".repeat(hashes));
    (close == expected_close).then_some((open, body, close))
}

fn raw_opening(text: &str) -> Option<(&str, &str)> {
    let after_r = text.strip_prefix('r')?;
    let hashes = after_r.len() - after_r.trim_start_matches('#').len();
    after_r.get(hashes..)?.strip_prefix('"')?;
    text.split_at_checked(hashes + 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Salt;

    fn values() -> ValueSanitizer {
        ValueSanitizer::new(Salt::from("expression-salt"))
    }

    #[test]
    fn should_only_replace_the_literal() {
        let values = values();
        let hashed = values.sanitize("/api/users");

        let sanitized = sanitize_expression(&values, r#"http.path == "/api/users""#);

        assert_eq!(sanitized, format!(r#"http.path == "{hashed}""#));
    }

    #[test]
    fn should_preserve_protocol_and_method_values() {
        let values = values();
        let expression = r#"net.protocol == "http" && http.method == "GET""#;

        let sanitized = sanitize_expression(&values, expression);

        assert_eq!(sanitized, expression);
    }

    #[test]
    fn should_preserve_layout() {
        let values = values();
        let host = values.sanitize("example.com");
        let prefix = values.sanitize("/v1");

        let sanitized = sanitize_expression(
            &values,
            "(http.host=='example.com'&&!(http.path  ^=  \"/v1\"))\n  || net.port == 8080",
        );

        assert_eq!(
            sanitized,
            format!("(http.host=='{host}'&&!(http.path  ^=  \"{prefix}\"))\n  || net.port == 8080")
        );
    }

    #[test]
    fn should_sanitize_addresses() {
        let values = values();

        let sanitized = sanitize_expression(
            &values,
            "net.src.ip == 192.168.1.1 || net.dst.ip == 2001:db8::1",
        );

        let parts = sanitized.split(' ').collect::<Vec<_>>();
        assert!(parts.get(2).is_some_and(|ip| ip.starts_with("10.")));
        assert!(parts.get(6).is_some_and(|ip| ip.starts_with("fd00:")));
    }

    #[test]
    fn should_keep_cidr_prefix_length() {
        let values = values();

        let sanitized = sanitize_expression(&values, "net.src.ip in 192.168.1.0/24");

        let block = sanitized
            .strip_prefix("net.src.ip in ")
            .expect("structure kept");
        assert!(block.starts_with("10."));
        assert!(block.ends_with("/24"));
    }

    #[test]
    fn should_support_not_in_and_contains() {
        let values = values();
        let agent = values.sanitize("curl");

        let sanitized = sanitize_expression(
            &values,
            r#"net.src.ip not in 10.1.0.0/16 && http.headers.user_agent contains "curl""#,
        );

        assert!(sanitized.starts_with("net.src.ip not in 10."));
        assert!(sanitized.ends_with(&format!(r#"http.headers.user_agent contains "{agent}""#)));
    }

    #[test]
    fn should_hash_raw_regex_body_and_keep_delimiters() {
        let values = values();
        let body = values.sanitize(r"^/users/\d+$");

        let sanitized = sanitize_expression(&values, r##"http.path ~ r#"^/users/\d+$"#"##);

        assert_eq!(sanitized, format!(r##"http.path ~ r#"{body}"#"##));
    }

    #[test]
    fn should_hash_regex_body_inside_quotes() {
        let values = values();
        let body = values.sanitize("^/admin");

        let sanitized = sanitize_expression(&values, r##"http.path ~ 'r#"^/admin"#'"##);

        assert!(sanitized.contains(&body));
        assert!(!sanitized.contains("admin"));
    }

    #[test]
    fn should_hash_regex_body_inside_double_quotes() {
        let values = values();
        let body = values.sanitize("^/admin/secret");

        let sanitized = sanitize_expression(&values, r##"http.path ~ "r#"^/admin/secret"#""##);

        assert_eq!(sanitized, format!(r##"http.path ~ "r#"{body}"#""##));
        assert!(!sanitized.contains("/admin/secret"));
    }

    #[test]
    fn should_hash_unterminated_regex_inside_quotes() {
        let values = values();

        let sanitized = sanitize_expression(&values, r##"http.path ~ "r#"^/admin/secret"##);

        assert!(!sanitized.contains("admin"), "{sanitized}");
    }

    #[test]
    fn should_treat_transformed_field_as_field() {
        let values = values();
        let host = values.sanitize("example.com");

        let sanitized = sanitize_expression(&values, r#"lower(http.host) == "example.com""#);

        assert_eq!(sanitized, format!(r#"lower(http.host) == "{host}""#));
    }

    #[test]
    fn should_still_hash_unterminated_string() {
        let values = values();

        let sanitized = sanitize_expression(&values, r#"http.host == "secret.example.com"#);

        assert!(!sanitized.contains("secret"));
        assert!(sanitized.starts_with(r#"http.host == ""#));
    }

    #[test]
    fn should_keep_numbers_and_unknown_words() {
        let values = values();
        let expression = "net.port >= 8000 && net.port < 9000";

        let sanitized = sanitize_expression(&values, expression);

        assert_eq!(sanitized, expression);
    }

    #[test]
    fn should_be_consistent_with_plain_values() {
        let values = values();
        let direct = values.sanitize("api.example.com");

        let sanitized = sanitize_expression(&values, r#"tls.sni == "api.example.com""#);

        assert!(sanitized.contains(&direct));
    }

    #[test]
    fn should_pass_through_empty_and_structural_input() {
        let values = values();

        assert_eq!(sanitize_expression(&values, ""), "");
        assert_eq!(sanitize_expression(&values, "( && ) ||"), "( && ) ||");
    }
}
