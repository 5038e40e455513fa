//! Expiration Filters
//!
//! The sweeper talks to the store through a tiny filter language with a single
//! operator:
//!
//! ```text
//! {"expires_at": {$lte: "2024-01-01T00:00:00.000000Z"}}
//! {expires_at: {$lte: 1704067200}}
//! ```
//!
//! The field name may be bare or quoted. The bound is either a quoted RFC3339
//! timestamp or an integer number of epoch seconds. A record matches when its
//! field holds a moment at or before the bound.

use crate::record::Record;
use crate::ttl::clock::Moment;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Errors produced while compiling a filter expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The expression ended early
    #[error("unexpected end of filter expression")]
    UnexpectedEnd,

    /// A character that does not fit the grammar
    #[error("unexpected character {found:?} at offset {offset}, expected {expected}")]
    Unexpected {
        found: char,
        offset: usize,
        expected: &'static str,
    },

    /// Only `$lte` is understood
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// The bound is not a valid RFC3339 timestamp
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The bound is not a valid integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Text after the closing brace
    #[error("trailing characters after filter expression")]
    TrailingInput,
}

/// The bound of a `$lte` comparison, kept in the encoding it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// A timestamp literal
    Moment(Moment),
    /// An epoch-seconds literal
    EpochSeconds(i64),
}

impl Bound {
    /// Returns the bound as a moment, if representable.
    pub fn as_moment(&self) -> Option<Moment> {
        match *self {
            Bound::Moment(m) => Some(m),
            Bound::EpochSeconds(secs) => DateTime::from_timestamp(secs, 0),
        }
    }
}

/// A compiled `field <= bound` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    field: String,
    bound: Bound,
}

impl Query {
    /// Creates a query directly, without going through an expression.
    pub fn lte(field: impl Into<String>, bound: Bound) -> Self {
        Self {
            field: field.into(),
            bound,
        }
    }

    /// Builds the expression text for `field <= literal`.
    ///
    /// The field name is always written quoted, so any name survives
    /// [`parse`](Self::parse).
    pub fn lte_expression(field: &str, literal: &str) -> String {
        let mut quoted = String::with_capacity(field.len() + 2);
        quoted.push('"');
        for c in field.chars() {
            if matches!(c, '"' | '\\') {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        format!("{{{}: {{$lte: {}}}}}", quoted, literal)
    }

    /// Compiles a filter expression.
    ///
    /// ```
    /// use ttlkeeper::store::Query;
    ///
    /// let query = Query::parse("{expires_at: {$lte: 1700000000}}").unwrap();
    /// assert_eq!(query.field(), "expires_at");
    /// ```
    pub fn parse(expr: &str) -> Result<Self, QueryError> {
        let mut parser = ExprParser::new(expr);

        parser.expect('{')?;
        let field = parser.key()?;
        parser.expect(':')?;
        parser.expect('{')?;
        let op = parser.key()?;
        if op != "$lte" {
            return Err(QueryError::UnsupportedOperator(op));
        }
        parser.expect(':')?;
        let bound = parser.bound()?;
        parser.expect('}')?;
        parser.expect('}')?;
        parser.finish()?;

        Ok(Self { field, bound })
    }

    /// The field being compared.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The upper bound (inclusive).
    pub fn bound(&self) -> Bound {
        self.bound
    }

    /// Returns true if the record's field holds a moment at or before the bound.
    ///
    /// Records where the field is absent or not a moment never match.
    pub fn matches(&self, record: &Record) -> bool {
        match (record.moment(&self.field), self.bound.as_moment()) {
            (Ok(Some(value)), Some(bound)) => value <= bound,
            _ => false,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literal = match self.bound {
            Bound::Moment(m) => format!("\"{}\"", m.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Bound::EpochSeconds(secs) => secs.to_string(),
        };
        f.write_str(&Self::lte_expression(&self.field, &literal))
    }
}

/// Character-level cursor over a filter expression.
struct ExprParser<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            offset: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn peek(&mut self) -> Result<char, QueryError> {
        self.skip_whitespace();
        self.chars.peek().copied().ok_or(QueryError::UnexpectedEnd)
    }

    fn expect(&mut self, want: char) -> Result<(), QueryError> {
        let found = self.peek()?;
        if found != want {
            return Err(self.unexpected(found, "a delimiter"));
        }
        self.bump();
        Ok(())
    }

    fn unexpected(&self, found: char, expected: &'static str) -> QueryError {
        QueryError::Unexpected {
            found,
            offset: self.offset,
            expected,
        }
    }

    /// A bare identifier (`expires_at`, `$lte`) or a quoted string.
    fn key(&mut self) -> Result<String, QueryError> {
        if self.peek()? == '"' {
            return self.quoted();
        }

        let mut key = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$') {
                key.push(c);
                self.bump();
            } else {
                break;
            }
        }

        if key.is_empty() {
            let found = self.peek()?;
            return Err(self.unexpected(found, "a field name"));
        }
        Ok(key)
    }

    fn quoted(&mut self) -> Result<String, QueryError> {
        self.expect('"')?;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(text),
                Some('\\') => match self.bump() {
                    Some(c) => text.push(c),
                    None => return Err(QueryError::UnexpectedEnd),
                },
                Some(c) => text.push(c),
                None => return Err(QueryError::UnexpectedEnd),
            }
        }
    }

    fn bound(&mut self) -> Result<Bound, QueryError> {
        let first = self.peek()?;
        if first == '"' {
            let text = self.quoted()?;
            let moment = DateTime::parse_from_rfc3339(&text)
                .map_err(|_| QueryError::InvalidTimestamp(text.clone()))?;
            return Ok(Bound::Moment(moment.with_timezone(&Utc)));
        }

        if !(first.is_ascii_digit() || first == '-') {
            return Err(self.unexpected(first, "a timestamp or integer"));
        }

        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || (digits.is_empty() && c == '-') {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        digits
            .parse::<i64>()
            .map(Bound::EpochSeconds)
            .map_err(|_| QueryError::InvalidInteger(digits))
    }

    fn finish(&mut self) -> Result<(), QueryError> {
        self.skip_whitespace();
        match self.chars.peek() {
            None => Ok(()),
            Some(_) => Err(QueryError::TrailingInput),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64, micros: u32) -> Moment {
        DateTime::from_timestamp(secs, micros * 1_000).unwrap()
    }

    #[test]
    fn test_parse_timestamp_bound() {
        let query = Query::parse("{expires_at: {$lte: \"2023-11-14T22:13:20.000500Z\"}}").unwrap();
        assert_eq!(query.field(), "expires_at");
        assert_eq!(query.bound(), Bound::Moment(at(1_700_000_000, 500)));
    }

    #[test]
    fn test_parse_epoch_bound_and_quoted_field() {
        let query = Query::parse("  { \"delete_at\" :{ $lte : 1700000000 } } ").unwrap();
        assert_eq!(query.field(), "delete_at");
        assert_eq!(query.bound(), Bound::EpochSeconds(1_700_000_000));
    }

    #[test]
    fn test_display_round_trips() {
        let query = Query::lte("expires_at", Bound::Moment(at(1_700_000_000, 42)));
        assert_eq!(
            query.to_string(),
            "{\"expires_at\": {$lte: \"2023-11-14T22:13:20.000042Z\"}}"
        );
        assert_eq!(Query::parse(&query.to_string()), Ok(query));
    }

    #[test]
    fn test_expression_escapes_field_names() {
        let expr = Query::lte_expression("say \"hi\" \\ {x: 1}", "5");
        assert_eq!(expr, r#"{"say \"hi\" \\ {x: 1}": {$lte: 5}}"#);

        let query = Query::parse(&expr).unwrap();
        assert_eq!(query.field(), "say \"hi\" \\ {x: 1}");
        assert_eq!(query.bound(), Bound::EpochSeconds(5));

        let odd = Query::lte("expires at", Bound::EpochSeconds(7));
        assert_eq!(Query::parse(&odd.to_string()), Ok(odd));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Query::parse(""), Err(QueryError::UnexpectedEnd));
        assert_eq!(
            Query::parse("{expires_at: {$gt: 5}}"),
            Err(QueryError::UnsupportedOperator("$gt".to_string()))
        );
        assert!(matches!(
            Query::parse("{expires_at: {$lte: \"yesterday\"}}"),
            Err(QueryError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            Query::parse("{expires_at: {$lte: true}}"),
            Err(QueryError::Unexpected { found: 't', .. })
        ));
        assert_eq!(
            Query::parse("{expires_at: {$lte: 5}} extra"),
            Err(QueryError::TrailingInput)
        );
    }

    #[test]
    fn test_matches_is_inclusive() {
        let query = Query::lte("expires_at", Bound::Moment(at(100, 0)));

        let before = Record::new("a").with("expires_at", at(99, 999_999));
        let equal = Record::new("b").with("expires_at", at(100, 0));
        let after = Record::new("c").with("expires_at", at(100, 1));

        assert!(query.matches(&before));
        assert!(query.matches(&equal));
        assert!(!query.matches(&after));
    }

    #[test]
    fn test_matches_mixed_encodings() {
        let query = Query::lte("expires_at", Bound::EpochSeconds(100));

        assert!(query.matches(&Record::new("a").with("expires_at", 100)));
        assert!(query.matches(&Record::new("b").with("expires_at", at(99, 5))));
        assert!(!query.matches(&Record::new("c").with("expires_at", at(100, 5))));
    }

    #[test]
    fn test_matches_ignores_missing_and_mistyped_fields() {
        let query = Query::lte("expires_at", Bound::EpochSeconds(100));

        assert!(!query.matches(&Record::new("a")));
        assert!(!query.matches(&Record::new("b").with("expires_at", "soon")));
    }
}
