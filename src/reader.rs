//! Text reader.
//!
//! Turns one top-level form of source text into a [`Value`] tree. The grammar:
//!
//! ```text
//! form     := list | vector | hashmap | atom
//! list     := '(' form* ')'
//! vector   := '[' form* ']'
//! hashmap  := '{' (form form)* '}'
//! atom     := integer | 'nil' | 'true' | 'false' | symbol
//! ```
//!
//! Commas count as whitespace and `;` starts a comment running to the end of
//! the line. Blank input reads as `None`.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::{map, recognize, value},
    error::ErrorKind,
    multi::{many0, many0_count},
    sequence::{pair, preceded},
};

use crate::ast::{NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters allowed in symbols besides alphanumerics
pub const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$&:.";

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Treat `;` as the start of a line comment
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

/// What went wrong, carried through nom so it survives backtracking
#[derive(Debug, Clone, Copy, PartialEq)]
enum ReadFailure {
    Nom,
    Unclosed(char),
    ExpectedClose(char),
    TooDeep,
    IntegerOutOfRange,
    InvalidToken,
    OddHashmap,
}

#[derive(Debug, Clone, PartialEq)]
struct ReaderError<'a> {
    input: &'a str,
    failure: ReadFailure,
}

impl<'a> ReaderError<'a> {
    fn new(input: &'a str, failure: ReadFailure) -> Self {
        ReaderError { input, failure }
    }

    fn fail<T>(input: &'a str, failure: ReadFailure) -> PResult<'a, T> {
        Err(nom::Err::Failure(ReaderError::new(input, failure)))
    }
}

impl<'a> nom::error::ParseError<&'a str> for ReaderError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        ReaderError::new(input, ReadFailure::Nom)
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, ReaderError<'a>>;

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_integer_token(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Skip whitespace, commas and (optionally) comments
fn skip<'a>(input: &'a str, config: &ParseConfig) -> PResult<'a, ()> {
    fn whitespace(input: &str) -> PResult<'_, &str> {
        take_while1(|c: char| c.is_whitespace() || c == ',').parse(input)
    }
    fn comment(input: &str) -> PResult<'_, &str> {
        recognize(pair(char(';'), take_while(|c: char| c != '\n'))).parse(input)
    }

    if config.handle_comments {
        value((), many0_count(alt((whitespace, comment)))).parse(input)
    } else {
        value((), many0_count(whitespace)).parse(input)
    }
}

/// Parse an integer, `nil`, a boolean or a symbol
fn parse_atom(input: &str) -> PResult<'_, Value> {
    let (rest, token) = take_while1(is_symbol_char).parse(input)?;

    let atom = match token {
        "nil" => Value::Nil,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ if is_integer_token(token) => match token.parse::<NumberType>() {
            Ok(n) => Value::Integer(n),
            Err(_) => return ReaderError::fail(input, ReadFailure::IntegerOutOfRange),
        },
        // Symbols may not start with a digit
        _ if token.starts_with(|c: char| c.is_ascii_digit()) => {
            return ReaderError::fail(input, ReadFailure::InvalidToken);
        }
        _ => Value::Symbol(token.to_owned()),
    };
    Ok((rest, atom))
}

/// Parse the elements between `open` and `close`. `depth` counts the
/// collections already open around this one.
fn parse_elements<'a>(
    input: &'a str,
    (open, close): (char, char),
    depth: usize,
    config: &ParseConfig,
) -> PResult<'a, Vec<Value>> {
    let start = input;
    let (input, _) = char(open).parse(input)?;
    if depth >= MAX_PARSE_DEPTH {
        return ReaderError::fail(start, ReadFailure::TooDeep);
    }
    let (input, elements) = many0(preceded(
        |i| skip(i, config),
        |i| parse_form(i, depth + 1, config),
    ))
    .parse(input)?;
    let (input, _) = skip(input, config)?;

    match char::<_, ReaderError<'a>>(close).parse(input) {
        Ok((input, _)) => Ok((input, elements)),
        Err(_) if input.is_empty() => ReaderError::fail(input, ReadFailure::Unclosed(close)),
        Err(_) => ReaderError::fail(input, ReadFailure::ExpectedClose(close)),
    }
}

fn parse_hashmap<'a>(input: &'a str, depth: usize, config: &ParseConfig) -> PResult<'a, Value> {
    let (rest, elements) = parse_elements(input, ('{', '}'), depth, config)?;
    match Value::hashmap(elements) {
        Ok(hashmap) => Ok((rest, hashmap)),
        Err(_) => ReaderError::fail(input, ReadFailure::OddHashmap),
    }
}

/// Parse one form, tracking nesting depth
fn parse_form<'a>(input: &'a str, depth: usize, config: &ParseConfig) -> PResult<'a, Value> {
    alt((
        map(|i| parse_elements(i, ('(', ')'), depth, config), Value::list),
        map(|i| parse_elements(i, ('[', ']'), depth, config), Value::vector),
        |i| parse_hashmap(i, depth, config),
        parse_atom,
    ))
    .parse(input)
}

fn char_offset(input: &str, remaining: &str) -> usize {
    let consumed = input.len().saturating_sub(remaining.len());
    input[..consumed].chars().count()
}

/// Convert reader failures to user-facing parse errors
fn to_parse_error(input: &str, error: nom::Err<ReaderError<'_>>) -> ParseError {
    let e = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input");
        }
    };

    let (kind, message) = match e.failure {
        ReadFailure::Nom if e.input.is_empty() => (
            ParseErrorKind::Incomplete,
            "Unexpected end of input".to_owned(),
        ),
        ReadFailure::Nom => (
            ParseErrorKind::InvalidSyntax,
            "Unexpected character".to_owned(),
        ),
        ReadFailure::Unclosed(close) => (
            ParseErrorKind::Incomplete,
            format!("Missing closing '{close}'"),
        ),
        ReadFailure::ExpectedClose(close) => (
            ParseErrorKind::InvalidSyntax,
            format!("Expected '{close}'"),
        ),
        ReadFailure::TooDeep => (
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        ),
        ReadFailure::IntegerOutOfRange => (
            ParseErrorKind::ImplementationLimit,
            "Integer literal out of range".to_owned(),
        ),
        ReadFailure::InvalidToken => (
            ParseErrorKind::InvalidSyntax,
            "Invalid token".to_owned(),
        ),
        ReadFailure::OddHashmap => (
            ParseErrorKind::InvalidSyntax,
            "Hashmap requires an even number of elements".to_owned(),
        ),
    };

    ParseError::with_context(kind, message, input, char_offset(input, e.input))
}

fn parse_top_level<'a>(input: &'a str, config: &ParseConfig) -> PResult<'a, Option<Value>> {
    let (input, _) = skip(input, config)?;
    if input.is_empty() {
        return Ok((input, None));
    }
    let (input, form) = parse_form(input, 0, config)?;
    let (input, _) = skip(input, config)?;
    Ok((input, Some(form)))
}

/// Read a single form with the default configuration.
///
/// Returns `Ok(None)` when the input holds nothing but whitespace and comments.
pub fn parse(input: &str) -> Result<Option<Value>, Error> {
    parse_with_config(input, &ParseConfig::default())
}

/// Read a single form. More than one top-level form is an error.
pub fn parse_with_config(input: &str, config: &ParseConfig) -> Result<Option<Value>, Error> {
    match parse_top_level(input, config) {
        Ok(("", form)) => Ok(form),
        Ok((remaining, _)) => Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "Unexpected content after expression",
            input,
            char_offset(input, remaining),
        )
        .into()),
        Err(e) => Err(to_parse_error(input, e).into()),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{hashmap, sym, val, vector};

    /// Test result variants for data-driven parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),              // Parsing should succeed with this value
        Empty,                       // Input holds no form
        SpecificError(ParseErrorKind), // Parsing should fail with this kind
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    /// Run parse tests, checking that every successful read prints back to
    /// text that reads as the same value
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} '{input}'", i + 1);
            match (parse(input), expected) {
                (Ok(Some(actual)), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");
                    let displayed = actual.to_string();
                    let reparsed = parse(&displayed)
                        .unwrap_or_else(|e| panic!("{test_id}: reparse of '{displayed}' failed: {e}"));
                    assert_eq!(reparsed, Some(actual), "{test_id}: round trip mismatch");
                }
                (Ok(None), Empty) => {}
                (Err(Error::ParseError(e)), SpecificError(kind)) => {
                    assert_eq!(e.kind, *kind, "{test_id}: wrong kind ({e:?})");
                }
                (actual, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {actual:?}")
                }
            }
        }
    }

    #[test]
    fn test_atoms() {
        run_parse_tests(vec![
            ("42", success(42)),
            ("-17", success(-17)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            ("nil", Success(Value::Nil)),
            ("true", success(true)),
            ("false", success(false)),
            ("abc", Success(sym("abc"))),
            ("def!", Success(sym("def!"))),
            ("let*", Success(sym("let*"))),
            ("λ", Success(sym("λ"))),
            (":key", Success(sym(":key"))),
            ("-", Success(sym("-"))),
            ("-x", Success(sym("-x"))),
            ("<=", Success(sym("<="))),
            ("a.b/c", Success(sym("a.b/c"))),
            ("nil?", Success(sym("nil?"))),
            ("  42  ", success(42)),
            ("9223372036854775808", SpecificError(ParseErrorKind::ImplementationLimit)),
            ("12abc", SpecificError(ParseErrorKind::InvalidSyntax)),
            ("@", SpecificError(ParseErrorKind::InvalidSyntax)),
            ("\"str\"", SpecificError(ParseErrorKind::InvalidSyntax)),
        ]);
    }

    #[test]
    fn test_collections() {
        run_parse_tests(vec![
            ("()", success(Vec::<Value>::new())),
            ("(+ 1 2)", success([sym("+"), val(1), val(2)])),
            ("(a (b (c)))", success([sym("a"), val([sym("b"), val([sym("c")])])])),
            ("(1(2))", success([val(1), val([2])])),
            ("[]", Success(vector(Vec::<Value>::new()))),
            ("[1 [2] (3)]", Success(vector(vec![val(1), vector(vec![2]), val([3])]))),
            ("{:a 1 :b [2]}", Success(hashmap(vec![(sym(":a"), val(1)), (sym(":b"), vector(vec![2]))]))),
            ("{}", Success(hashmap(Vec::<(Value, Value)>::new()))),
            ("(1, 2,3)", success([1, 2, 3])),
            ("( \n\t1 )", success([1])),
            ("(fn* (a & rest) rest)", success([
                sym("fn*"),
                val([sym("a"), sym("&"), sym("rest")]),
                sym("rest"),
            ])),
        ]);
    }

    #[test]
    fn test_blank_input_and_comments() {
        run_parse_tests(vec![
            ("", Empty),
            ("   \n\t", Empty),
            (",,,", Empty),
            ("; just a comment", Empty),
            ("; one\n; two\n", Empty),
            ("(+ 1 ; inline\n 2)", success([sym("+"), val(1), val(2)])),
            ("42 ; trailing comment", success(42)),
        ]);
    }

    #[test]
    fn test_errors() {
        run_parse_tests(vec![
            ("(+ 1", SpecificError(ParseErrorKind::Incomplete)),
            ("[1 2", SpecificError(ParseErrorKind::Incomplete)),
            ("((1)", SpecificError(ParseErrorKind::Incomplete)),
            ("(1 ]", SpecificError(ParseErrorKind::InvalidSyntax)),
            (")", SpecificError(ParseErrorKind::InvalidSyntax)),
            ("(1 @)", SpecificError(ParseErrorKind::InvalidSyntax)),
            ("{:a}", SpecificError(ParseErrorKind::InvalidSyntax)),
            ("1 2", SpecificError(ParseErrorKind::TrailingContent)),
            ("(a) (b)", SpecificError(ParseErrorKind::TrailingContent)),
            ("(a))", SpecificError(ParseErrorKind::TrailingContent)),
        ]);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |levels: usize, open: &str, close: &str, inner: &str| {
            format!("{}{inner}{}", open.repeat(levels), close.repeat(levels))
        };

        // Exactly at the limit, empty or holding an atom
        assert!(parse(&nested(MAX_PARSE_DEPTH, "(", ")", "")).unwrap().is_some());
        assert!(parse(&nested(MAX_PARSE_DEPTH, "[", "]", "1")).unwrap().is_some());

        let Error::ParseError(e) = parse(&nested(MAX_PARSE_DEPTH + 1, "(", ")", "")).unwrap_err()
        else {
            panic!("expected parse error");
        };
        assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested);
        // Reported at the bracket that went over the limit
        assert_eq!(e.found.as_deref(), Some("("));

        let mixed = format!("{}{{:k 1}}{}", "[".repeat(MAX_PARSE_DEPTH), "]".repeat(MAX_PARSE_DEPTH));
        match parse(&mixed).unwrap_err() {
            Error::ParseError(e) => assert_eq!(e.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_reserved_symbol_names_do_not_round_trip() {
        // Host-built symbols print verbatim and read back as other values
        assert_eq!(parse(&sym("nil").to_string()).unwrap(), Some(Value::Nil));
        assert_eq!(parse(&sym("true").to_string()).unwrap(), Some(val(true)));
        assert_eq!(parse(&sym("7").to_string()).unwrap(), Some(val(7)));
        match parse(&sym("1up").to_string()).unwrap_err() {
            Error::ParseError(e) => assert_eq!(e.kind, ParseErrorKind::InvalidSyntax),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_comment_handling_can_be_disabled() {
        let config = ParseConfig {
            handle_comments: false,
        };
        assert_eq!(parse_with_config("(1 2)", &config).unwrap(), Some(val([1, 2])));
        match parse_with_config("1 ; note", &config).unwrap_err() {
            Error::ParseError(e) => assert_eq!(e.kind, ParseErrorKind::TrailingContent),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_context_points_at_problem() {
        let Error::ParseError(e) = parse("(+ 1 @)").unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(e.found.as_deref(), Some("@"));
        assert_eq!(e.context.as_deref(), Some("(+ 1 @)"));

        let Error::ParseError(e) = parse("(+ 1").unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(e.found, None);
        assert!(e.message.contains(')'));
    }
}
