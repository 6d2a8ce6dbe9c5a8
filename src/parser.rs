//! The reader: turns a character stream into expression trees. Built as a
//! recursive descent over the input with nom combinators. One [`Parser`]
//! wraps a source string and hands out top-level forms one at a time
//! ([`Parser::next_form`]) or as an iterator ([`Parser::forms`]); the REPL
//! uses the former, the file runner and the bootstrap loader the latter.
//!
//! Surface syntax: `(` begins a list built as a right-nested pair chain
//! terminated by nil, with an optional `. tail` dotted ending; `'expr`
//! expands to `(quote expr)` at read time; `;` starts a comment running to
//! end of line. Numbers are an optional sign, digits, an optional decimal
//! point and exponent; every other token that does not open a string, list
//! or quote is a symbol, which is how `+`, `set!` and `list->vector` read.

use nom::{
    IResult, Parser as NomParser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, multispace1, one_of},
    combinator::{opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded},
};

use crate::ast::{Number, Value, sym};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters that may appear in a symbol. Everything printable is allowed
/// except delimiters, so `+`, `list->vector` and `set!` are ordinary symbols.
fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '\'' | '"' | ';' | '.' | '#')
}

/// A symbol must not read as a number: no leading digit and no sign
/// immediately followed by a digit.
fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) => {
            if first.is_ascii_digit() {
                return false;
            }
            !((first == '-' || first == '+')
                && chars.next().is_some_and(|c| c.is_ascii_digit()))
        }
    }
}

/// Skip whitespace and `;` line comments. Always succeeds.
fn skip_separators(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(char(';'), take_till(|c| c == '\n'))),
        ))),
    )
    .parse(input)
}

/// Parse a number literal: optional sign, digits, optional fraction and
/// exponent. A literal running straight into symbol characters (`123abc`)
/// is rejected rather than split into two tokens.
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize((
        opt(one_of("+-")),
        digit1,
        // take_while here is digit0's contract; nom 8.0.0's digit0 yields a
        // truncated slice under recognize()
        opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;

    if rest.chars().next().is_some_and(is_symbol_char) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        )));
    }

    let number = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(Number::Float)
    } else {
        text.parse::<i64>().ok().map(Number::Int)
    };

    match number {
        Some(n) => Ok((rest, Value::Number(n))),
        // Overflowing or otherwise malformed literal
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse `#t` / `#f` (case-sensitive).
fn parse_bool(input: &str) -> IResult<&str, Value> {
    let (rest, b) = alt((value(true, tag("#t")), value(false, tag("#f")))).parse(input)?;
    if rest.chars().next().is_some_and(is_symbol_char) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Tag,
        )));
    }
    Ok((rest, Value::Bool(b)))
}

/// Parse a string literal with `\n \t \r \\ \"` escapes. An unterminated
/// string or unknown escape is an error at the point of failure.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), Value::String(text))),
            Some('\\') => {
                match chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    _ => {
                        // Unknown or truncated escape sequence
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = chars.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = chars.as_str();
            }
            None => {
                // EOF before the closing quote
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let (rest, candidate) = take_while1(is_symbol_char).parse(input)?;
    if is_valid_symbol(candidate) {
        Ok((rest, Value::Symbol(candidate.to_owned())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Is the input positioned at a standalone `.` (the dotted-tail marker)?
fn at_dot_token(input: &str) -> bool {
    let mut chars = input.chars();
    chars.next() == Some('.')
        && match chars.next() {
            None => true,
            Some(c) => c.is_whitespace() || matches!(c, '(' | ')' | ';' | '\'' | '"'),
        }
}

/// Parse a parenthesized list: sub-expressions until the matching `)`, built
/// as a right-nested pair chain ending in nil, or in an explicit `. tail`.
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (first, _) = char('(').parse(input)?;
    let mut elements = Vec::new();
    let mut rest = first;

    loop {
        let (r, ()) = skip_separators(rest)?;

        if let Ok((after, _)) = char::<_, nom::error::Error<&str>>(')').parse(r) {
            return Ok((after, Value::list(elements)));
        }

        if !elements.is_empty() && at_dot_token(r) {
            let (r, tail) = parse_form(&r[1..], depth + 1)?;
            let (r, ()) = skip_separators(r)?;
            let (r, _) = char(')').parse(r)?;
            return Ok((r, Value::list_with_tail(elements, tail)));
        }

        if r.is_empty() {
            // End of input while the list is still open
            return Err(nom::Err::Failure(nom::error::Error::new(
                r,
                ErrorKind::Char,
            )));
        }

        let (r, element) = parse_form(r, depth + 1)?;
        elements.push(element);
        rest = r;
    }
}

/// Parse the `'expr` shorthand, expanding to `(quote expr)` at read time.
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Value> {
    let (rest, _) = char('\'').parse(input)?;
    let (rest, expr) = parse_form(rest, depth + 1)?;
    Ok((rest, Value::list(vec![sym("quote"), expr])))
}

/// Parse one expression, whichever kind comes next.
fn parse_form(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        skip_separators,
        alt((
            |i| parse_quote(i, depth),
            |i| parse_list(i, depth),
            parse_bool,
            parse_number,
            parse_string,
            parse_symbol,
        )),
    )
    .parse(input)
}

/// Convert a nom error into the crate error type, classifying it and
/// attaching a context snippet around the failure offset.
fn error_from_nom(source: &str, err: nom::Err<nom::error::Error<&str>>) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = source.len().saturating_sub(e.input.len());
            if e.code == ErrorKind::TooLarge {
                return Error::Parse(ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    source,
                    offset,
                ));
            }
            if offset >= source.len() {
                Error::Parse(ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "unexpected end of input",
                    source,
                    offset,
                ))
            } else {
                let found: String = source[offset..].chars().take(10).collect();
                Error::Parse(ParseError::with_context(
                    ParseErrorKind::InvalidSyntax,
                    format!("unexpected token near '{found}'"),
                    source,
                    offset,
                ))
            }
        }
        nom::Err::Incomplete(_) => Error::Parse(ParseError::new(
            ParseErrorKind::Incomplete,
            "incomplete input",
        )),
    }
}

/// A reader over one text source, yielding top-level forms in order.
pub struct Parser<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            source,
            rest: source,
        }
    }

    /// Parse the next top-level form. `Ok(None)` signals end of input; a
    /// malformed form is an error and the reader does not recover from it.
    pub fn next_form(&mut self) -> Result<Option<Value>, Error> {
        let (pending, ()) =
            skip_separators(self.rest).map_err(|e| error_from_nom(self.source, e))?;
        if pending.is_empty() {
            self.rest = pending;
            return Ok(None);
        }
        match parse_form(pending, 0) {
            Ok((rest, form)) => {
                self.rest = rest;
                Ok(Some(form))
            }
            Err(err) => Err(error_from_nom(self.source, err)),
        }
    }

    /// Iterator over all remaining top-level forms. Stops after the first
    /// error; callers treat that error as fatal for the source.
    pub fn forms(self) -> Forms<'a> {
        Forms {
            parser: self,
            failed: false,
        }
    }
}

/// Iterator adapter produced by [`Parser::forms`].
pub struct Forms<'a> {
    parser: Parser<'a>,
    failed: bool,
}

impl Iterator for Forms<'_> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.parser.next_form() {
            Ok(Some(form)) => Some(Ok(form)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Parse input that must contain exactly one expression.
pub fn parse_one(input: &str) -> Result<Value, Error> {
    let mut parser = Parser::new(input);
    let Some(form) = parser.next_form()? else {
        return Err(Error::Parse(ParseError::new(
            ParseErrorKind::Incomplete,
            "unexpected end of input: expected an expression",
        )));
    };
    match parser.next_form()? {
        None => Ok(form),
        Some(extra) => Err(Error::Parse(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            format!("unexpected trailing content: '{extra}'"),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{nil, val};

    /// Expected outcomes for the data-driven parser tests
    #[derive(Debug)]
    enum ParseTest {
        Success(Value),
        ErrorKindIs(ParseErrorKind),
        Error,
    }
    use ParseTest::*;

    fn success<T: Into<Value>>(value: T) -> ParseTest {
        Success(value.into())
    }

    fn run_parse_tests(cases: Vec<(&str, ParseTest)>) {
        for (i, (input, expected)) in cases.iter().enumerate() {
            let test_id = format!("parse test #{}", i + 1);
            let result = parse_one(input);
            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(&actual, expected_val, "{test_id}: value mismatch");
                    // Round trip: display then reparse must be stable
                    let displayed = format!("{actual}");
                    let reparsed = parse_one(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch"
                    );
                }
                (Err(_), Error) => {}
                (Err(crate::Error::Parse(pe)), ErrorKindIs(kind)) => {
                    assert_eq!(&pe.kind, kind, "{test_id}: wrong error kind: {pe:?}");
                }
                (Err(other), ErrorKindIs(kind)) => {
                    panic!("{test_id}: expected ParseError of kind {kind:?}, got {other:?}");
                }
                (Ok(actual), Error | ErrorKindIs(_)) => {
                    panic!("{test_id}: expected error, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success, got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let cases = vec![
            // ===== NUMBERS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("+7", success(7)),
            ("0", success(0)),
            ("9223372036854775807", success(i64::MAX)),
            ("3.14", success(3.14)),
            ("-0.5", success(-0.5)),
            ("1e3", success(1000.0)),
            ("2.5e-1", success(0.25)),
            ("123abc", Error), // literal runs into symbol chars
            ("99999999999999999999", Error), // integer overflow
            // ===== SYMBOLS =====
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            ("-", success(sym("-"))),
            (">=", success(sym(">="))),
            ("set!", success(sym("set!"))),
            ("list->vector", success(sym("list->vector"))),
            ("null?", success(sym("null?"))),
            ("var123", success(sym("var123"))),
            ("-abc", success(sym("-abc"))),
            ("-42name", Error), // sign+digit prefix is not a symbol
            // ===== BOOLEANS =====
            ("#t", success(true)),
            ("#f", success(false)),
            ("#true", Error),
            ("#q", Error),
            // ===== STRINGS =====
            ("\"hello\"", success("hello")),
            ("\"hello world\"", success("hello world")),
            ("\"\"", success("")),
            (r#""line\nbreak""#, success("line\nbreak")),
            (r#""quote\"inside""#, success("quote\"inside")),
            (r#""back\\slash""#, success("back\\slash")),
            (r#""bad\zescape""#, Error),
            (r#""unterminated"#, ErrorKindIs(ParseErrorKind::Incomplete)),
            // ===== LISTS =====
            ("()", success(nil())),
            ("(   )", success(nil())),
            ("(42)", success([42i64])),
            ("(1 2 3)", success([1i64, 2, 3])),
            (
                "(foo 1 \"two\" #t)",
                Success(Value::list(vec![sym("foo"), val(1), val("two"), val(true)])),
            ),
            ("((1 2) (3 4))", Success(Value::list(vec![val([1i64, 2]), val([3i64, 4])]))),
            ("( 1   2\t\n3 )", success([1i64, 2, 3])),
            // ===== DOTTED PAIRS =====
            ("(1 . 2)", Success(Value::cons(val(1), val(2)))),
            (
                "(1 2 . 3)",
                Success(Value::list_with_tail(vec![val(1), val(2)], val(3))),
            ),
            ("(a . (b . ()))", Success(Value::list(vec![sym("a"), sym("b")]))),
            ("(. 1)", Error),   // dot with no preceding element
            ("(1 . 2 3)", Error), // more than one tail expression
            ("(1 .)", Error),   // dot with no tail
            // ===== QUOTE SUGAR =====
            ("'foo", Success(Value::list(vec![sym("quote"), sym("foo")]))),
            (
                "'(1 2)",
                Success(Value::list(vec![sym("quote"), val([1i64, 2])])),
            ),
            ("'()", Success(Value::list(vec![sym("quote"), nil()]))),
            (
                "''x",
                Success(Value::list(vec![
                    sym("quote"),
                    Value::list(vec![sym("quote"), sym("x")]),
                ])),
            ),
            (
                "(quote foo)",
                Success(Value::list(vec![sym("quote"), sym("foo")])),
            ),
            // ===== COMMENTS AND WHITESPACE =====
            ("; a comment\n42", success(42)),
            ("(1 ; inline\n 2)", success([1i64, 2])),
            ("  \t 42  ", success(42)),
            ("; only a comment", ErrorKindIs(ParseErrorKind::Incomplete)),
            // ===== ERRORS =====
            ("", ErrorKindIs(ParseErrorKind::Incomplete)),
            ("   ", ErrorKindIs(ParseErrorKind::Incomplete)),
            ("(1 2 3", ErrorKindIs(ParseErrorKind::Incomplete)),
            ("((1 2)", ErrorKindIs(ParseErrorKind::Incomplete)),
            (")", ErrorKindIs(ParseErrorKind::InvalidSyntax)),
            ("1 2 3)", Error), // trailing content
            ("(+ 1 2) (+ 3 4)", ErrorKindIs(ParseErrorKind::InvalidSyntax)),
        ];

        run_parse_tests(cases);
    }

    #[test]
    fn test_depth_limit() {
        let at_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        let under_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );

        match parse_one(&at_limit) {
            Err(crate::Error::Parse(pe)) => assert_eq!(pe.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected depth error, got {other:?}"),
        }
        assert!(parse_one(&under_limit).is_ok());
    }

    #[test]
    fn test_next_form_streams_top_level_forms() {
        let mut parser = Parser::new("(define x 1)\n; comment\nx '(a)\n");
        assert_eq!(
            parser.next_form().unwrap(),
            Some(Value::list(vec![sym("define"), sym("x"), val(1)]))
        );
        assert_eq!(parser.next_form().unwrap(), Some(sym("x")));
        assert_eq!(
            parser.next_form().unwrap(),
            Some(Value::list(vec![
                sym("quote"),
                Value::list(vec![sym("a")])
            ]))
        );
        assert_eq!(parser.next_form().unwrap(), None);
        // end of input is stable across repeated calls
        assert_eq!(parser.next_form().unwrap(), None);
    }

    #[test]
    fn test_forms_iterator_stops_after_error() {
        let forms: Vec<_> = Parser::new("1 2 ) 3").forms().collect();
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[0], Ok(val(1)));
        assert_eq!(forms[1], Ok(val(2)));
        assert!(forms[2].is_err());
    }

    #[test]
    fn test_error_context_snippet() {
        let source = format!("{}\n)", "; leading comment padding".repeat(3));
        match Parser::new(&source).next_form() {
            Err(crate::Error::Parse(pe)) => {
                assert!(pe.context.is_some(), "expected context snippet: {pe:?}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
