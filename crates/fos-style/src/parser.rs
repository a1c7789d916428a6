//! Stylesheet Parser using cssparser
//!
//! Turns stylesheet text into [`Stylesheet`] rules. Tokenization, blocks,
//! comments and `!important` come from cssparser; the selector and value
//! grammar on top of it is ours:
//! - selectors are `Type#id.class:pseudo` parts joined by whitespace or `>`
//! - values are space-separated numbers, sizes, colors, strings, keywords
//!   and lookups (`-name` or `var(name)`)
//! - `@font-face` is the only at-rule
//!
//! Parsing stops at the first malformed rule or declaration.

use std::sync::Arc;

use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, ParseError, ParseErrorKind,
    Parser, ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
    StyleSheetParser, ToCss, Token,
};

use crate::error::StyleError;
use crate::rule::{Declaration, FontFace, Origin, Rule, Stylesheet};
use crate::selector::{Combinator, CompoundSelector, Selector, SimpleSelector};
use crate::value::{Color, ParsedValue, Size, SizeUnit};

/// Failures raised from inside the cssparser callbacks
#[derive(Debug)]
enum Failure {
    Syntax(String),
    Style(StyleError),
}

fn syntax(message: impl Into<String>) -> Failure {
    Failure::Syntax(message.into())
}

type Parsed<'i, T> = Result<T, ParseError<'i, Failure>>;

/// Parse a whole stylesheet
pub fn parse_stylesheet(
    css: &str,
    origin: Origin,
    url: Option<String>,
) -> Result<Arc<Stylesheet>, StyleError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut top_level = TopLevelParser;

    let mut rules = Vec::new();
    let mut font_faces = Vec::new();
    for item in StyleSheetParser::new(&mut parser, &mut top_level) {
        match item.map_err(|(err, _)| style_error(err))? {
            TopLevel::Rule(rule) => rules.push(rule),
            TopLevel::FontFace(face) => font_faces.push(face),
        }
    }

    tracing::debug!("Parsed {} rules, {} font faces", rules.len(), font_faces.len());
    Ok(Stylesheet::new(origin, url, rules, font_faces))
}

/// Parse `a, b > c` into one selector per comma
pub fn parse_selector_list(text: &str) -> Result<Vec<Selector>, StyleError> {
    parse_text(text, parse_selectors)
}

/// Parse a single selector
pub fn parse_selector(text: &str) -> Result<Selector, StyleError> {
    parse_text(text, parse_complex_selector)
}

/// Parse the body of a rule or an inline style
pub fn parse_declarations(text: &str) -> Result<Vec<Declaration>, StyleError> {
    parse_text(text, parse_declaration_block)
}

/// Parse one declaration value
pub fn parse_value(text: &str) -> Result<ParsedValue, StyleError> {
    parse_text(text, |input| {
        let location = input.current_source_location();
        match parse_declared_value(input)? {
            (value, false) => Ok(value),
            (_, true) => {
                Err(location.new_custom_error(syntax("'!important' outside of a declaration")))
            }
        }
    })
}

fn parse_text<T>(
    text: &str,
    parse: impl for<'i, 't> FnOnce(&mut Parser<'i, 't>) -> Parsed<'i, T>,
) -> Result<T, StyleError> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parser.parse_entirely(parse).map_err(style_error)
}

/// Lines are reported one-based
fn style_error(err: ParseError<'_, Failure>) -> StyleError {
    let line = err.location.line + 1;
    let message = match err.kind {
        ParseErrorKind::Custom(Failure::Syntax(message)) => message,
        ParseErrorKind::Custom(Failure::Style(StyleError::Parse { message, .. })) => message,
        ParseErrorKind::Custom(Failure::Style(other)) => return other,
        ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => {
            format!("unexpected '{}'", token.to_css_string())
        }
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
            "unexpected end of input".to_string()
        }
        ParseErrorKind::Basic(BasicParseErrorKind::AtRuleInvalid(name)) => {
            format!("unsupported at-rule '@{name}'")
        }
        ParseErrorKind::Basic(other) => format!("{other:?}"),
    };
    StyleError::Parse { line, message }
}

// ============================================================================
// Rules
// ============================================================================

enum TopLevel {
    Rule(Rule),
    FontFace(FontFace),
}

struct TopLevelParser;

impl<'i> QualifiedRuleParser<'i> for TopLevelParser {
    type Prelude = Vec<Selector>;
    type QualifiedRule = TopLevel;
    type Error = Failure;

    fn parse_prelude<'t>(&mut self, input: &mut Parser<'i, 't>) -> Parsed<'i, Self::Prelude> {
        parse_selectors(input)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Parsed<'i, Self::QualifiedRule> {
        Ok(TopLevel::Rule(Rule::new(prelude, parse_declaration_block(input)?)))
    }
}

impl<'i> AtRuleParser<'i> for TopLevelParser {
    type Prelude = ();
    type AtRule = TopLevel;
    type Error = Failure;

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Parsed<'i, Self::Prelude> {
        if !name.eq_ignore_ascii_case("font-face") {
            return Err(input.new_error(BasicParseErrorKind::AtRuleInvalid(name)));
        }
        input.expect_exhausted()?;
        Ok(())
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Parsed<'i, Self::AtRule> {
        let descriptors = parse_declaration_block(input)?
            .into_iter()
            .map(|d| (d.property, d.value))
            .collect();
        Ok(TopLevel::FontFace(FontFace { descriptors }))
    }
}

/// Declarations only; nested rules and at-rules are errors
struct DeclarationListParser;

impl<'i> DeclarationParser<'i> for DeclarationListParser {
    type Declaration = Declaration;
    type Error = Failure;

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &ParserState,
    ) -> Parsed<'i, Self::Declaration> {
        let (value, important) = parse_declared_value(input)?;
        Ok(Declaration::new(name.to_string(), value, important))
    }
}

impl<'i> AtRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = Failure;
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = Failure;
}

impl<'i> RuleBodyItemParser<'i, Declaration, Failure> for DeclarationListParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

fn parse_declaration_block<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, Vec<Declaration>> {
    let mut declarations = DeclarationListParser;
    RuleBodyParser::new(input, &mut declarations)
        .map(|item| item.map_err(|(err, _)| err))
        .collect()
}

// ============================================================================
// Selectors
// ============================================================================

fn parse_selectors<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, Vec<Selector>> {
    input.parse_comma_separated(parse_complex_selector)
}

/// Simple selectors joined by combinators. Whitespace is significant here,
/// so tokens are read with `next_including_whitespace`.
fn parse_complex_selector<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, Selector> {
    input.skip_whitespace();
    let location = input.current_source_location();
    let mut parts = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;

    loop {
        let state = input.state();
        let token_location = input.current_source_location();
        let Ok(token) = input.next_including_whitespace().cloned() else {
            break;
        };
        match token {
            Token::WhiteSpace(_) => {
                if !parts.is_empty() && pending.is_none() {
                    pending = Some(Combinator::Descendant);
                }
            }
            Token::Delim('>') => {
                if parts.is_empty() || pending == Some(Combinator::Child) {
                    return Err(token_location.new_custom_error(syntax("misplaced '>'")));
                }
                pending = Some(Combinator::Child);
            }
            token if !parts.is_empty() && pending.is_none() => {
                return Err(token_location.new_unexpected_token_error(token));
            }
            _ => {
                input.reset(&state);
                if let Some(combinator) = pending.take() {
                    combinators.push(combinator);
                }
                parts.push(parse_simple_selector(input)?);
            }
        }
    }

    if pending == Some(Combinator::Child) {
        return Err(location.new_custom_error(syntax("dangling '>'")));
    }
    match parts.len() {
        0 => Err(location.new_custom_error(syntax("empty selector"))),
        1 => Ok(Selector::Simple(parts.remove(0))),
        _ => CompoundSelector::new(parts, combinators)
            .map(Selector::Compound)
            .map_err(|err| location.new_custom_error(Failure::Style(err))),
    }
}

fn parse_simple_selector<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, SimpleSelector> {
    let location = input.current_source_location();
    let mut type_name: Option<CowRcStr<'i>> = None;
    let mut id: Option<CowRcStr<'i>> = None;
    let mut classes = Vec::new();
    let mut pseudos = Vec::new();
    let mut empty = true;

    loop {
        let state = input.state();
        let Ok(token) = input.next_including_whitespace().cloned() else {
            break;
        };
        match token {
            Token::Ident(name) if empty => type_name = Some(name),
            Token::Delim('*') if empty => {}
            Token::IDHash(name) if id.is_none() => id = Some(name),
            Token::IDHash(_) => {
                return Err(location.new_custom_error(syntax("two ids in one selector")));
            }
            Token::Delim('.') => classes.push(expect_name(input)?),
            Token::Colon => pseudos.push(expect_name(input)?),
            _ => {
                input.reset(&state);
                break;
            }
        }
        empty = false;
    }

    if empty {
        let token = input.next_including_whitespace()?.clone();
        return Err(location.new_unexpected_token_error(token));
    }

    let classes: Vec<&str> = classes.iter().map(|c| &**c).collect();
    let pseudos: Vec<&str> = pseudos.iter().map(|p| &**p).collect();
    SimpleSelector::new(type_name.as_deref(), id.as_deref(), &classes, &pseudos)
        .map_err(|err| location.new_custom_error(Failure::Style(err)))
}

/// An identifier directly after `.` or `:`
fn expect_name<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, CowRcStr<'i>> {
    let location = input.current_source_location();
    match input.next_including_whitespace()? {
        Token::Ident(name) => Ok(name.clone()),
        other => Err(location.new_unexpected_token_error(other.clone())),
    }
}

// ============================================================================
// Values
// ============================================================================

/// The rest of a declaration: components and an optional `!important`
fn parse_declared_value<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, (ParsedValue, bool)> {
    let location = input.current_source_location();
    let mut values = Vec::new();
    let mut important = false;

    loop {
        input.skip_whitespace();
        if input.is_exhausted() {
            break;
        }
        if input.try_parse(cssparser::parse_important).is_ok() {
            important = true;
            input.expect_exhausted()?;
            break;
        }
        values.push(parse_component(input)?);
    }

    let value = match values.len() {
        0 => return Err(location.new_custom_error(syntax("missing value"))),
        1 => match values.remove(0) {
            ParsedValue::Ident(name) if name.eq_ignore_ascii_case("inherit") => {
                ParsedValue::Inherit
            }
            ParsedValue::Ident(name) if name.eq_ignore_ascii_case("null") => ParsedValue::Null,
            value => value,
        },
        _ => ParsedValue::Sequence(values),
    };
    Ok((value, important))
}

fn parse_component<'i>(input: &mut Parser<'i, '_>) -> Parsed<'i, ParsedValue> {
    let location = input.current_source_location();
    let start = input.position();
    let token = input.next()?.clone();
    let text = input.slice_from(start);

    match token {
        Token::Number { value, .. } => Ok(ParsedValue::Number(exact(text, 0, value))),
        Token::Percentage { unit_value, .. } => Ok(ParsedValue::Size(Size::new(
            exact(text, 1, unit_value * 100.0),
            SizeUnit::Percent,
        ))),
        Token::Dimension { value, unit, .. } => {
            let size_unit = SizeUnit::from_suffix(&unit.to_ascii_lowercase()).ok_or_else(|| {
                location.new_custom_error(syntax(format!("unknown unit in '{text}'")))
            })?;
            Ok(ParsedValue::Size(Size::new(exact(text, unit.len(), value), size_unit)))
        }
        Token::IDHash(hex) | Token::Hash(hex) => Color::from_hex(&hex)
            .map(ParsedValue::Color)
            .ok_or_else(|| location.new_custom_error(syntax(format!("bad color '{text}'")))),
        Token::QuotedString(s) => Ok(ParsedValue::Str(s.to_string())),
        Token::Ident(name) if name.starts_with('-') => Ok(ParsedValue::Lookup(name.to_string())),
        Token::Ident(name) => Ok(ParsedValue::Ident(name.to_string())),
        Token::Function(name) if name.eq_ignore_ascii_case("var") => {
            input.parse_nested_block(|input| {
                let name = input.expect_ident_cloned()?;
                input.expect_exhausted()?;
                Ok(ParsedValue::Lookup(name.to_string()))
            })
        }
        Token::Function(name) => {
            Err(location.new_custom_error(syntax(format!("unsupported function '{name}()'"))))
        }
        other => Err(location.new_unexpected_token_error(other)),
    }
}

/// Numbers are re-read from the source text; the tokenizer keeps only f32
fn exact(text: &str, suffix_len: usize, approx: f32) -> f64 {
    text.len()
        .checked_sub(suffix_len)
        .and_then(|end| text.get(..end))
        .and_then(|number| number.parse().ok())
        .unwrap_or(f64::from(approx))
}
