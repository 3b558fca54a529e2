//! Recursive descent parser for the interpolation grammar.
//!
//! Entry points:
//! - [`parse_text`] - the Text production (literal fragments + interpolations)
//! - [`parse_element`] - the Element production (one primitive, quoted
//!   string, list, or map), used for resolver arguments and dotlist values
//!
//! The parser is total on the defined grammar and reports failures as
//! [`GrammarParseError`] with byte offsets into the expression text.

use smol_str::SmolStr;

use crate::errors::GrammarParseError;

use super::ast::{Arg, Element, Fragment, InterpAst, NamePart, Segment, TextAst};
use super::lexer::{Lexed, Mode, ModeLexer, TokenKind};

type PResult<T> = Result<T, GrammarParseError>;

/// Quick check used to decide whether a string value must be routed through
/// the grammar at all. Escaped openings still route through (they need
/// unescaping on access).
pub fn contains_interp(s: &str) -> bool {
    s.contains("${")
}

/// Parse a full text value.
pub fn parse_text(src: &str) -> PResult<TextAst> {
    let mut parser = Parser::new(src);
    let ast = parser.parse_text_fragments()?;
    Ok(ast)
}

/// Parse a full string as one Element (dotlist right-hand sides, decoding).
pub fn parse_element(src: &str) -> PResult<Element> {
    let mut parser = Parser::new(src);
    let (element, _raw, _) = parser.parse_element_until(Ctx::Eof)?;
    Ok(element)
}

/// Which terminators close the element currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    /// Resolver argument: `,` or `}`.
    Arg,
    /// List item: `,` or `]`.
    ListItem,
    /// Map key: `:`.
    MapKey,
    /// Map value: `,` or `}`.
    MapValue,
    /// Whole-string element: end of input.
    Eof,
}

/// The terminator that ended an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Comma,
    RBrace,
    RBracket,
    Colon,
    Eof,
}

/// An interpolation-body part prior to classification as a node-reference
/// segment or a resolver-name component.
enum Part {
    Literal(SmolStr),
    Bracket(TextAst),
    Interp(InterpAst),
}

struct Parser<'s> {
    src: &'s str,
    lexer: ModeLexer<'s>,
    pending: Option<(Lexed<'s>, Mode)>,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            lexer: ModeLexer::new(src),
            pending: None,
        }
    }

    fn next(&mut self, mode: Mode) -> Option<Lexed<'s>> {
        if let Some((tok, pending_mode)) = self.pending.take() {
            debug_assert_eq!(pending_mode, mode, "lookahead crossed a lexer mode");
            return Some(tok);
        }
        self.lexer.next(mode)
    }

    fn peek(&mut self, mode: Mode) -> Option<Lexed<'s>> {
        if self.pending.is_none() {
            let tok = self.lexer.next(mode)?;
            self.pending = Some((tok, mode));
        }
        self.pending.map(|(tok, _)| tok)
    }

    fn skip_ws(&mut self) {
        while let Some(tok) = self.peek(Mode::Interp) {
            if tok.kind == TokenKind::Whitespace {
                self.next(Mode::Interp);
            } else {
                break;
            }
        }
    }

    fn err(&self, message: impl Into<String>, offset: usize) -> GrammarParseError {
        GrammarParseError::new(message, offset, self.src)
    }

    fn eof_err(&self, message: impl Into<String>) -> GrammarParseError {
        self.err(message, self.src.len())
    }

    // ------------------------------------------------------------------
    // Text production
    // ------------------------------------------------------------------

    fn parse_text_fragments(&mut self) -> PResult<TextAst> {
        let mut fragments = Vec::new();
        let mut literal = String::new();
        while let Some(tok) = self.next(Mode::Text) {
            match tok.kind {
                TokenKind::InterpOpen => {
                    if !literal.is_empty() {
                        fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
                    }
                    fragments.push(Fragment::Interp(self.parse_interp()?));
                }
                TokenKind::Escaped => literal.push_str(tok.unescaped()),
                _ => literal.push_str(tok.text),
            }
        }
        if !literal.is_empty() || fragments.is_empty() {
            fragments.push(Fragment::Literal(literal));
        }
        Ok(TextAst { fragments })
    }

    // ------------------------------------------------------------------
    // Interpolation production (after `${` has been consumed)
    // ------------------------------------------------------------------

    fn parse_interp(&mut self) -> PResult<InterpAst> {
        self.skip_ws();

        let mut rel_depth = 0usize;
        while let Some(tok) = self.peek(Mode::Interp) {
            if tok.kind != TokenKind::Dot {
                break;
            }
            self.next(Mode::Interp);
            rel_depth += 1;
        }

        let mut parts: Vec<Part> = Vec::new();
        let mut after_dot = true;
        loop {
            let Some(tok) = self.peek(Mode::Interp) else {
                return Err(self.eof_err("unterminated interpolation (expected '}')"));
            };
            match tok.kind {
                TokenKind::RBrace => {
                    self.next(Mode::Interp);
                    return self.build_node_ref(rel_depth, parts, tok.offset);
                }
                TokenKind::Colon => {
                    self.next(Mode::Interp);
                    let name = self.build_resolver_name(rel_depth, parts, tok.offset)?;
                    let args = self.parse_args()?;
                    return Ok(InterpAst::ResolverCall { name, args });
                }
                TokenKind::Dot => {
                    if after_dot {
                        return Err(self.err("empty path segment", tok.offset));
                    }
                    self.next(Mode::Interp);
                    after_dot = true;
                }
                TokenKind::LBracket => {
                    self.next(Mode::Interp);
                    let segment = self.parse_bracket_segment(tok.offset)?;
                    parts.push(segment);
                    after_dot = false;
                }
                TokenKind::InterpOpen => {
                    self.next(Mode::Interp);
                    parts.push(Part::Interp(self.parse_interp()?));
                    after_dot = false;
                }
                TokenKind::Chunk
                | TokenKind::Escaped
                | TokenKind::Dollar
                | TokenKind::Eq => {
                    let word = self.collect_word();
                    parts.push(Part::Literal(word));
                    after_dot = false;
                }
                TokenKind::Whitespace => {
                    self.skip_ws();
                    let Some(next) = self.peek(Mode::Interp) else {
                        return Err(self.eof_err("unterminated interpolation (expected '}')"));
                    };
                    if !matches!(next.kind, TokenKind::RBrace | TokenKind::Colon) {
                        return Err(self.err(
                            "unexpected whitespace inside interpolation",
                            next.offset,
                        ));
                    }
                }
                _ => {
                    return Err(self.err(
                        format!("unexpected '{}' in interpolation", tok.text),
                        tok.offset,
                    ));
                }
            }
        }
    }

    /// Consume a run of word-forming tokens into one literal.
    fn collect_word(&mut self) -> SmolStr {
        let mut word = String::new();
        while let Some(tok) = self.peek(Mode::Interp) {
            match tok.kind {
                TokenKind::Chunk | TokenKind::Dollar | TokenKind::Eq => {
                    word.push_str(tok.text);
                    self.next(Mode::Interp);
                }
                TokenKind::Escaped => {
                    word.push_str(tok.unescaped());
                    self.next(Mode::Interp);
                }
                _ => break,
            }
        }
        SmolStr::new(word)
    }

    fn build_node_ref(
        &self,
        rel_depth: usize,
        parts: Vec<Part>,
        at: usize,
    ) -> PResult<InterpAst> {
        if parts.is_empty() {
            return Err(self.err("empty interpolation reference", at));
        }
        let segments = parts
            .into_iter()
            .map(|part| match part {
                Part::Literal(text) => Segment::Literal(text),
                Part::Bracket(ast) => Segment::Dynamic(ast),
                Part::Interp(interp) => Segment::Dynamic(TextAst {
                    fragments: vec![Fragment::Interp(interp)],
                }),
            })
            .collect();
        Ok(InterpAst::NodeRef {
            rel_depth,
            segments,
        })
    }

    fn build_resolver_name(
        &self,
        rel_depth: usize,
        parts: Vec<Part>,
        at: usize,
    ) -> PResult<Vec<NamePart>> {
        if rel_depth > 0 {
            return Err(self.err("resolver names cannot be relative", at));
        }
        if parts.is_empty() {
            return Err(self.err("empty resolver name", at));
        }
        parts
            .into_iter()
            .map(|part| match part {
                Part::Literal(text) => Ok(NamePart::Literal(text)),
                Part::Interp(interp) => Ok(NamePart::Interp(Box::new(interp))),
                Part::Bracket(_) => {
                    Err(self.err("brackets are not allowed in resolver names", at))
                }
            })
            .collect()
    }

    /// Parse a `[...]` segment of a node reference. Dots and most
    /// punctuation are literal inside brackets; nested interpolations make
    /// the segment dynamic.
    fn parse_bracket_segment(&mut self, open_at: usize) -> PResult<Part> {
        self.skip_ws();

        // Quoted key: ['some.key'] or ["some.key"].
        if let Some(tok) = self.peek(Mode::Interp) {
            if matches!(tok.kind, TokenKind::SingleQuote | TokenKind::DoubleQuote) {
                self.next(Mode::Interp);
                let ast = self.parse_quoted(tok.kind)?;
                self.skip_ws();
                match self.next(Mode::Interp) {
                    Some(close) if close.kind == TokenKind::RBracket => {
                        return Ok(bracket_part(ast));
                    }
                    Some(close) => {
                        return Err(self.err("expected ']' after quoted key", close.offset));
                    }
                    None => return Err(self.eof_err("unterminated '[' segment")),
                }
            }
        }

        let mut fragments = Vec::new();
        let mut literal = String::new();
        loop {
            let Some(tok) = self.peek(Mode::Interp) else {
                return Err(self.eof_err("unterminated '[' segment"));
            };
            match tok.kind {
                TokenKind::RBracket => {
                    self.next(Mode::Interp);
                    break;
                }
                TokenKind::InterpOpen => {
                    self.next(Mode::Interp);
                    if !literal.is_empty() {
                        fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
                    }
                    fragments.push(Fragment::Interp(self.parse_interp()?));
                }
                TokenKind::Escaped => {
                    literal.push_str(tok.unescaped());
                    self.next(Mode::Interp);
                }
                TokenKind::LBracket => {
                    return Err(self.err("nested '[' in bracket segment", tok.offset));
                }
                TokenKind::RBrace | TokenKind::Colon => {
                    return Err(self.err(
                        format!("unexpected '{}' in bracket segment (missing ']'?)", tok.text),
                        tok.offset,
                    ));
                }
                _ => {
                    literal.push_str(tok.text);
                    self.next(Mode::Interp);
                }
            }
        }
        if !literal.is_empty() {
            fragments.push(Fragment::Literal(literal));
        }
        if fragments.is_empty() {
            return Err(self.err("empty bracket segment", open_at));
        }
        let ast = TextAst { fragments };
        // Trim edge whitespace of a purely literal segment.
        Ok(bracket_part(trim_literal_edges(ast)))
    }

    // ------------------------------------------------------------------
    // Resolver arguments
    // ------------------------------------------------------------------

    fn parse_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        self.skip_ws();
        if let Some(tok) = self.peek(Mode::Interp) {
            if tok.kind == TokenKind::RBrace {
                self.next(Mode::Interp);
                return Ok(args);
            }
        }
        loop {
            let (element, raw, term) = self.parse_element_until(Ctx::Arg)?;
            args.push(Arg { element, raw });
            match term {
                Term::Comma => continue,
                Term::RBrace => break,
                _ => unreachable!("Arg context yields ',' or '}}'"),
            }
        }
        if let Some(last) = args.last() {
            if last.raw.is_empty() {
                tracing::warn!(
                    expression = self.src,
                    "empty trailing resolver argument is deprecated"
                );
            }
        }
        Ok(args)
    }

    // ------------------------------------------------------------------
    // Element production
    // ------------------------------------------------------------------

    fn parse_element_until(&mut self, ctx: Ctx) -> PResult<(Element, String, Term)> {
        self.skip_ws();

        let Some(first) = self.peek(Mode::Interp) else {
            if ctx == Ctx::Eof {
                return Ok((Element::Str(String::new()), String::new(), Term::Eof));
            }
            return Err(self.eof_err("unterminated element"));
        };

        match first.kind {
            TokenKind::SingleQuote | TokenKind::DoubleQuote => {
                let start = first.offset;
                self.next(Mode::Interp);
                let ast = self.parse_quoted(first.kind)?;
                let end = self.cursor_estimate(start);
                let term = self.finish_element(ctx)?;
                let raw = self.src[start..end].trim().to_string();
                Ok((Element::Quoted(ast), raw, term))
            }
            TokenKind::LBracket => {
                let start = first.offset;
                self.next(Mode::Interp);
                let items = self.parse_list_body()?;
                let end = self.cursor_estimate(start);
                let term = self.finish_element(ctx)?;
                let raw = self.src[start..end].trim().to_string();
                Ok((Element::List(items), raw, term))
            }
            TokenKind::LBrace => {
                let start = first.offset;
                self.next(Mode::Interp);
                let entries = self.parse_map_body()?;
                let end = self.cursor_estimate(start);
                let term = self.finish_element(ctx)?;
                let raw = self.src[start..end].trim().to_string();
                Ok((Element::Map(entries), raw, term))
            }
            _ => self.parse_unquoted_run(ctx),
        }
    }

    /// After a quoted/list/map element, only whitespace then a terminator
    /// may follow.
    fn finish_element(&mut self, ctx: Ctx) -> PResult<Term> {
        self.skip_ws();
        let Some(tok) = self.peek(Mode::Interp) else {
            if ctx == Ctx::Eof {
                return Ok(Term::Eof);
            }
            return Err(self.eof_err("unterminated element"));
        };
        let term = match (tok.kind, ctx) {
            (TokenKind::Comma, Ctx::Arg | Ctx::ListItem | Ctx::MapValue) => Term::Comma,
            (TokenKind::RBrace, Ctx::Arg | Ctx::MapValue) => Term::RBrace,
            (TokenKind::RBracket, Ctx::ListItem) => Term::RBracket,
            (TokenKind::Colon, Ctx::MapKey) => Term::Colon,
            _ => {
                return Err(self.err(
                    format!("unexpected '{}' after element", tok.text),
                    tok.offset,
                ));
            }
        };
        self.next(Mode::Interp);
        Ok(term)
    }

    fn parse_unquoted_run(&mut self, ctx: Ctx) -> PResult<(Element, String, Term)> {
        let mut fragments: Vec<Fragment> = Vec::new();
        let mut literal = String::new();
        let mut span: Option<(usize, usize)> = None;
        let term;
        loop {
            let Some(tok) = self.peek(Mode::Interp) else {
                if ctx == Ctx::Eof {
                    term = Term::Eof;
                    break;
                }
                return Err(self.eof_err("unterminated element"));
            };
            match (tok.kind, ctx) {
                (TokenKind::Comma, Ctx::Arg | Ctx::ListItem | Ctx::MapValue) => {
                    self.next(Mode::Interp);
                    term = Term::Comma;
                    break;
                }
                (TokenKind::RBrace, Ctx::Arg | Ctx::MapValue) => {
                    self.next(Mode::Interp);
                    term = Term::RBrace;
                    break;
                }
                (TokenKind::RBracket, Ctx::ListItem) => {
                    self.next(Mode::Interp);
                    term = Term::RBracket;
                    break;
                }
                (TokenKind::Colon, Ctx::MapKey) => {
                    self.next(Mode::Interp);
                    term = Term::Colon;
                    break;
                }
                (TokenKind::InterpOpen, _) => {
                    self.next(Mode::Interp);
                    if !literal.is_empty() {
                        fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
                    }
                    let interp = self.parse_interp()?;
                    fragments.push(Fragment::Interp(interp));
                    extend_span(&mut span, tok.offset, self.cursor_estimate(tok.offset));
                }
                (
                    TokenKind::Chunk
                    | TokenKind::Dot
                    | TokenKind::Whitespace
                    | TokenKind::Dollar
                    | TokenKind::Eq
                    | TokenKind::LParen
                    | TokenKind::RParen
                    | TokenKind::Backslash,
                    _,
                ) => {
                    literal.push_str(tok.text);
                    extend_span(&mut span, tok.offset, tok.end());
                    self.next(Mode::Interp);
                }
                (TokenKind::Escaped, _) => {
                    literal.push_str(tok.unescaped());
                    extend_span(&mut span, tok.offset, tok.end());
                    self.next(Mode::Interp);
                }
                (TokenKind::SingleQuote | TokenKind::DoubleQuote, _) => {
                    return Err(self.err(
                        "quotes must enclose the whole element",
                        tok.offset,
                    ));
                }
                _ => {
                    return Err(self.err(
                        format!("unexpected '{}' in element", tok.text),
                        tok.offset,
                    ));
                }
            }
        }
        if !literal.is_empty() {
            fragments.push(Fragment::Literal(literal));
        }
        let raw = span
            .map(|(start, end)| self.src[start..end].trim().to_string())
            .unwrap_or_default();
        let element = classify_run(fragments);
        Ok((element, raw, term))
    }

    fn parse_list_body(&mut self) -> PResult<Vec<Element>> {
        self.skip_ws();
        if let Some(tok) = self.peek(Mode::Interp) {
            if tok.kind == TokenKind::RBracket {
                self.next(Mode::Interp);
                return Ok(Vec::new());
            }
        }
        let mut items = Vec::new();
        loop {
            let (element, _raw, term) = self.parse_element_until(Ctx::ListItem)?;
            items.push(element);
            match term {
                Term::Comma => continue,
                Term::RBracket => break,
                _ => unreachable!("ListItem context yields ',' or ']'"),
            }
        }
        Ok(items)
    }

    fn parse_map_body(&mut self) -> PResult<Vec<(Element, Element)>> {
        self.skip_ws();
        if let Some(tok) = self.peek(Mode::Interp) {
            if tok.kind == TokenKind::RBrace {
                self.next(Mode::Interp);
                return Ok(Vec::new());
            }
        }
        let mut entries = Vec::new();
        loop {
            let (key, _raw, _) = self.parse_element_until(Ctx::MapKey)?;
            let (value, _raw, term) = self.parse_element_until(Ctx::MapValue)?;
            entries.push((key, value));
            match term {
                Term::Comma => continue,
                Term::RBrace => break,
                _ => unreachable!("MapValue context yields ',' or '}}'"),
            }
        }
        Ok(entries)
    }

    /// Parse a quoted-string body after the opening quote; returns at the
    /// matching close quote. The other quote style is literal inside.
    fn parse_quoted(&mut self, open: TokenKind) -> PResult<TextAst> {
        let mut fragments = Vec::new();
        let mut literal = String::new();
        loop {
            let Some(tok) = self.next(Mode::Quoted) else {
                return Err(self.eof_err("unterminated quoted string"));
            };
            match tok.kind {
                kind if kind == open => break,
                TokenKind::InterpOpen => {
                    if !literal.is_empty() {
                        fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
                    }
                    fragments.push(Fragment::Interp(self.parse_interp()?));
                }
                TokenKind::Escaped => literal.push_str(tok.unescaped()),
                _ => literal.push_str(tok.text),
            }
        }
        if !literal.is_empty() || fragments.is_empty() {
            fragments.push(Fragment::Literal(literal));
        }
        Ok(TextAst { fragments })
    }

    /// The current scan position, for raw-argument capture. When lookahead
    /// holds a token, the cursor is at its start.
    fn cursor_estimate(&mut self, at_least: usize) -> usize {
        match self.pending {
            Some((tok, _)) => tok.offset.max(at_least),
            None => match self.peek(Mode::Interp) {
                Some(tok) => tok.offset.max(at_least),
                None => self.src.len(),
            },
        }
    }
}

fn bracket_part(ast: TextAst) -> Part {
    if let [Fragment::Literal(text)] = ast.fragments.as_slice() {
        Part::Literal(SmolStr::new(text))
    } else {
        Part::Bracket(ast)
    }
}

fn trim_literal_edges(mut ast: TextAst) -> TextAst {
    if let Some(Fragment::Literal(first)) = ast.fragments.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Fragment::Literal(last)) = ast.fragments.last_mut() {
        *last = last.trim_end().to_string();
    }
    ast.fragments.retain(|f| !matches!(f, Fragment::Literal(s) if s.is_empty()));
    if ast.fragments.is_empty() {
        ast.fragments.push(Fragment::Literal(String::new()));
    }
    ast
}

fn extend_span(span: &mut Option<(usize, usize)>, start: usize, end: usize) {
    match span {
        Some((_, e)) => *e = end.max(*e),
        None => *span = Some((start, end)),
    }
}

/// Classify an unquoted run into a primitive, bare interpolation, or
/// concatenation. Surrounding whitespace has been trimmed by the caller via
/// raw-span logic; literal fragments are trimmed here to match.
fn classify_run(mut fragments: Vec<Fragment>) -> Element {
    // Trim outer whitespace of the run's edge literals.
    if let Some(Fragment::Literal(first)) = fragments.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Fragment::Literal(last)) = fragments.last_mut() {
        *last = last.trim_end().to_string();
    }
    fragments.retain(|f| !matches!(f, Fragment::Literal(s) if s.is_empty()));

    match fragments.len() {
        0 => Element::Str(String::new()),
        1 => match fragments.pop().expect("len checked") {
            Fragment::Interp(interp) => Element::Interp(Box::new(interp)),
            Fragment::Literal(text) => classify_primitive(text),
        },
        _ => Element::Concat(fragments),
    }
}

fn classify_primitive(text: String) -> Element {
    use super::literals;
    if literals::is_null_literal(&text) {
        return Element::Null;
    }
    if let Some(b) = literals::parse_bool_literal(&text) {
        return Element::Bool(b);
    }
    if let Some(i) = literals::parse_int_literal(&text) {
        return Element::Int(i);
    }
    if let Some(f) = literals::parse_float_literal(&text) {
        return Element::Float(f);
    }
    Element::Str(text)
}
