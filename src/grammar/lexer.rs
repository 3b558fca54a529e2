//! Logos-based lexer for the interpolation grammar.
//!
//! The grammar needs lexer modes: `${` shifts into an interpolation mode
//! where dots, brackets, colon, and braces have specialized tokens, and
//! quoted strings re-enter a text-like mode so interpolations nest across
//! quote boundaries. Each mode is a logos token enum; [`ModeLexer`] bridges
//! them with `morph()`, which preserves the scan position.

use logos::Logos;

/// Lexer mode requested by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Top-level text: everything is literal except `${` and escapes.
    Text,
    /// Inside `${...}`: identifiers, dots, brackets, colon, comma, quotes.
    Interp,
    /// Inside a quoted string: literal except quotes, `${`, and escapes.
    Quoted,
}

/// A mode-independent token kind seen by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    InterpOpen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Dot,
    Eq,
    SingleQuote,
    DoubleQuote,
    Whitespace,
    /// An escape sequence; `text` includes the leading backslash.
    Escaped,
    /// A run of ordinary characters.
    Chunk,
    Dollar,
    Backslash,
}

/// A token with its kind, source text, and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexed<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    pub offset: usize,
}

impl Lexed<'_> {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    /// The literal character(s) an escape or text token stands for.
    pub fn unescaped(&self) -> &str {
        match self.kind {
            TokenKind::Escaped => {
                if self.text == "\\t" {
                    "\t"
                } else {
                    &self.text[1..]
                }
            }
            _ => self.text,
        }
    }
}

/// Top-level text mode tokens.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum TextToken {
    #[token("\\${")]
    EscInterp,
    #[token("\\\\")]
    EscBackslash,
    #[token("${")]
    InterpOpen,
    #[regex(r"[^\\$]+")]
    Chunk,
    #[token("$")]
    Dollar,
    #[token("\\")]
    Backslash,
}

/// Interpolation mode tokens.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum InterpToken {
    #[token("${")]
    InterpOpen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token("'")]
    SingleQuote,
    #[token("\"")]
    DoubleQuote,
    #[regex(r"[ \t]+")]
    Whitespace,
    #[regex(r"\\[\\${}\[\]():=, ]")]
    Escaped,
    #[token("\\t")]
    EscapedTab,
    #[regex(r#"[^\\${}\[\]():=,.'" \t]+"#)]
    Chunk,
    #[token("$")]
    Dollar,
    #[token("\\")]
    Backslash,
}

/// Quoted-string mode tokens (both quote styles).
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum QuotedToken {
    #[token("${")]
    InterpOpen,
    #[regex(r#"\\['"\\$]"#)]
    Escaped,
    #[token("'")]
    SingleQuote,
    #[token("\"")]
    DoubleQuote,
    #[regex(r#"[^\\$'"]+"#)]
    Chunk,
    #[token("$")]
    Dollar,
    #[token("\\")]
    Backslash,
}

enum Inner<'s> {
    Text(logos::Lexer<'s, TextToken>),
    Interp(logos::Lexer<'s, InterpToken>),
    Quoted(logos::Lexer<'s, QuotedToken>),
}

impl<'s> Inner<'s> {
    fn mode(&self) -> Mode {
        match self {
            Self::Text(_) => Mode::Text,
            Self::Interp(_) => Mode::Interp,
            Self::Quoted(_) => Mode::Quoted,
        }
    }

    fn morph_to(self, mode: Mode) -> Self {
        match (self, mode) {
            (inner @ Self::Text(_), Mode::Text)
            | (inner @ Self::Interp(_), Mode::Interp)
            | (inner @ Self::Quoted(_), Mode::Quoted) => inner,
            (Self::Text(lex), Mode::Interp) => Self::Interp(lex.morph()),
            (Self::Text(lex), Mode::Quoted) => Self::Quoted(lex.morph()),
            (Self::Interp(lex), Mode::Text) => Self::Text(lex.morph()),
            (Self::Interp(lex), Mode::Quoted) => Self::Quoted(lex.morph()),
            (Self::Quoted(lex), Mode::Text) => Self::Text(lex.morph()),
            (Self::Quoted(lex), Mode::Interp) => Self::Interp(lex.morph()),
        }
    }
}

/// Lexer that shifts between the three grammar modes on parser demand.
///
/// Mode switches happen only at delimiter boundaries (after `${`, quotes,
/// and `}`), so the scan position is always valid for the requested mode.
pub struct ModeLexer<'s> {
    inner: Option<Inner<'s>>,
}

impl<'s> ModeLexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self {
            inner: Some(Inner::Text(TextToken::lexer(src))),
        }
    }

    /// Lex the next token under the given mode, morphing if the mode
    /// changed. Returns `None` at end of input. Characters no pattern
    /// matches (there are none by construction) surface as `Chunk`.
    pub fn next(&mut self, mode: Mode) -> Option<Lexed<'s>> {
        let mut inner = self.inner.take().expect("lexer in use");
        if inner.mode() != mode {
            inner = inner.morph_to(mode);
        }
        let lexed = match &mut inner {
            Inner::Text(lex) => lex.next().map(|tok| Lexed {
                kind: match tok.unwrap_or(TextToken::Chunk) {
                    TextToken::EscInterp | TextToken::EscBackslash => TokenKind::Escaped,
                    TextToken::InterpOpen => TokenKind::InterpOpen,
                    TextToken::Chunk => TokenKind::Chunk,
                    TextToken::Dollar => TokenKind::Dollar,
                    TextToken::Backslash => TokenKind::Backslash,
                },
                text: lex.slice(),
                offset: lex.span().start,
            }),
            Inner::Interp(lex) => lex.next().map(|tok| Lexed {
                kind: match tok.unwrap_or(InterpToken::Chunk) {
                    InterpToken::InterpOpen => TokenKind::InterpOpen,
                    InterpToken::LBrace => TokenKind::LBrace,
                    InterpToken::RBrace => TokenKind::RBrace,
                    InterpToken::LBracket => TokenKind::LBracket,
                    InterpToken::RBracket => TokenKind::RBracket,
                    InterpToken::LParen => TokenKind::LParen,
                    InterpToken::RParen => TokenKind::RParen,
                    InterpToken::Colon => TokenKind::Colon,
                    InterpToken::Comma => TokenKind::Comma,
                    InterpToken::Dot => TokenKind::Dot,
                    InterpToken::Eq => TokenKind::Eq,
                    InterpToken::SingleQuote => TokenKind::SingleQuote,
                    InterpToken::DoubleQuote => TokenKind::DoubleQuote,
                    InterpToken::Whitespace => TokenKind::Whitespace,
                    InterpToken::Escaped | InterpToken::EscapedTab => TokenKind::Escaped,
                    InterpToken::Chunk => TokenKind::Chunk,
                    InterpToken::Dollar => TokenKind::Dollar,
                    InterpToken::Backslash => TokenKind::Backslash,
                },
                text: lex.slice(),
                offset: lex.span().start,
            }),
            Inner::Quoted(lex) => lex.next().map(|tok| Lexed {
                kind: match tok.unwrap_or(QuotedToken::Chunk) {
                    QuotedToken::InterpOpen => TokenKind::InterpOpen,
                    QuotedToken::Escaped => TokenKind::Escaped,
                    QuotedToken::SingleQuote => TokenKind::SingleQuote,
                    QuotedToken::DoubleQuote => TokenKind::DoubleQuote,
                    QuotedToken::Chunk => TokenKind::Chunk,
                    QuotedToken::Dollar => TokenKind::Dollar,
                    QuotedToken::Backslash => TokenKind::Backslash,
                },
                text: lex.slice(),
                offset: lex.span().start,
            }),
        };
        self.inner = Some(inner);
        lexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str, mode: Mode) -> Vec<(TokenKind, &str)> {
        let mut lexer = ModeLexer::new(src);
        let mut out = Vec::new();
        while let Some(tok) = lexer.next(mode) {
            out.push((tok.kind, tok.text));
        }
        out
    }

    #[test]
    fn test_text_mode_plain() {
        assert_eq!(collect("hello", Mode::Text), vec![(TokenKind::Chunk, "hello")]);
    }

    #[test]
    fn test_text_mode_interp_open() {
        assert_eq!(
            collect("a${b", Mode::Text),
            vec![
                (TokenKind::Chunk, "a"),
                (TokenKind::InterpOpen, "${"),
                (TokenKind::Chunk, "b"),
            ]
        );
    }

    #[test]
    fn test_text_mode_escapes() {
        assert_eq!(
            collect(r"\${x} \\", Mode::Text),
            vec![
                (TokenKind::Escaped, r"\${"),
                (TokenKind::Chunk, "x} "),
                (TokenKind::Escaped, r"\\"),
            ]
        );
    }

    #[test]
    fn test_interp_mode_punctuation() {
        assert_eq!(
            collect("a.b[0]:x,", Mode::Interp),
            vec![
                (TokenKind::Chunk, "a"),
                (TokenKind::Dot, "."),
                (TokenKind::Chunk, "b"),
                (TokenKind::LBracket, "["),
                (TokenKind::Chunk, "0"),
                (TokenKind::RBracket, "]"),
                (TokenKind::Colon, ":"),
                (TokenKind::Chunk, "x"),
                (TokenKind::Comma, ","),
            ]
        );
    }

    #[test]
    fn test_interp_mode_escapes() {
        let toks = collect(r"a\,b", Mode::Interp);
        assert_eq!(
            toks,
            vec![
                (TokenKind::Chunk, "a"),
                (TokenKind::Escaped, r"\,"),
                (TokenKind::Chunk, "b"),
            ]
        );
    }

    #[test]
    fn test_mode_switching_round_trip() {
        // "${a}" then text again
        let src = "x${a}y";
        let mut lexer = ModeLexer::new(src);
        assert_eq!(lexer.next(Mode::Text).unwrap().kind, TokenKind::Chunk);
        assert_eq!(lexer.next(Mode::Text).unwrap().kind, TokenKind::InterpOpen);
        let a = lexer.next(Mode::Interp).unwrap();
        assert_eq!((a.kind, a.text), (TokenKind::Chunk, "a"));
        assert_eq!(lexer.next(Mode::Interp).unwrap().kind, TokenKind::RBrace);
        let y = lexer.next(Mode::Text).unwrap();
        assert_eq!((y.kind, y.text), (TokenKind::Chunk, "y"));
        assert!(lexer.next(Mode::Text).is_none());
    }

    #[test]
    fn test_quoted_mode() {
        let toks = collect(r#"ab\'c'"#, Mode::Quoted);
        assert_eq!(
            toks,
            vec![
                (TokenKind::Chunk, "ab"),
                (TokenKind::Escaped, r"\'"),
                (TokenKind::Chunk, "c"),
                (TokenKind::SingleQuote, "'"),
            ]
        );
    }

    #[test]
    fn test_offsets_are_byte_positions() {
        let mut lexer = ModeLexer::new("ab${c}");
        let first = lexer.next(Mode::Text).unwrap();
        assert_eq!(first.offset, 0);
        let open = lexer.next(Mode::Text).unwrap();
        assert_eq!(open.offset, 2);
        let c = lexer.next(Mode::Interp).unwrap();
        assert_eq!(c.offset, 4);
    }

    #[test]
    fn test_unescape() {
        let mut lexer = ModeLexer::new(r"\,");
        let tok = lexer.next(Mode::Interp).unwrap();
        assert_eq!(tok.unescaped(), ",");
        let mut lexer = ModeLexer::new(r"\t");
        let tok = lexer.next(Mode::Interp).unwrap();
        assert_eq!(tok.unescaped(), "\t");
    }
}
