//! Lexer for Clausewitz script
//!
//! Produces a random-access token stream. Comments and line breaks stay in
//! the stream on their own channels so the formatter can reconstruct the
//! cosmetic runs between syntactically significant tokens; space and tab
//! runs are discarded outright.

use std::ops::Range;

use logos::Logos;

use crate::parser::ParseError;

/// Classification of a token as structurally significant or skip-worthy
/// but renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Default,
    Comment,
    Newline,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t]+")]
pub enum TokenKind {
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("=")]
    Equals,

    #[regex(r#""[^"\r\n]*""#)]
    Str,

    #[regex(r##"[^ \t\r\n{}=#"]+"##)]
    Scalar,

    #[regex(r"#[^\r\n]*")]
    Comment,

    #[regex(r"\r?\n|\r")]
    Newline,
}

impl TokenKind {
    pub fn channel(self) -> Channel {
        match self {
            TokenKind::Comment => Channel::Comment,
            TokenKind::Newline => Channel::Newline,
            _ => Channel::Default,
        }
    }
}

/// A token with its kind and byte span in the source
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Indexable token stream over a single source text
#[derive(Debug)]
pub struct TokenStream<'a> {
    source: &'a str,
    tokens: Vec<Token>,
}

impl<'a> TokenStream<'a> {
    /// Tokenize the whole source, keeping comment and newline tokens
    pub fn lex(source: &'a str) -> Result<Self, ParseError> {
        let mut tokens = Vec::new();
        let mut lexer = TokenKind::lexer(source);

        while let Some(result) = lexer.next() {
            let span = lexer.span();
            match result {
                Ok(kind) => tokens.push(Token { kind, span }),
                Err(()) => {
                    let (line, column) = line_col(source, span.start);
                    return Err(ParseError::UnexpectedChar { line, column });
                }
            }
        }

        Ok(Self { source, tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn kind(&self, index: usize) -> TokenKind {
        self.tokens[index].kind
    }

    pub fn channel(&self, index: usize) -> Channel {
        self.tokens[index].kind.channel()
    }

    /// Raw source text of a token
    pub fn text(&self, index: usize) -> &'a str {
        &self.source[self.tokens[index].span.clone()]
    }

    pub fn span(&self, index: usize) -> Range<usize> {
        self.tokens[index].span.clone()
    }

    pub fn source(&self) -> &'a str {
        self.source
    }
}

/// 1-based line and column of a byte offset
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let line_start = prefix.rfind('\n').map_or(0, |i| i + 1);
    let column = prefix[line_start..].chars().count() + 1;
    (line, column)
}
