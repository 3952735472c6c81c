//! Recursive descent parser over the token stream
//!
//! Only Default-channel tokens participate in the grammar; comment and
//! newline tokens are skipped here and recovered later from the stream by
//! the formatter.

use crate::ast::{AssignExpr, BraceExpr, BraceValue, BraceValueKind, Expr, ExprKind, Program, Value, ValueKind};
use crate::token::{Channel, TokenKind, TokenStream, line_col};

/// Error type for lexing and parsing failures
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error at {line}:{column}: unexpected character")]
    UnexpectedChar { line: usize, column: usize },

    #[error("Syntax error at {line}:{column}: unexpected '{found}', expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        line: usize,
        column: usize,
    },

    #[error("Syntax error: unexpected end of file, expected {expected}")]
    UnexpectedEof { expected: &'static str },
}

/// Parse a whole program from a token stream
pub fn parse(tokens: &TokenStream<'_>) -> Result<Program, ParseError> {
    Parser { tokens, pos: 0 }.program()
}

struct Parser<'a, 'b> {
    tokens: &'b TokenStream<'a>,
    pos: usize,
}

impl Parser<'_, '_> {
    fn program(&mut self) -> Result<Program, ParseError> {
        let mut exprs = Vec::new();

        while self.peek().is_some() {
            exprs.push(self.expr()?);
        }

        Ok(Program { exprs })
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let start = match self.peek() {
            Some(index) => index,
            None => return Err(ParseError::UnexpectedEof { expected: "a key or value" }),
        };

        match self.tokens.kind(start) {
            TokenKind::Scalar | TokenKind::Str => {
                if let Some(second) = self.peek_second()
                    && self.tokens.kind(second) == TokenKind::Equals
                {
                    self.pos = second + 1;
                    let value = self.value()?;
                    let stop = value.stop;
                    Ok(Expr {
                        kind: ExprKind::Assign(AssignExpr { key: start, value }),
                        start,
                        stop,
                    })
                } else {
                    self.pos = start + 1;
                    let value = Value { kind: ValueKind::Leaf, start, stop: start };
                    Ok(Expr { kind: ExprKind::Value(value), start, stop: start })
                }
            }
            TokenKind::LBrace => {
                let value = self.brace()?;
                let (start, stop) = (value.start, value.stop);
                Ok(Expr { kind: ExprKind::Value(value), start, stop })
            }
            _ => Err(self.unexpected(start, "a key or value")),
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        let index = match self.peek() {
            Some(index) => index,
            None => return Err(ParseError::UnexpectedEof { expected: "a value" }),
        };

        match self.tokens.kind(index) {
            TokenKind::Scalar | TokenKind::Str => {
                self.pos = index + 1;
                Ok(Value { kind: ValueKind::Leaf, start: index, stop: index })
            }
            TokenKind::LBrace => self.brace(),
            _ => Err(self.unexpected(index, "a value")),
        }
    }

    fn brace(&mut self) -> Result<Value, ParseError> {
        let l_brace = match self.peek() {
            Some(index) => index,
            None => return Err(ParseError::UnexpectedEof { expected: "'{'" }),
        };
        self.pos = l_brace + 1;

        let mut values = Vec::new();
        loop {
            let index = match self.peek() {
                Some(index) => index,
                None => return Err(ParseError::UnexpectedEof { expected: "'}'" }),
            };

            match self.tokens.kind(index) {
                TokenKind::RBrace => {
                    self.pos = index + 1;
                    return Ok(Value {
                        kind: ValueKind::Brace(BraceExpr { l_brace, r_brace: index, values }),
                        start: l_brace,
                        stop: index,
                    });
                }
                TokenKind::Scalar | TokenKind::Str => {
                    if let Some(second) = self.peek_second()
                        && self.tokens.kind(second) == TokenKind::Equals
                    {
                        let expr = self.expr()?;
                        let (start, stop) = (expr.start, expr.stop);
                        values.push(BraceValue { kind: BraceValueKind::Expr(expr), start, stop });
                    } else {
                        self.pos = index + 1;
                        let value = Value { kind: ValueKind::Leaf, start: index, stop: index };
                        values.push(BraceValue {
                            kind: BraceValueKind::Value(value),
                            start: index,
                            stop: index,
                        });
                    }
                }
                TokenKind::LBrace => {
                    let value = self.brace()?;
                    let (start, stop) = (value.start, value.stop);
                    let expr = Expr { kind: ExprKind::Value(value), start, stop };
                    values.push(BraceValue { kind: BraceValueKind::Expr(expr), start, stop });
                }
                _ => return Err(self.unexpected(index, "a key, value or '}'")),
            }
        }
    }

    /// Next Default-channel token at or after `pos`
    fn peek(&self) -> Option<usize> {
        self.peek_from(self.pos)
    }

    /// Default-channel token after the one `peek` would return
    fn peek_second(&self) -> Option<usize> {
        self.peek().and_then(|index| self.peek_from(index + 1))
    }

    fn peek_from(&self, mut index: usize) -> Option<usize> {
        while index < self.tokens.len() {
            if self.tokens.channel(index) == Channel::Default {
                return Some(index);
            }
            index += 1;
        }
        None
    }

    fn unexpected(&self, index: usize, expected: &'static str) -> ParseError {
        let span = self.tokens.span(index);
        let (line, column) = line_col(self.tokens.source(), span.start);
        ParseError::UnexpectedToken {
            found: self.tokens.text(index).to_string(),
            expected,
            line,
            column,
        }
    }
}
