//! Recursive-descent parser producing an [`Expr`] AST.
//!
//! The whole source is tokenized up front (see `lexer.rs`), then this
//! struct walks the token vector by index, one precedence level per
//! method, from the conditional operator (lowest) down to primaries
//! (highest).

use crate::ast::{is_macro_name, BinaryOp, Expr, LiteralKind, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::value::Value;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(source)?;
        Ok(Parser { tokens, pos: 0 })
    }

    /// Parse a complete expression, failing if anything is left over.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_conditional()?;
        if !matches!(self.peek().kind, TokenKind::Eof) {
            return Err(self.err(format!(
                "unexpected trailing input starting with {:?}",
                self.peek().kind
            )));
        }
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.peek().pos)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.peek_kind() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {kind:?}, found {:?}", self.peek_kind())))
        }
    }

    fn consume_if(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    // conditional: or ('?' conditional ':' conditional)?  -- right-associative
    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.consume_if(&TokenKind::Question) {
            let then_branch = self.parse_conditional()?;
            self.expect(&TokenKind::Colon)?;
            let else_branch = self.parse_conditional()?;
            Ok(Expr::Conditional {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            })
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.consume_if(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::LogicalOr,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        while self.consume_if(&TokenKind::AndAnd) {
            let right = self.parse_relational()?;
            left = Expr::Binary {
                op: BinaryOp::LogicalAnd,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Less,
                TokenKind::LtEq => BinaryOp::LessEqual,
                TokenKind::Gt => BinaryOp::Greater,
                TokenKind::GtEq => BinaryOp::GreaterEqual,
                TokenKind::EqEq => BinaryOp::Equal,
                TokenKind::NotEq => BinaryOp::NotEqual,
                TokenKind::In => BinaryOp::In,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // unary: ('!' | '-')* member -- stackable, applied right-to-left by recursion
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                if matches!(&operand, Expr::Literal(_, LiteralKind::Uint)) {
                    return Err(self.err("negative uint literal"));
                }
                Ok(Expr::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_member(),
        }
    }

    // member: primary ( '.' ident ('(' args ')')? | '[' expr ']' )*
    fn parse_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier()?;
                    if self.peek_kind() == &TokenKind::LParen {
                        let args = self.parse_arg_list()?;
                        let is_macro = is_macro_name(&field);
                        expr = Expr::Call {
                            target: Some(Box::new(expr)),
                            name: field,
                            args,
                            is_macro,
                        };
                    } else {
                        expr = Expr::Select {
                            operand: Some(Box::new(expr)),
                            field,
                            is_test: false,
                        };
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_conditional()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Index {
                        operand: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.peek_kind() != &TokenKind::RParen {
            loop {
                args.push(self.parse_conditional()?);
                if !self.consume_if(&TokenKind::Comma) {
                    break;
                }
                if self.peek_kind() == &TokenKind::RParen {
                    break; // trailing comma
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::IntLiteral(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(n), LiteralKind::Int))
            }
            TokenKind::UintLiteral(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Uint(n), LiteralKind::Uint))
            }
            TokenKind::DoubleLiteral(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Double(n), LiteralKind::Double))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::Literal(Value::string(s), LiteralKind::String))
            }
            TokenKind::BytesLiteral(b) => {
                self.advance();
                Ok(Expr::Literal(Value::bytes(b), LiteralKind::Bytes))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true), LiteralKind::Bool))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false), LiteralKind::Bool))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null, LiteralKind::Null))
            }
            TokenKind::Dot => {
                // Leading-dot-qualified identifier: `.foo` — treated as
                // `foo` (no package/namespace system; see DESIGN.md).
                self.advance();
                let name = self.expect_identifier()?;
                self.parse_identifier_primary(name)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                self.parse_identifier_primary(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_conditional()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_map_literal(),
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_identifier_primary(&mut self, name: String) -> Result<Expr, ParseError> {
        if self.peek_kind() == &TokenKind::LParen {
            let args = self.parse_arg_list()?;
            return Ok(Expr::Call {
                target: None,
                name,
                args,
                is_macro: false,
            });
        }
        if self.peek_kind() == &TokenKind::LBrace {
            return self.parse_struct_literal(name);
        }
        Ok(Expr::Identifier(name))
    }

    fn parse_list_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LBracket)?;
        let mut elems = Vec::new();
        if self.peek_kind() != &TokenKind::RBracket {
            loop {
                elems.push(self.parse_conditional()?);
                if !self.consume_if(&TokenKind::Comma) {
                    break;
                }
                if self.peek_kind() == &TokenKind::RBracket {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::List(elems))
    }

    fn parse_map_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut entries = Vec::new();
        if self.peek_kind() != &TokenKind::RBrace {
            loop {
                let key = self.parse_conditional()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_conditional()?;
                entries.push((key, value));
                if !self.consume_if(&TokenKind::Comma) {
                    break;
                }
                if self.peek_kind() == &TokenKind::RBrace {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Map(entries))
    }

    fn parse_struct_literal(&mut self, type_name: String) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        if self.peek_kind() != &TokenKind::RBrace {
            loop {
                let field = self.expect_identifier()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_conditional()?;
                fields.push((field, value));
                if !self.consume_if(&TokenKind::Comma) {
                    break;
                }
                if self.peek_kind() == &TokenKind::RBrace {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Struct {
            type_name: Some(type_name),
            fields,
        })
    }
}

/// Parse a complete CEL expression into an [`Expr`] AST.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr};

    fn parse_ok(src: &str) -> Expr {
        parse(src).unwrap_or_else(|e| panic!("failed to parse {src:?}: {e}"))
    }

    #[test]
    fn precedence_multiply_binds_tighter_than_add() {
        match parse_ok("2 + 3 * 4") {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Multiply, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        match parse_ok("(2 + 3) * 4") {
            Expr::Binary {
                op: BinaryOp::Multiply,
                left,
                ..
            } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn conditional_is_right_associative_with_ternary() {
        let expr = parse_ok("true ? 1 : false ? 2 : 3");
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn method_call_on_macro_name_is_flagged() {
        match parse_ok("[1,2].map(x, x)") {
            Expr::Call { is_macro, name, .. } => {
                assert!(is_macro);
                assert_eq!(name, "map");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn trailing_junk_is_a_parse_error() {
        assert!(parse("1 1").is_err());
    }

    #[test]
    fn reserved_word_identifier_is_a_parse_error() {
        assert!(parse("let + 1").is_err());
    }

    #[test]
    fn unmatched_paren_is_a_parse_error() {
        assert!(parse("(1 + 2").is_err());
    }
}
