//! Recursive-descent parser over the token stream produced by [`crate::lexer`].
//!
//! The source grammar is fully parenthesized for infix expressions
//! (`( a OP b )`), so no precedence-climbing table is needed: encountering
//! `(` always means "parse one infix expression", never a general grouping.

use foundry_core::value::Value;

use crate::ast::{Branch, Node, Operator, OtherKind, Scope, ScopeOptions};
use crate::error::ParseError;
use crate::lexer::lex;
use crate::token::{Token, TokenKind};

pub fn parse(script: &str) -> Result<Node, ParseError> {
    let tokens = lex(script)?;
    let mut p = Parser { tokens, pos: 0 };
    let scope = p.parse_lines_until_eof()?;
    Ok(Node::Scope(scope))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        let t = self.peek();
        ParseError::new(t.line, t.column, msg)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", kind, self.peek_kind())))
        }
    }

    fn expect_label(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Label(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    /// Top-level `lines` production: a sequence of `LINE` nodes up to EOF.
    fn parse_lines_until_eof(&mut self) -> Result<Scope, ParseError> {
        let children = self.parse_lines(&[TokenKind::Eof])?;
        Ok(Scope {
            options: ScopeOptions::default(),
            children,
        })
    }

    /// Parses lines until one of `terminators` is the current token (not
    /// consumed). Blank lines produce no node.
    fn parse_lines(&mut self, terminators: &[TokenKind]) -> Result<Vec<Node>, ParseError> {
        let mut lines = Vec::new();
        loop {
            if terminators.iter().any(|t| t == self.peek_kind()) {
                break;
            }
            if matches!(self.peek_kind(), TokenKind::Newline) {
                self.advance();
                continue;
            }
            let line_no = self.peek().line;
            let stmt = self.parse_statement()?;
            lines.push(Node::Line {
                line_no,
                child: Box::new(stmt),
            });
            // a statement is terminated by newline(s) or a terminator
            if terminators.iter().any(|t| t == self.peek_kind()) {
                continue;
            }
            if matches!(self.peek_kind(), TokenKind::Newline) {
                self.skip_newlines();
            } else if !terminators.iter().any(|t| t == self.peek_kind()) {
                return Err(self.err("expected end of line"));
            }
        }
        Ok(lines)
    }

    fn parse_statement(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            TokenKind::Colon => self.parse_jump_point(),
            TokenKind::Goto => self.parse_goto(),
            TokenKind::If => self.parse_ifelse(),
            TokenKind::While => self.parse_whiledo(),
            TokenKind::Begin => self.parse_block(),
            TokenKind::Continue => {
                self.advance();
                Ok(Node::Other(OtherKind::Continue))
            }
            TokenKind::Break => {
                self.advance();
                Ok(Node::Other(OtherKind::Break))
            }
            TokenKind::Pass => {
                self.advance();
                Ok(Node::Other(OtherKind::Pass))
            }
            _ => {
                let expr = self.parse_value_expression()?;
                if matches!(self.peek_kind(), TokenKind::Equals) {
                    self.assert_assignment_target(&expr)?;
                    self.advance();
                    let value = self.parse_value_expression()?;
                    Ok(Node::Assignment {
                        target: Box::new(expr),
                        value: Box::new(value),
                    })
                } else {
                    Ok(expr)
                }
            }
        }
    }

    fn assert_assignment_target(&self, node: &Node) -> Result<(), ParseError> {
        match node {
            Node::Variable { .. } => Ok(()),
            Node::ArrayMapItem { module, .. } if module.is_none() => Ok(()),
            Node::ArrayMapItem { .. } => {
                Err(self.err("assignment target subscript must not be module-qualified"))
            }
            _ => Err(self.err("invalid assignment target")),
        }
    }

    fn parse_jump_point(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::Colon)?;
        let label = self.expect_label()?;
        Ok(Node::JumpPoint { label })
    }

    fn parse_goto(&mut self) -> Result<Node, ParseError> {
        let line_no = self.peek().line;
        self.expect(TokenKind::Goto)?;
        let label = self.expect_label()?;
        Ok(Node::Goto { label, line_no })
    }

    fn parse_ifelse(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::If)?;
        let mut branches = Vec::new();
        let condition = self.parse_value_expression()?;
        self.expect(TokenKind::Then)?;
        self.skip_newlines();
        let expression = self.parse_statement()?;
        branches.push(Branch {
            condition: Some(condition),
            expression,
        });

        loop {
            self.skip_newlines_before_keyword();
            if matches!(self.peek_kind(), TokenKind::Elif) {
                self.advance();
                let condition = self.parse_value_expression()?;
                self.expect(TokenKind::Then)?;
                self.skip_newlines();
                let expression = self.parse_statement()?;
                branches.push(Branch {
                    condition: Some(condition),
                    expression,
                });
            } else {
                break;
            }
        }

        self.skip_newlines_before_keyword();
        if matches!(self.peek_kind(), TokenKind::Else) {
            self.advance();
            self.skip_newlines();
            let expression = self.parse_statement()?;
            branches.push(Branch {
                condition: None,
                expression,
            });
        }

        Ok(Node::IfElse(branches))
    }

    /// `elif`/`else` may appear on the next source line; peek past a single
    /// run of newlines without committing to consuming them if what follows
    /// isn't a continuation keyword.
    fn skip_newlines_before_keyword(&mut self) {
        let save = self.pos;
        self.skip_newlines();
        if !matches!(self.peek_kind(), TokenKind::Elif | TokenKind::Else) {
            self.pos = save;
        }
    }

    fn parse_whiledo(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::While)?;
        let condition = self.parse_value_expression()?;
        self.expect(TokenKind::Do)?;
        self.skip_newlines();
        let expression = self.parse_statement()?;
        Ok(Node::While {
            condition: Box::new(condition),
            expression: Box::new(expression),
        })
    }

    fn parse_block(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::Begin)?;
        self.expect(TokenKind::LParen)?;
        let options = self.parse_scope_options()?;
        self.expect(TokenKind::RParen)?;
        self.skip_newlines();
        let children = self.parse_lines(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        Ok(Node::Scope(Scope { options, children }))
    }

    fn parse_scope_options(&mut self) -> Result<ScopeOptions, ParseError> {
        let mut options = ScopeOptions::default();
        if matches!(self.peek_kind(), TokenKind::RParen) {
            return Ok(options);
        }
        loop {
            let key = self.expect_label()?;
            self.expect(TokenKind::Equals)?;
            let value = self.parse_constant_expression()?;
            match key.as_str() {
                "description" => options.description = Some(expect_str(&value, &key, self)?),
                "expected_time" => options.expected_time = Some(expect_seconds(&value, &key, self)?),
                "max_time" => options.max_time = Some(expect_seconds(&value, &key, self)?),
                other => return Err(self.err(format!("unknown scope option '{other}'"))),
            }
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(options)
    }

    fn parse_constant_expression(&mut self) -> Result<Value, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::True => {
                self.advance();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Value::Bool(false))
            }
            TokenKind::None_ => {
                self.advance();
                Ok(Value::None)
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Value::Int(i))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Value::Float(f))
            }
            TokenKind::TimeDelta(s) => {
                self.advance();
                Ok(Value::TimeDelta(s))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Value::Str(s))
            }
            other => Err(self.err(format!("expected constant, found {other:?}"))),
        }
    }

    /// `value_expression`: the grammar's general expression production, used
    /// everywhere except scope options and bare statement position.
    fn parse_value_expression(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::LParen => self.parse_infix(),
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_value_expression()?;
                Ok(Node::Infix {
                    operator: Operator::Not,
                    left: Box::new(operand),
                    right: Box::new(Node::Constant(Value::None)),
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::Constant(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::Constant(Value::Bool(false)))
            }
            TokenKind::None_ => {
                self.advance();
                Ok(Node::Constant(Value::None))
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Node::Constant(Value::Int(i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Node::Constant(Value::Float(f)))
            }
            TokenKind::TimeDelta(s) => {
                self.advance();
                Ok(Node::Constant(Value::TimeDelta(s)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Node::Constant(Value::Str(s)))
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Label(_) => self.parse_label_led_expression(),
            other => Err(self.err(format!("unexpected token {other:?} in expression"))),
        }
    }

    fn parse_infix(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen)?;
        let left = self.parse_value_expression()?;
        let operator = self.parse_operator()?;
        let right = self.parse_value_expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(Node::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_operator(&mut self) -> Result<Operator, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Caret => Operator::Pow,
            TokenKind::Star => Operator::Mul,
            TokenKind::Slash => Operator::Div,
            TokenKind::Percent => Operator::Mod,
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Sub,
            TokenKind::Amp => Operator::BitAnd,
            TokenKind::Pipe => Operator::BitOr,
            TokenKind::And => Operator::And,
            TokenKind::Or => Operator::Or,
            TokenKind::EqEq => Operator::Eq,
            TokenKind::NotEq => Operator::NotEq,
            TokenKind::Lte => Operator::Lte,
            TokenKind::Gte => Operator::Gte,
            TokenKind::Lt => Operator::Lt,
            TokenKind::Gt => Operator::Gt,
            TokenKind::Dot => Operator::Concat,
            other => return Err(self.err(format!("expected an infix operator, found {other:?}"))),
        };
        self.advance();
        Ok(op)
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBracket) {
            loop {
                items.push(self.parse_value_expression()?);
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Node::Array(items))
    }

    /// Labels lead into: `module.name`, a function call, an array/map
    /// subscript, or a bare variable — disambiguated by what follows.
    fn parse_label_led_expression(&mut self) -> Result<Node, ParseError> {
        let first = self.expect_label()?;
        let (module, name) = if matches!(self.peek_kind(), TokenKind::Dot) {
            self.advance();
            let name = self.expect_label()?;
            (Some(first), name)
        } else {
            (None, first)
        };

        match self.peek_kind() {
            TokenKind::LParen => {
                self.advance();
                let parameters = self.parse_parameter_map()?;
                self.expect(TokenKind::RParen)?;
                Ok(Node::Function {
                    module,
                    name,
                    parameters,
                })
            }
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_value_expression()?;
                self.expect(TokenKind::RBracket)?;
                Ok(Node::ArrayMapItem {
                    module,
                    name,
                    index: Box::new(index),
                })
            }
            _ => Ok(Node::Variable { module, name }),
        }
    }

    fn parse_parameter_map(&mut self) -> Result<Vec<(String, Node)>, ParseError> {
        let mut params = Vec::new();
        if matches!(self.peek_kind(), TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let key = self.expect_label()?;
            self.expect(TokenKind::Equals)?;
            let value = self.parse_value_expression()?;
            params.push((key, value));
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(params)
    }
}

fn expect_str(v: &Value, key: &str, p: &Parser) -> Result<String, ParseError> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(p.err(format!("scope option '{key}' must be a string"))),
    }
}

fn expect_seconds(v: &Value, key: &str, p: &Parser) -> Result<i64, ParseError> {
    match v {
        Value::TimeDelta(s) => Ok(*s),
        Value::Int(i) => Ok(*i),
        _ => Err(p.err(format!("scope option '{key}' must be a time or integer"))),
    }
}

/// Top-level `EXISTS` nodes are not produced by the grammar directly; they
/// wrap a subexpression and are constructed by callers that need
/// "does this resolve without NotDefinedError" semantics (see the builtin
/// catalogue and module registry lookups in `foundry-runtime`).
pub fn wrap_exists(node: Node) -> Node {
    Node::Exists(Box::new(node))
}
