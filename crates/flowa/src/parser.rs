//! Parser for Flowa.
//!
//! A Pratt parser handles expressions; a recursive-descent dispatcher handles
//! statements. Blocks come in two surface forms — `{ ... }` after a header,
//! or `:` followed by an indented suite — and both produce the same `Block`.
//!
//! Errors accumulate in a list and parsing continues best-effort, so a single
//! pass can surface several diagnostics.

use crate::{
    ast::{Block, Expr, IfArm, InfixOp, PostfixOp, PrefixOp, Program, Stmt},
    error::ParseError,
    lexer::Lexer,
    token::{Token, TokenKind},
};

/// Expression binding powers, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    /// `|>`
    Pipeline,
    /// `==`, `!=`
    Equals,
    /// `<`, `>`, `<=`, `>=`
    LessGreater,
    /// `+`, `-`
    Sum,
    /// `*`, `/`
    Product,
    /// Unary `-`, `!`
    Prefix,
    /// `f(...)`
    Call,
    /// `a.b`, `a[b]`
    Member,
    /// `++`, `--`
    Postfix,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Pipe => Precedence::Pipeline,
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash => Precedence::Product,
        TokenKind::Lparen => Precedence::Call,
        TokenKind::Dot | TokenKind::Lbracket => Precedence::Member,
        TokenKind::PlusPlus | TokenKind::MinusMinus => Precedence::Postfix,
        _ => Precedence::Lowest,
    }
}

/// Parses a source string into a `Program`, returning all diagnostics on
/// failure.
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

pub struct Parser {
    lexer: Lexer,
    cur: Token,
    peek: Token,
    pub errors: Vec<ParseError>,
}

/// Statement-internal parse failure; the message is already recorded.
struct Halt;

type PResult<T> = Result<T, Halt>;

impl Parser {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
        }
    }

    pub fn parse_program(&mut self) -> Program {
        let statements = self.parse_statements(&[]);
        Program { statements }
    }

    /// Parses statements until EOF or one of the `until` kinds is current.
    /// Stray layout tokens between statements are skipped.
    fn parse_statements(&mut self, until: &[TokenKind]) -> Vec<Stmt> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.cur.kind, TokenKind::Newline | TokenKind::Semicolon)
                || (until.is_empty() && self.cur.kind == TokenKind::Dedent)
            {
                self.advance();
            }
            if self.cur.kind == TokenKind::Eof || until.contains(&self.cur.kind) {
                return statements;
            }
            match self.parse_statement() {
                Ok(stmt) => {
                    let block_shaped = matches!(
                        stmt,
                        Stmt::Func { .. }
                            | Stmt::If { .. }
                            | Stmt::While { .. }
                            | Stmt::ForIn { .. }
                            | Stmt::ForC { .. }
                            | Stmt::Module { .. }
                            | Stmt::TypeDecl { .. }
                            | Stmt::Service { .. }
                    );
                    statements.push(stmt);
                    if !block_shaped && !self.at_statement_end(until) {
                        self.error_here(format!("expected end of statement, found `{}`", self.cur.describe()));
                        self.synchronize();
                    }
                }
                Err(Halt) => self.synchronize(),
            }
        }
    }

    fn at_statement_end(&self, until: &[TokenKind]) -> bool {
        matches!(
            self.cur.kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof | TokenKind::Dedent
        ) || until.contains(&self.cur.kind)
    }

    /// Skips ahead to a likely statement boundary after an error.
    fn synchronize(&mut self) {
        while !matches!(
            self.cur.kind,
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Rbrace | TokenKind::Eof
        ) {
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.cur.kind {
            TokenKind::Ident if self.peek.kind == TokenKind::Assign => self.parse_assignment(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::Func | TokenKind::Def => self.parse_func(false),
            TokenKind::Async => {
                self.advance();
                if !matches!(self.cur.kind, TokenKind::Func | TokenKind::Def) {
                    self.error_here("expected `func` or `def` after `async`");
                    return Err(Halt);
                }
                self.parse_func(true)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Module => self.parse_module(),
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_from_import(),
            TokenKind::Type => self.parse_type_decl(),
            TokenKind::Service => self.parse_service(),
            TokenKind::Defer => {
                self.advance();
                let expr = self.parse_expression(Precedence::Lowest)?;
                Ok(Stmt::Defer(expr))
            }
            TokenKind::Use => {
                self.error_here("`use` is only valid inside a service block");
                Err(Halt)
            }
            TokenKind::Illegal => {
                self.error_here(format!("illegal token `{}`", self.cur.literal));
                Err(Halt)
            }
            _ => {
                let expr = self.parse_expression(Precedence::Lowest)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_assignment(&mut self) -> PResult<Stmt> {
        let name = self.cur.literal.clone();
        self.advance(); // name
        self.advance(); // =
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Stmt::Assign { name, value })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        self.advance();
        if self.at_statement_end(&[TokenKind::Rbrace]) {
            return Ok(Stmt::Return(None));
        }
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Stmt::Return(Some(value)))
    }

    fn parse_func(&mut self, is_async: bool) -> PResult<Stmt> {
        self.advance(); // func / def
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::Lparen)?;
        let params = self.parse_param_list()?;
        let body = self.parse_block()?;
        Ok(Stmt::Func {
            name,
            params,
            body,
            is_async,
        })
    }

    fn parse_param_list(&mut self) -> PResult<Vec<String>> {
        let mut params = Vec::new();
        if self.cur.kind == TokenKind::Rparen {
            self.advance();
            return Ok(params);
        }
        loop {
            params.push(self.expect_ident("parameter name")?);
            match self.cur.kind {
                TokenKind::Comma => self.advance(),
                TokenKind::Rparen => {
                    self.advance();
                    return Ok(params);
                }
                _ => {
                    self.error_here(format!("expected `,` or `)` in parameters, found `{}`", self.cur.describe()));
                    return Err(Halt);
                }
            }
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.advance(); // if
        let condition = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        let mut arms = vec![IfArm { condition, body }];
        let mut or_else = None;

        loop {
            // A brace-style arm may leave a Newline before `elif`/`else`.
            if self.cur.kind == TokenKind::Newline
                && matches!(self.peek.kind, TokenKind::Elif | TokenKind::Else)
            {
                self.advance();
            }
            match self.cur.kind {
                TokenKind::Elif => {
                    self.advance();
                    let condition = self.parse_expression(Precedence::Lowest)?;
                    let body = self.parse_block()?;
                    arms.push(IfArm { condition, body });
                }
                TokenKind::Else => {
                    self.advance();
                    or_else = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If { arms, or_else })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.advance(); // while
        let condition = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    /// `for name in iterable: ...` or C-style `for (init; cond; post) { ... }`.
    fn parse_for(&mut self) -> PResult<Stmt> {
        self.advance(); // for
        if self.cur.kind == TokenKind::Lparen {
            return self.parse_for_c();
        }
        let var = self.expect_ident("loop variable")?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        Ok(Stmt::ForIn { var, iterable, body })
    }

    fn parse_for_c(&mut self) -> PResult<Stmt> {
        self.advance(); // (
        let init = if self.cur.kind == TokenKind::Semicolon {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.expect(TokenKind::Semicolon)?;
        let condition = if self.cur.kind == TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expression(Precedence::Lowest)?)
        };
        self.expect(TokenKind::Semicolon)?;
        let post = if self.cur.kind == TokenKind::Rparen {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.expect(TokenKind::Rparen)?;
        let body = self.parse_block()?;
        Ok(Stmt::ForC {
            init,
            condition,
            post,
            body,
        })
    }

    /// Assignment or expression statement, as allowed in C-style for headers.
    fn parse_simple_statement(&mut self) -> PResult<Stmt> {
        if self.cur.kind == TokenKind::Ident && self.peek.kind == TokenKind::Assign {
            self.parse_assignment()
        } else {
            let expr = self.parse_expression(Precedence::Lowest)?;
            Ok(Stmt::Expr(expr))
        }
    }

    fn parse_module(&mut self) -> PResult<Stmt> {
        self.advance(); // module
        let name = self.expect_ident("module name")?;
        let body = self.parse_block()?;
        Ok(Stmt::Module { name, body })
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        self.advance(); // import
        // `import {a, b} from "path"`
        if self.cur.kind == TokenKind::Lbrace {
            self.advance();
            let names = self.parse_name_list(TokenKind::Rbrace)?;
            self.expect(TokenKind::Rbrace)?;
            self.expect(TokenKind::From)?;
            let path = self.expect_string("import path")?;
            return Ok(Stmt::FromImport {
                path,
                names: Some(names),
            });
        }
        let path = self.expect_string("import path")?;
        Ok(Stmt::Import { path })
    }

    fn parse_from_import(&mut self) -> PResult<Stmt> {
        self.advance(); // from
        let path = self.expect_string("import path")?;
        self.expect(TokenKind::Import)?;
        if self.cur.kind == TokenKind::Star {
            self.advance();
            return Ok(Stmt::FromImport { path, names: None });
        }
        let mut names = vec![self.expect_ident("imported name")?];
        while self.cur.kind == TokenKind::Comma {
            self.advance();
            names.push(self.expect_ident("imported name")?);
        }
        Ok(Stmt::FromImport {
            path,
            names: Some(names),
        })
    }

    fn parse_name_list(&mut self, terminator: TokenKind) -> PResult<Vec<String>> {
        let mut names = Vec::new();
        if self.cur.kind == terminator {
            return Ok(names);
        }
        names.push(self.expect_ident("name")?);
        while self.cur.kind == TokenKind::Comma {
            self.advance();
            names.push(self.expect_ident("name")?);
        }
        Ok(names)
    }

    /// `type Name:` followed by one field per line. An optional `: annotation`
    /// after a field name is accepted and ignored.
    fn parse_type_decl(&mut self) -> PResult<Stmt> {
        self.advance(); // type
        let name = self.expect_ident("type name")?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut fields = Vec::new();
        loop {
            match self.cur.kind {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::Newline => self.advance(),
                TokenKind::Ident => {
                    fields.push(self.cur.literal.clone());
                    self.advance();
                    if self.cur.kind == TokenKind::Colon {
                        self.advance();
                        // Ignore the annotation token.
                        if self.cur.kind == TokenKind::Ident {
                            self.advance();
                        }
                    }
                }
                _ => {
                    self.error_here(format!("expected field name, found `{}`", self.cur.describe()));
                    return Err(Halt);
                }
            }
        }
        if fields.is_empty() {
            self.error_here(format!("type `{name}` declares no fields"));
            return Err(Halt);
        }
        Ok(Stmt::TypeDecl { name, fields })
    }

    /// `service Name on ":port":` with routes, `use` lines, and ordinary
    /// statements in its body.
    fn parse_service(&mut self) -> PResult<Stmt> {
        self.advance(); // service
        let name = self.expect_ident("service name")?;
        self.expect(TokenKind::On)?;
        let addr = self.expect_string("service address")?;
        let body = self.parse_service_block()?;
        Ok(Stmt::Service { name, addr, body })
    }

    fn parse_service_block(&mut self) -> PResult<Block> {
        let (terminator, single_line) = self.open_block()?;
        let mut body = Vec::new();
        if single_line {
            self.error_here("service body must be a block");
            return Err(Halt);
        }
        loop {
            while matches!(self.cur.kind, TokenKind::Newline | TokenKind::Semicolon) {
                self.advance();
            }
            if self.cur.kind == terminator {
                self.advance();
                return Ok(body);
            }
            if self.cur.kind == TokenKind::Eof {
                self.error_here("unterminated service block");
                return Err(Halt);
            }
            if self.cur.kind.is_http_method() && self.peek.kind == TokenKind::Str {
                body.push(self.parse_route()?);
            } else if self.cur.kind == TokenKind::Use {
                self.advance();
                let expr = self.parse_expression(Precedence::Lowest)?;
                body.push(Stmt::Use(expr));
            } else {
                body.push(self.parse_statement()?);
            }
        }
    }

    /// `METHOD "path" -> handler`
    fn parse_route(&mut self) -> PResult<Stmt> {
        let method = self.cur.literal.to_ascii_uppercase();
        self.advance();
        let path = self.expect_string("route path")?;
        self.expect(TokenKind::Arrow)?;
        let handler = self.parse_expression(Precedence::Lowest)?;
        Ok(Stmt::Route { method, path, handler })
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// Consumes a block header and returns `(terminator, single_line)`.
    ///
    /// For `{` the terminator is `Rbrace`; for `:` + newline it is `Dedent`
    /// after consuming `Indent`. A `:` followed by anything else introduces a
    /// single-line suite.
    fn open_block(&mut self) -> PResult<(TokenKind, bool)> {
        match self.cur.kind {
            TokenKind::Lbrace => {
                self.advance();
                Ok((TokenKind::Rbrace, false))
            }
            TokenKind::Colon => {
                self.advance();
                if self.cur.kind == TokenKind::Newline {
                    self.advance();
                    self.expect(TokenKind::Indent)?;
                    Ok((TokenKind::Dedent, false))
                } else {
                    Ok((TokenKind::Newline, true))
                }
            }
            _ => {
                self.error_here(format!("expected `:` or `{{` to open a block, found `{}`", self.cur.describe()));
                Err(Halt)
            }
        }
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let (terminator, single_line) = self.open_block()?;
        if single_line {
            // `while x < 5: x = x + 1` — statements up to the newline.
            let mut body = vec![self.parse_statement()?];
            while self.cur.kind == TokenKind::Semicolon {
                self.advance();
                if self.at_statement_end(&[]) {
                    break;
                }
                body.push(self.parse_statement()?);
            }
            return Ok(body);
        }
        let body = self.parse_statements(&[terminator]);
        if self.cur.kind == terminator {
            self.advance();
        } else {
            self.error_here(format!("unterminated block, found `{}`", self.cur.describe()));
            return Err(Halt);
        }
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Expressions (Pratt)
    // ------------------------------------------------------------------

    fn parse_expression(&mut self, min_prec: Precedence) -> PResult<Expr> {
        let mut left = self.parse_prefix()?;
        while min_prec < precedence_of(self.cur.kind) {
            left = match self.cur.kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq => self.parse_infix(left)?,
                TokenKind::Pipe => self.parse_pipeline(left)?,
                TokenKind::Lparen => self.parse_call(left)?,
                TokenKind::Lbracket => self.parse_index(left)?,
                TokenKind::Dot => self.parse_member(left)?,
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.cur.kind == TokenKind::PlusPlus {
                        PostfixOp::Inc
                    } else {
                        PostfixOp::Dec
                    };
                    self.advance();
                    Expr::Postfix {
                        op,
                        operand: Box::new(left),
                    }
                }
                _ => return Ok(left),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        let tok = self.cur.clone();
        match tok.kind {
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Ident(tok.literal))
            }
            TokenKind::Int => {
                self.advance();
                match tok.literal.parse::<i64>() {
                    Ok(n) => Ok(Expr::Int(n)),
                    Err(_) => {
                        self.error_at(tok.line, format!("integer literal `{}` out of range", tok.literal));
                        Err(Halt)
                    }
                }
            }
            TokenKind::Float => {
                self.advance();
                match tok.literal.parse::<f64>() {
                    Ok(n) => Ok(Expr::Float(n)),
                    Err(_) => {
                        self.error_at(tok.line, format!("invalid float literal `{}`", tok.literal));
                        Err(Halt)
                    }
                }
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Str(tok.literal))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Bang => {
                self.advance();
                let right = self.parse_expression(Precedence::Prefix)?;
                Ok(Expr::Prefix {
                    op: PrefixOp::Not,
                    right: Box::new(right),
                })
            }
            TokenKind::Minus => {
                self.advance();
                let right = self.parse_expression(Precedence::Prefix)?;
                Ok(Expr::Prefix {
                    op: PrefixOp::Neg,
                    right: Box::new(right),
                })
            }
            TokenKind::Lparen => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.expect(TokenKind::Rparen)?;
                Ok(inner)
            }
            TokenKind::Lbracket => self.parse_array(),
            TokenKind::Lbrace => self.parse_map(),
            TokenKind::Spawn => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                Ok(Expr::Spawn(Box::new(inner)))
            }
            TokenKind::Await => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                Ok(Expr::Await(Box::new(inner)))
            }
            TokenKind::Illegal => {
                self.error_at(tok.line, format!("illegal token `{}`", tok.literal));
                Err(Halt)
            }
            _ => {
                self.error_at(tok.line, format!("unexpected `{}` in expression", tok.describe()));
                Err(Halt)
            }
        }
    }

    fn parse_infix(&mut self, left: Expr) -> PResult<Expr> {
        let op = match self.cur.kind {
            TokenKind::Plus => InfixOp::Add,
            TokenKind::Minus => InfixOp::Sub,
            TokenKind::Star => InfixOp::Mul,
            TokenKind::Slash => InfixOp::Div,
            TokenKind::Eq => InfixOp::Eq,
            TokenKind::NotEq => InfixOp::NotEq,
            TokenKind::Lt => InfixOp::Lt,
            TokenKind::Gt => InfixOp::Gt,
            TokenKind::LtEq => InfixOp::LtEq,
            TokenKind::GtEq => InfixOp::GtEq,
            _ => unreachable!("parse_infix called on non-infix token"),
        };
        let prec = precedence_of(self.cur.kind);
        self.advance();
        let right = self.parse_expression(prec)?;
        Ok(Expr::Infix {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// `a |> f(b, c)` becomes `f(a, b, c)`; `a |> f` becomes `f(a)`.
    /// Left association falls out of the Pratt loop.
    fn parse_pipeline(&mut self, left: Expr) -> PResult<Expr> {
        let line = self.cur.line;
        self.advance(); // |>
        let stage = self.parse_expression(Precedence::Pipeline)?;
        match stage {
            Expr::Call { callee, mut args } => {
                args.insert(0, left);
                Ok(Expr::Call { callee, args })
            }
            target @ (Expr::Ident(_) | Expr::Member { .. }) => Ok(Expr::Call {
                callee: Box::new(target),
                args: vec![left],
            }),
            _ => {
                self.error_at(line, "right side of `|>` must be a call or a function name");
                Err(Halt)
            }
        }
    }

    fn parse_call(&mut self, callee: Expr) -> PResult<Expr> {
        self.advance(); // (
        let mut args = Vec::new();
        if self.cur.kind == TokenKind::Rparen {
            self.advance();
            return Ok(Expr::Call {
                callee: Box::new(callee),
                args,
            });
        }
        loop {
            args.push(self.parse_expression(Precedence::Lowest)?);
            match self.cur.kind {
                TokenKind::Comma => self.advance(),
                TokenKind::Rparen => {
                    self.advance();
                    return Ok(Expr::Call {
                        callee: Box::new(callee),
                        args,
                    });
                }
                _ => {
                    self.error_here(format!("expected `,` or `)` in arguments, found `{}`", self.cur.describe()));
                    return Err(Halt);
                }
            }
        }
    }

    fn parse_index(&mut self, left: Expr) -> PResult<Expr> {
        self.advance(); // [
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::Rbracket)?;
        Ok(Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    /// Member access. Keywords are allowed as member names so `http.get` and
    /// `http.post` parse naturally.
    fn parse_member(&mut self, object: Expr) -> PResult<Expr> {
        self.advance(); // .
        let name = match self.cur.kind {
            TokenKind::Ident => self.cur.literal.clone(),
            kind if TokenKind::keyword(&self.cur.literal) == Some(kind) && !self.cur.literal.is_empty() => {
                self.cur.literal.clone()
            }
            _ => {
                self.error_here(format!("expected member name after `.`, found `{}`", self.cur.describe()));
                return Err(Halt);
            }
        };
        self.advance();
        Ok(Expr::Member {
            object: Box::new(object),
            name,
        })
    }

    fn parse_array(&mut self) -> PResult<Expr> {
        self.advance(); // [
        let mut elements = Vec::new();
        if self.cur.kind == TokenKind::Rbracket {
            self.advance();
            return Ok(Expr::Array(elements));
        }
        loop {
            elements.push(self.parse_expression(Precedence::Lowest)?);
            match self.cur.kind {
                TokenKind::Comma => self.advance(),
                TokenKind::Rbracket => {
                    self.advance();
                    return Ok(Expr::Array(elements));
                }
                _ => {
                    self.error_here(format!("expected `,` or `]` in array, found `{}`", self.cur.describe()));
                    return Err(Halt);
                }
            }
        }
    }

    /// `{k: v, ...}`. Layout tokens inside the braces are ignored so short
    /// multi-line literals parse.
    fn parse_map(&mut self) -> PResult<Expr> {
        self.advance(); // {
        let mut pairs = Vec::new();
        loop {
            self.skip_layout();
            if self.cur.kind == TokenKind::Rbrace {
                self.advance();
                return Ok(Expr::Map(pairs));
            }
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect(TokenKind::Colon)?;
            self.skip_layout();
            let value = self.parse_expression(Precedence::Lowest)?;
            self.skip_layout();
            match self.cur.kind {
                TokenKind::Comma => {
                    self.advance();
                    pairs.push((key, value));
                }
                TokenKind::Rbrace => {
                    pairs.push((key, value));
                    self.advance();
                    return Ok(Expr::Map(pairs));
                }
                _ => {
                    self.error_here(format!("expected `,` or `}}` in map, found `{}`", self.cur.describe()));
                    return Err(Halt);
                }
            }
        }
    }

    fn skip_layout(&mut self) {
        while matches!(
            self.cur.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
        ) {
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn advance(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<()> {
        if self.cur.kind == kind {
            self.advance();
            Ok(())
        } else {
            let expected: &str = kind.into();
            self.error_here(format!("expected `{expected}`, found `{}`", self.cur.describe()));
            Err(Halt)
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<String> {
        if self.cur.kind == TokenKind::Ident {
            let name = self.cur.literal.clone();
            self.advance();
            Ok(name)
        } else {
            self.error_here(format!("expected {what}, found `{}`", self.cur.describe()));
            Err(Halt)
        }
    }

    fn expect_string(&mut self, what: &str) -> PResult<String> {
        if self.cur.kind == TokenKind::Str {
            let text = self.cur.literal.clone();
            self.advance();
            Ok(text)
        } else {
            self.error_here(format!("expected {what} string, found `{}`", self.cur.describe()));
            Err(Halt)
        }
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let line = self.cur.line;
        self.errors.push(ParseError::new(message, line));
    }

    fn error_at(&mut self, line: u32, message: impl Into<String>) {
        self.errors.push(ParseError::new(message, line));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_ok(source: &str) -> Program {
        match parse(source) {
            Ok(program) => program,
            Err(errors) => panic!("parse failed: {errors:?}"),
        }
    }

    fn single_expr(source: &str) -> Expr {
        let program = parse_ok(source);
        assert_eq!(program.statements.len(), 1, "expected one statement");
        match program.statements.into_iter().next().unwrap() {
            Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let expr = single_expr("1 + 2 * 3");
        assert_eq!(
            expr,
            Expr::Infix {
                left: Box::new(Expr::Int(1)),
                op: InfixOp::Add,
                right: Box::new(Expr::Infix {
                    left: Box::new(Expr::Int(2)),
                    op: InfixOp::Mul,
                    right: Box::new(Expr::Int(3)),
                }),
            }
        );
    }

    #[test]
    fn test_comparison_precedence() {
        // `a + b < c * d` groups as `(a + b) < (c * d)`
        let expr = single_expr("a + b < c * d");
        match expr {
            Expr::Infix { op: InfixOp::Lt, left, right } => {
                assert!(matches!(*left, Expr::Infix { op: InfixOp::Add, .. }));
                assert!(matches!(*right, Expr::Infix { op: InfixOp::Mul, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_rewrites_to_call() {
        let expr = single_expr("x |> add(10)");
        assert_eq!(
            expr,
            Expr::Call {
                callee: Box::new(Expr::Ident("add".into())),
                args: vec![Expr::Ident("x".into()), Expr::Int(10)],
            }
        );
    }

    #[test]
    fn test_pipeline_left_association() {
        // a |> b |> c  ==  c(b(a))
        let expr = single_expr("a |> b |> c");
        assert_eq!(
            expr,
            Expr::Call {
                callee: Box::new(Expr::Ident("c".into())),
                args: vec![Expr::Call {
                    callee: Box::new(Expr::Ident("b".into())),
                    args: vec![Expr::Ident("a".into())],
                }],
            }
        );
    }

    #[test]
    fn test_pipeline_into_bare_name() {
        let expr = single_expr("5 |> double");
        assert_eq!(
            expr,
            Expr::Call {
                callee: Box::new(Expr::Ident("double".into())),
                args: vec![Expr::Int(5)],
            }
        );
    }

    #[test]
    fn test_member_and_index() {
        let expr = single_expr("a.b[0]");
        assert_eq!(
            expr,
            Expr::Index {
                left: Box::new(Expr::Member {
                    object: Box::new(Expr::Ident("a".into())),
                    name: "b".into(),
                }),
                index: Box::new(Expr::Int(0)),
            }
        );
    }

    #[test]
    fn test_member_with_keyword_name() {
        let expr = single_expr("http.get(url)");
        match expr {
            Expr::Call { callee, args } => {
                assert_eq!(
                    *callee,
                    Expr::Member {
                        object: Box::new(Expr::Ident("http".into())),
                        name: "get".into(),
                    }
                );
                assert_eq!(args, vec![Expr::Ident("url".into())]);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_postfix_binds_tightest() {
        let expr = single_expr("i++");
        assert_eq!(
            expr,
            Expr::Postfix {
                op: PostfixOp::Inc,
                operand: Box::new(Expr::Ident("i".into())),
            }
        );
    }

    #[test]
    fn test_brace_function_body() {
        let program = parse_ok("func add(a, b) { return a + b }");
        match &program.statements[0] {
            Stmt::Func { name, params, body, is_async } => {
                assert_eq!(name, "add");
                assert_eq!(params, &["a".to_string(), "b".to_string()]);
                assert_eq!(body.len(), 1);
                assert!(!is_async);
                assert!(matches!(body[0], Stmt::Return(Some(_))));
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn test_indented_function_body() {
        let program = parse_ok("def add(a, b):\n    return a + b\n");
        match &program.statements[0] {
            Stmt::Func { name, body, .. } => {
                assert_eq!(name, "add");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn test_single_line_while_suite() {
        let program = parse_ok("x = 0\nwhile x < 5: x = x + 1\n");
        assert_eq!(program.statements.len(), 2);
        match &program.statements[1] {
            Stmt::While { body, .. } => assert_eq!(body.len(), 1),
            other => panic!("expected while, got {other:?}"),
        }
    }

    #[test]
    fn test_if_elif_else() {
        let source = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        let program = parse_ok(source);
        match &program.statements[0] {
            Stmt::If { arms, or_else } => {
                assert_eq!(arms.len(), 2);
                assert!(or_else.is_some());
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn test_for_in_and_c_style() {
        let program = parse_ok("for x in nums:\n    print(x)\nfor (i = 0; i < 10; i++) { print(i) }\n");
        assert!(matches!(program.statements[0], Stmt::ForIn { .. }));
        match &program.statements[1] {
            Stmt::ForC { init, condition, post, .. } => {
                assert!(init.is_some());
                assert!(condition.is_some());
                assert!(post.is_some());
            }
            other => panic!("expected c-style for, got {other:?}"),
        }
    }

    #[test]
    fn test_import_forms() {
        let program = parse_ok(
            "import \"lib.flowa\"\nfrom \"lib.flowa\" import a, b\nfrom \"lib.flowa\" import *\nimport {c, d} from \"lib.flowa\"\n",
        );
        assert_eq!(
            program.statements[0],
            Stmt::Import {
                path: "lib.flowa".into()
            }
        );
        assert_eq!(
            program.statements[1],
            Stmt::FromImport {
                path: "lib.flowa".into(),
                names: Some(vec!["a".into(), "b".into()]),
            }
        );
        assert_eq!(
            program.statements[2],
            Stmt::FromImport {
                path: "lib.flowa".into(),
                names: None,
            }
        );
        assert_eq!(
            program.statements[3],
            Stmt::FromImport {
                path: "lib.flowa".into(),
                names: Some(vec!["c".into(), "d".into()]),
            }
        );
    }

    #[test]
    fn test_type_declaration() {
        let program = parse_ok("type User:\n    name\n    email\n");
        assert_eq!(
            program.statements[0],
            Stmt::TypeDecl {
                name: "User".into(),
                fields: vec!["name".into(), "email".into()],
            }
        );
    }

    #[test]
    fn test_service_block() {
        let source = "service Api on \":8080\":\n    use logger\n    get \"/users\" -> list_users\n    post \"/users\" -> create_user\n";
        let program = parse_ok(source);
        match &program.statements[0] {
            Stmt::Service { name, addr, body } => {
                assert_eq!(name, "Api");
                assert_eq!(addr, ":8080");
                assert_eq!(body.len(), 3);
                assert!(matches!(body[0], Stmt::Use(_)));
                assert!(matches!(
                    &body[1],
                    Stmt::Route { method, path, .. } if method == "GET" && path == "/users"
                ));
                assert!(matches!(
                    &body[2],
                    Stmt::Route { method, .. } if method == "POST"
                ));
            }
            other => panic!("expected service, got {other:?}"),
        }
    }

    #[test]
    fn test_spawn_await_and_defer() {
        let program = parse_ok("t = spawn work()\nr = await t\ndefer cleanup()\n");
        assert!(matches!(
            &program.statements[0],
            Stmt::Assign { value: Expr::Spawn(_), .. }
        ));
        assert!(matches!(
            &program.statements[1],
            Stmt::Assign { value: Expr::Await(_), .. }
        ));
        assert!(matches!(&program.statements[2], Stmt::Defer(_)));
    }

    #[test]
    fn test_map_literal() {
        let expr = single_expr("{\"a\": 1, \"b\": 2}");
        assert_eq!(
            expr,
            Expr::Map(vec![
                (Expr::Str("a".into()), Expr::Int(1)),
                (Expr::Str("b".into()), Expr::Int(2)),
            ])
        );
    }

    #[test]
    fn test_errors_accumulate() {
        let mut parser = Parser::new("x = \ny = 1\nz ==\n");
        let program = parser.parse_program();
        assert!(parser.errors.len() >= 2, "errors: {:?}", parser.errors);
        // Parsing continued past the first error.
        assert!(program
            .statements
            .iter()
            .any(|s| matches!(s, Stmt::Assign { name, .. } if name == "y")));
    }

    #[test]
    fn test_grouped_expression() {
        let expr = single_expr("(1 + 2) * 3");
        assert!(matches!(
            expr,
            Expr::Infix { op: InfixOp::Mul, .. }
        ));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(
            single_expr("-5"),
            Expr::Prefix {
                op: PrefixOp::Neg,
                right: Box::new(Expr::Int(5)),
            }
        );
        assert_eq!(
            single_expr("!ok"),
            Expr::Prefix {
                op: PrefixOp::Not,
                right: Box::new(Expr::Ident("ok".into())),
            }
        );
    }
}
