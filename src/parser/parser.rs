use std::io::{self, BufRead};

use tracing::{debug, info};

use crate::error::{Diagnostic, SyntaxError};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::listing::Listing;

use super::{BinOpKind, CompoundStmt, Declaration, Expr, ExprKind, FunDecl, Program, Stmt, Type, VarDecl};

/// Statements and expressions nested deeper than this are rejected. Every
/// folded `+ - * /` also counts as one level.
pub const MAX_DEPTH: usize = 256;

/// Recursive-descent parser with one token of lookahead.
///
/// Errors are reported to the listing and parsing carries on: a strict
/// `expect` leaves the offending token in place for the caller, while the
/// statement and factor dispatchers drop it so recovery always makes progress.
pub struct Parser<'l, R> {
    lexer: Lexer<R>,
    token: Token,
    listing: &'l mut Listing,
    depth: usize,
    too_deep: bool,
    /// The current token has already been reported.
    reported: bool,
}

impl<'l, R: BufRead> Parser<'l, R> {
    pub fn new(reader: R, listing: &'l mut Listing) -> Self {
        let mut lexer = Lexer::new(reader);
        let token = lexer.next_token(listing);
        Self {
            lexer,
            token,
            listing,
            depth: 0,
            too_deep: false,
            reported: false,
        }
    }

    /// Parses the whole input. The tree may be partial if errors were
    /// reported.
    pub fn parse(&mut self) -> Program {
        let program = self.parse_program();
        info!(
            declarations = program.0.len(),
            lines = self.lexer.lineno(),
            "parsed program"
        );
        program
    }

    /// The read failure that cut the source short, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.lexer.take_io_error()
    }

    fn advance(&mut self) {
        let at_eof = self.token.kind == TokenKind::EndFile;
        self.token = self.lexer.next_token(self.listing);
        if !at_eof {
            self.reported = false;
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.token.kind != kind {
            return false;
        }
        self.advance();
        true
    }

    /// Consumes `kind` or reports the current token without consuming it.
    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.consume(kind) {
            return true;
        }
        self.report_unexpected();
        false
    }

    fn expect_ident(&mut self) -> Option<String> {
        if self.token.kind != TokenKind::Ident {
            self.report_token(SyntaxError::ExpectedIdent(self.token.to_string()));
            return None;
        }
        let name = std::mem::take(&mut self.token.lexeme);
        self.advance();
        Some(name)
    }

    fn report_unexpected(&mut self) {
        if self.token.kind == TokenKind::Error {
            if self.reported {
                return;
            }
            self.reported = true;
            let diagnostic = Diagnostic::Lexical {
                line: self.token.line,
                lexeme: self.token.lexeme.clone(),
            };
            self.listing.report(diagnostic);
        } else {
            self.report_token(SyntaxError::UnexpectedToken(self.token.to_string()));
        }
    }

    /// Reports a syntax error at the current token, at most once per token.
    fn report_token(&mut self, kind: SyntaxError) {
        if self.reported {
            return;
        }
        self.reported = true;
        self.syntax_error(kind);
    }

    fn syntax_error(&mut self, kind: SyntaxError) {
        self.syntax_error_at(self.token.line, kind);
    }

    fn syntax_error_at(&mut self, line: usize, kind: SyntaxError) {
        debug!(line, error = %kind, "syntax error");
        self.listing.report(Diagnostic::Syntax { line, kind });
    }

    fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            if !self.too_deep {
                self.too_deep = true;
                self.syntax_error(SyntaxError::NestingTooDeep);
            }
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn is_type_specifier(&self) -> bool {
        matches!(self.token.kind, TokenKind::Int | TokenKind::Void)
    }

    fn skip_to_declaration(&mut self) {
        while !self.is_type_specifier() && self.token.kind != TokenKind::EndFile {
            self.advance();
        }
    }

    /// program = declaration*
    fn parse_program(&mut self) -> Program {
        let mut declarations = vec![];

        while self.token.kind != TokenKind::EndFile {
            if !self.is_type_specifier() {
                if self.token.kind == TokenKind::Error {
                    self.report_unexpected();
                } else {
                    self.report_token(SyntaxError::ExpectedDeclaration(self.token.to_string()));
                }
                self.advance();
                self.skip_to_declaration();
                continue;
            }
            match self.parse_declaration() {
                Some(d) => declarations.push(d),
                None => self.skip_to_declaration(),
            }
        }

        Program(declarations)
    }

    fn parse_type_specifier(&mut self) -> Option<Type> {
        let ty = match self.token.kind {
            TokenKind::Int => Type::Int,
            TokenKind::Void => Type::Void,
            _ => return None,
        };
        self.advance();
        Some(ty)
    }

    /// declaration = type-spec ident ";"
    ///             | type-spec ident "(" params ")" compound-stmt
    fn parse_declaration(&mut self) -> Option<Declaration> {
        let line = self.token.line;
        let ty = self.parse_type_specifier()?;
        let name = self.expect_ident()?;

        match self.token.kind {
            TokenKind::SemiColon => {
                self.advance();
                Some(Declaration::Var(VarDecl { name, ty, line }))
            }
            TokenKind::OpenParen => {
                self.advance();
                let params = self.parse_params();
                self.expect(TokenKind::CloseParen);
                let body = self.parse_compound_stmt();
                Some(Declaration::Fun(FunDecl {
                    name,
                    return_ty: ty,
                    params,
                    body,
                    line,
                }))
            }
            _ => {
                self.report_unexpected();
                None
            }
        }
    }

    /// var-decl = type-spec ident ";"
    fn parse_var_declaration(&mut self) -> Option<VarDecl> {
        let line = self.token.line;
        let ty = self.parse_type_specifier()?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::SemiColon);
        Some(VarDecl { name, ty, line })
    }

    /// params = "void" | param ("," param)*
    fn parse_params(&mut self) -> Vec<VarDecl> {
        if self.consume(TokenKind::Void) {
            return vec![];
        }

        let mut params = vec![];
        params.extend(self.parse_param());
        while self.consume(TokenKind::Comma) {
            params.extend(self.parse_param());
        }
        params
    }

    /// param = "int" ident
    fn parse_param(&mut self) -> Option<VarDecl> {
        let line = self.token.line;
        if !self.consume(TokenKind::Int) {
            self.report_token(SyntaxError::ExpectedParamType(self.token.to_string()));
            return None;
        }
        let name = self.expect_ident()?;
        Some(VarDecl {
            name,
            ty: Type::Int,
            line,
        })
    }

    /// compound-stmt = "{" var-decl* statement* "}"
    fn parse_compound_stmt(&mut self) -> CompoundStmt {
        let line = self.token.line;
        self.expect(TokenKind::OpenCurlyBrace);

        let mut locals = vec![];
        while self.is_type_specifier() {
            locals.extend(self.parse_var_declaration());
        }

        let mut stmts = vec![];
        while !matches!(
            self.token.kind,
            TokenKind::CloseCurlyBrace | TokenKind::EndFile
        ) {
            match self.parse_stmt() {
                Some(Stmt::Empty) | None => (),
                Some(s) => stmts.push(s),
            }
        }
        self.expect(TokenKind::CloseCurlyBrace);

        CompoundStmt {
            locals,
            stmts,
            line,
        }
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        if !self.enter() {
            self.advance();
            return None;
        }
        let stmt = self.parse_stmt_inner();
        self.leave();
        stmt
    }

    /// stmt = "if" "(" expression ")" stmt ("else" stmt)?
    ///      | "while" "(" expression ")" stmt
    ///      | "return" expression? ";"
    ///      | compound-stmt
    ///      | expression? ";"
    fn parse_stmt_inner(&mut self) -> Option<Stmt> {
        match self.token.kind {
            TokenKind::If => Some(self.parse_if()),
            TokenKind::While => Some(self.parse_while()),
            TokenKind::Return => Some(self.parse_return()),
            TokenKind::OpenCurlyBrace => Some(Stmt::Compound(self.parse_compound_stmt())),
            TokenKind::SemiColon => {
                self.advance();
                Some(Stmt::Empty)
            }
            TokenKind::Ident | TokenKind::Num | TokenKind::OpenParen => {
                let expr = self.parse_expression();
                self.expect(TokenKind::SemiColon);
                Some(Stmt::Expr(expr))
            }
            _ => {
                self.report_unexpected();
                self.advance();
                None
            }
        }
    }

    fn parse_body(&mut self) -> Box<Stmt> {
        Box::new(self.parse_stmt().unwrap_or(Stmt::Empty))
    }

    fn parse_if(&mut self) -> Stmt {
        let line = self.token.line;
        self.advance();
        self.expect(TokenKind::OpenParen);
        let cond = self.parse_expression();
        self.expect(TokenKind::CloseParen);
        let then = self.parse_body();
        let otherwise = if self.consume(TokenKind::Else) {
            Some(self.parse_body())
        } else {
            None
        };
        Stmt::If {
            cond,
            then,
            otherwise,
            line,
        }
    }

    fn parse_while(&mut self) -> Stmt {
        let line = self.token.line;
        self.advance();
        self.expect(TokenKind::OpenParen);
        let cond = self.parse_expression();
        self.expect(TokenKind::CloseParen);
        let body = self.parse_body();
        Stmt::While { cond, body, line }
    }

    fn parse_return(&mut self) -> Stmt {
        let line = self.token.line;
        self.advance();
        let value = if self.consume(TokenKind::SemiColon) {
            None
        } else {
            let expr = self.parse_expression();
            self.expect(TokenKind::SemiColon);
            Some(expr)
        };
        Stmt::Return { value, line }
    }

    fn parse_expression(&mut self) -> Expr {
        let line = self.token.line;
        if !self.enter() {
            self.advance();
            return Expr::new(ExprKind::Error, line);
        }
        let expr = self.parse_assign();
        self.leave();
        expr
    }

    /// expression = simple-expr ("=" expression)?
    ///
    /// Only a bare identifier may be assigned to. Any other target is
    /// reported, the right-hand side is parsed and dropped, and the target
    /// stands as the result.
    fn parse_assign(&mut self) -> Expr {
        let target = self.parse_simple_expression();
        if self.token.kind != TokenKind::Equal {
            return target;
        }

        let line = self.token.line;
        self.advance();
        let value = self.parse_expression();

        match target.kind {
            ExprKind::Id(_) => Expr::new(ExprKind::Assign(Box::new(target), Box::new(value)), line),
            ExprKind::Error => target,
            _ => {
                self.syntax_error_at(line, SyntaxError::AssignToNonVariable);
                target
            }
        }
    }

    fn relop(&self) -> Option<BinOpKind> {
        let op = match self.token.kind {
            TokenKind::LessThan => BinOpKind::LessThan,
            TokenKind::LessEqual => BinOpKind::LessEqual,
            TokenKind::GreaterThan => BinOpKind::GreaterThan,
            TokenKind::GreaterEqual => BinOpKind::GreaterEqual,
            TokenKind::DoubleEqual => BinOpKind::Equal,
            TokenKind::NotEqual => BinOpKind::NotEqual,
            _ => return None,
        };
        Some(op)
    }

    /// simple-expr = additive (relop additive)?
    fn parse_simple_expression(&mut self) -> Expr {
        let left = self.parse_additive();
        let Some(op) = self.relop() else {
            return left;
        };

        let line = self.token.line;
        self.advance();
        let right = self.parse_additive();
        Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), line)
    }

    /// additive = term (("+" | "-") term)*
    fn parse_additive(&mut self) -> Expr {
        let mut expr = self.parse_term();
        let mut folds = 0;

        loop {
            let op = match self.token.kind {
                TokenKind::Plus => BinOpKind::Add,
                TokenKind::Minus => BinOpKind::Sub,
                _ => break,
            };
            let line = self.token.line;
            self.advance();
            let deeper = self.enter();
            let right = self.parse_term();
            expr = if deeper {
                folds += 1;
                Expr::new(ExprKind::Binary(op, Box::new(expr), Box::new(right)), line)
            } else {
                Expr::new(ExprKind::Error, line)
            };
        }

        self.depth -= folds;
        expr
    }

    /// term = factor (("*" | "/") factor)*
    fn parse_term(&mut self) -> Expr {
        let mut expr = self.parse_factor();
        let mut folds = 0;

        loop {
            let op = match self.token.kind {
                TokenKind::Star => BinOpKind::Mul,
                TokenKind::Slash => BinOpKind::Div,
                _ => break,
            };
            let line = self.token.line;
            self.advance();
            let deeper = self.enter();
            let right = self.parse_factor();
            expr = if deeper {
                folds += 1;
                Expr::new(ExprKind::Binary(op, Box::new(expr), Box::new(right)), line)
            } else {
                Expr::new(ExprKind::Error, line)
            };
        }

        self.depth -= folds;
        expr
    }

    /// factor = "(" expression ")"
    ///        | ident ("(" args ")")?
    ///        | num
    fn parse_factor(&mut self) -> Expr {
        let line = self.token.line;
        match self.token.kind {
            TokenKind::Num => {
                let lexeme = std::mem::take(&mut self.token.lexeme);
                self.advance();
                match lexeme.parse::<i32>() {
                    Ok(value) => Expr::new(ExprKind::Const(value), line),
                    Err(_) => {
                        self.syntax_error_at(line, SyntaxError::NumberOutOfRange(lexeme));
                        Expr::new(ExprKind::Error, line)
                    }
                }
            }
            TokenKind::Ident => {
                let name = std::mem::take(&mut self.token.lexeme);
                self.advance();
                if self.consume(TokenKind::OpenParen) {
                    let args = self.parse_args();
                    self.expect(TokenKind::CloseParen);
                    Expr::new(ExprKind::Call(name, args), line)
                } else {
                    Expr::new(ExprKind::Id(name), line)
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                let expr = self.parse_expression();
                self.expect(TokenKind::CloseParen);
                expr
            }
            _ => {
                self.report_unexpected();
                self.advance();
                Expr::new(ExprKind::Error, line)
            }
        }
    }

    /// args = (expression ("," expression)*)?
    fn parse_args(&mut self) -> Vec<Expr> {
        if self.token.kind == TokenKind::CloseParen {
            return vec![];
        }

        let mut args = vec![self.parse_expression()];
        while self.consume(TokenKind::Comma) {
            args.push(self.parse_expression());
        }
        args
    }
}

/// Parses an in-memory source, reporting into `listing`.
pub fn parse_source(src: &str, listing: &mut Listing) -> Program {
    Parser::new(src.as_bytes(), listing).parse()
}
