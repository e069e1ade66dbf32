use std::fmt;
use std::io::{self, Write};

use tracing::warn;

use crate::error::Diagnostic;
use crate::lexer::Token;
use crate::parser::{CompoundStmt, Declaration, Expr, ExprKind, Program, Stmt, VarDecl};

/// Which channels of the listing are switched on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListingOptions {
    pub echo_source: bool,
    pub trace_scan: bool,
    pub trace_parse: bool,
}

/// Write-only report of one compilation run.
///
/// Every stage pushes its events here: echoed source lines, scanned tokens,
/// diagnostics and the final summary. Diagnostics are also kept so the driver
/// can tell whether the run failed.
pub struct Listing {
    out: Box<dyn Write>,
    options: ListingOptions,
    diagnostics: Vec<Diagnostic>,
}

impl Listing {
    pub fn new(out: impl Write + 'static, options: ListingOptions) -> Self {
        Self {
            out: Box::new(out),
            options,
            diagnostics: vec![],
        }
    }

    pub fn stdout(options: ListingOptions) -> Self {
        Self::new(io::stdout(), options)
    }

    /// Discards everything but still records diagnostics.
    pub fn quiet() -> Self {
        Self::new(io::sink(), ListingOptions::default())
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn banner(&mut self, source: &str) {
        self.emit(format_args!("\nC-Minus COMPILER START: {}", source));
    }

    pub fn source_line(&mut self, lineno: usize, line: &str) {
        if self.options.echo_source {
            let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
            self.emit(format_args!("{:4}: {}", lineno, line));
        }
    }

    pub fn token(&mut self, token: &Token) {
        if self.options.trace_scan {
            self.emit(format_args!("\t{}: {}", token.line, token));
        }
    }

    pub fn phase(&mut self, title: &str) {
        if self.options.trace_parse {
            self.emit(format_args!("\n{}", title));
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.emit(format_args!("{}", diagnostic));
        self.diagnostics.push(diagnostic);
    }

    pub fn syntax_tree(&mut self, program: &Program) {
        if !self.options.trace_parse {
            return;
        }
        self.emit(format_args!("\nSyntax tree:"));
        if let Err(err) = write_tree(&mut self.out, program) {
            warn!(%err, "failed to write syntax tree to listing");
        }
    }

    pub fn summary(&mut self) {
        if self.has_errors() {
            self.emit(format_args!("\nCompilation finished with errors."));
        } else {
            self.emit(format_args!("\nCompilation finished successfully."));
        }
    }

    pub fn note(&mut self, args: fmt::Arguments<'_>) {
        self.emit(args);
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = writeln!(self.out, "{}", args) {
            warn!(%err, "failed to write to listing");
        }
    }
}

/// Dumps the tree with four spaces of indent per level.
pub fn write_tree(out: &mut dyn Write, program: &Program) -> io::Result<()> {
    let mut printer = TreePrinter { out, indent: 0 };
    printer.program(program)
}

struct TreePrinter<'a> {
    out: &'a mut dyn Write,
    indent: usize,
}

impl TreePrinter<'_> {
    fn line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        writeln!(self.out, "{:width$}{}", "", args, width = self.indent)
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> io::Result<()>) -> io::Result<()> {
        self.indent += 4;
        let result = f(self);
        self.indent -= 4;
        result
    }

    fn program(&mut self, program: &Program) -> io::Result<()> {
        self.nested(|p| {
            for declaration in &program.0 {
                p.declaration(declaration)?;
            }
            Ok(())
        })
    }

    fn declaration(&mut self, declaration: &Declaration) -> io::Result<()> {
        match declaration {
            Declaration::Var(var) => self.var_decl(var),
            Declaration::Fun(fun) => {
                self.line(format_args!("Func Decl: {}", fun.name))?;
                self.nested(|p| {
                    for param in &fun.params {
                        p.line(format_args!("Param: {}", param.name))?;
                    }
                    Ok(())
                })?;
                self.nested(|p| p.compound(&fun.body))
            }
        }
    }

    fn var_decl(&mut self, var: &VarDecl) -> io::Result<()> {
        self.line(format_args!("Var Decl: {}", var.name))
    }

    fn compound(&mut self, compound: &CompoundStmt) -> io::Result<()> {
        self.line(format_args!("Compound Stmt"))?;
        self.nested(|p| {
            for local in &compound.locals {
                p.var_decl(local)?;
            }
            Ok(())
        })?;
        self.nested(|p| {
            for stmt in &compound.stmts {
                p.stmt(stmt)?;
            }
            Ok(())
        })
    }

    fn stmt(&mut self, stmt: &Stmt) -> io::Result<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Compound(compound) => self.compound(compound),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.line(format_args!("If"))?;
                self.nested(|p| {
                    p.expr(cond)?;
                    p.stmt(then)?;
                    match otherwise {
                        Some(s) => p.stmt(s),
                        None => Ok(()),
                    }
                })
            }
            Stmt::While { cond, body, .. } => {
                self.line(format_args!("While"))?;
                self.nested(|p| {
                    p.expr(cond)?;
                    p.stmt(body)
                })
            }
            Stmt::Return { value, .. } => {
                self.line(format_args!("Return"))?;
                self.nested(|p| match value {
                    Some(e) => p.expr(e),
                    None => Ok(()),
                })
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> io::Result<()> {
        match &expr.kind {
            ExprKind::Assign(target, value) => {
                self.line(format_args!("Op: ="))?;
                self.nested(|p| {
                    p.expr(target)?;
                    p.expr(value)
                })
            }
            ExprKind::Binary(op, left, right) => {
                self.line(format_args!("Op: {}", op))?;
                self.nested(|p| {
                    p.expr(left)?;
                    p.expr(right)
                })
            }
            ExprKind::Const(value) => self.line(format_args!("Const: {}", value)),
            ExprKind::Id(name) => self.line(format_args!("Id: {}", name)),
            ExprKind::Call(name, args) => {
                self.line(format_args!("Call: {}", name))?;
                self.nested(|p| {
                    for arg in args {
                        p.expr(arg)?;
                    }
                    Ok(())
                })
            }
            ExprKind::Error => self.line(format_args!("Error")),
        }
    }
}
