use tracing::{debug, info};

use crate::error::{Diagnostic, SemanticError};
use crate::listing::Listing;
use crate::parser::{CompoundStmt, Declaration, Expr, ExprKind, FunDecl, Program, Stmt, Type, VarDecl};

use super::{DeclKind, DeclRef, ScopeId, SymbolTable};

/// Runtime routines every program can call without declaring them.
pub const BUILTINS: [(&str, Type); 2] = [("input", Type::Int), ("output", Type::Void)];

pub fn builtin_return_type(name: &str) -> Option<Type> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, ty)| *ty)
}

/// Mutable state threaded through one analysis run.
#[derive(Debug)]
pub struct AnalysisContext {
    pub symbol_table: SymbolTable,
    scope: ScopeId,
    /// Next free slot of each open scope, indexed by scope id.
    slots: Vec<usize>,
    /// Return types of the functions being analyzed, innermost last.
    return_types: Vec<Type>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self {
            symbol_table: SymbolTable::new(),
            scope: 0,
            slots: vec![0],
            return_types: vec![],
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn current_return_type(&self) -> Type {
        self.return_types.last().copied().unwrap_or(Type::Void)
    }

    fn open_scope(&mut self) {
        self.scope += 1;
        self.slots.push(0);
        debug!(scope = self.scope, "open scope");
    }

    fn close_scope(&mut self) {
        debug!(scope = self.scope, "close scope");
        self.symbol_table.delete_scope(self.scope);
        self.slots.pop();
        self.scope -= 1;
    }

    fn next_slot(&mut self) -> usize {
        match self.slots.last_mut() {
            Some(next) => {
                let slot = *next;
                *next += 1;
                slot
            }
            None => 0,
        }
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves names and types every expression in one walk over the tree.
///
/// Declarations enter the table on the way down; expressions are checked on
/// the way up, once their operands carry a type. Every violation is reported
/// and the walk continues.
pub struct SemanticVisitor<'l> {
    ctx: AnalysisContext,
    listing: &'l mut Listing,
}

impl<'l> SemanticVisitor<'l> {
    pub fn new(listing: &'l mut Listing) -> Self {
        Self {
            ctx: AnalysisContext::new(),
            listing,
        }
    }

    /// Analyzes the program and returns the table of global symbols left
    /// once every inner scope has closed.
    pub fn visit_program(&mut self, program: &mut Program) -> SymbolTable {
        self.listing.phase("Building Symbol Table & Checking Types...");

        for declaration in program.0.iter_mut() {
            self.visit_declaration(declaration);
        }

        info!(
            globals = self.ctx.symbol_table.len(),
            errors = self.listing.diagnostics().len(),
            "semantic analysis finished"
        );
        if !self.listing.has_errors() {
            self.listing
                .note(format_args!("\nSemantic analysis completed successfully."));
        }
        std::mem::take(&mut self.ctx.symbol_table)
    }

    fn error(&mut self, line: usize, kind: SemanticError) {
        debug!(line, error = %kind, "semantic error");
        self.listing.report(Diagnostic::Semantic { line, kind });
    }

    fn declare(&mut self, name: &str, ty: Type, decl: DeclRef) {
        let scope = self.ctx.scope();
        let taken = self.ctx.symbol_table.lookup_in_scope(name, scope).is_some()
            || (scope == 0 && builtin_return_type(name).is_some());
        if taken {
            self.error(decl.line, SemanticError::Redeclaration(name.to_string()));
            return;
        }

        let slot = self.ctx.next_slot();
        self.ctx.symbol_table.insert(name, ty, scope, slot, decl);
    }

    fn visit_declaration(&mut self, declaration: &mut Declaration) {
        match declaration {
            Declaration::Var(var) => self.visit_var_decl(var, DeclKind::Var),
            Declaration::Fun(fun) => self.visit_fun_decl(fun),
        }
    }

    fn visit_var_decl(&mut self, var: &VarDecl, kind: DeclKind) {
        if var.ty == Type::Void {
            self.error(var.line, SemanticError::VoidVariable(var.name.clone()));
        }
        let decl = DeclRef {
            kind,
            line: var.line,
        };
        self.declare(&var.name, var.ty, decl);
    }

    fn visit_fun_decl(&mut self, fun: &mut FunDecl) {
        let decl = DeclRef {
            kind: DeclKind::Fun {
                params: fun.params.iter().map(|p| p.ty).collect(),
            },
            line: fun.line,
        };
        self.declare(&fun.name, fun.return_ty, decl);

        self.ctx.return_types.push(fun.return_ty);
        self.ctx.open_scope();

        for param in &fun.params {
            self.visit_var_decl(param, DeclKind::Param);
        }
        self.visit_compound_stmt(&mut fun.body);

        self.ctx.close_scope();
        self.ctx.return_types.pop();
    }

    fn visit_compound_stmt(&mut self, compound: &mut CompoundStmt) {
        self.ctx.open_scope();

        for local in &compound.locals {
            self.visit_var_decl(local, DeclKind::Var);
        }
        for stmt in compound.stmts.iter_mut() {
            self.visit_stmt(stmt);
        }

        self.ctx.close_scope();
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Empty => (),
            Stmt::Expr(expr) => {
                self.visit_expr(expr);
            }
            Stmt::Compound(compound) => self.visit_compound_stmt(compound),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.visit_expr(cond);
                self.visit_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.visit_stmt(otherwise);
                }
                self.check_condition(cond);
            }
            Stmt::While { cond, body, .. } => {
                self.visit_expr(cond);
                self.visit_stmt(body);
                self.check_condition(cond);
            }
            Stmt::Return { value, line } => {
                let found = match value {
                    Some(expr) => self.visit_expr(expr),
                    None => Type::Void,
                };
                let expected = self.ctx.current_return_type();
                if found != expected {
                    self.error(*line, SemanticError::ReturnMismatch { expected, found });
                }
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr) {
        if cond.ty != Type::Int {
            self.error(cond.line, SemanticError::ConditionNotInt);
        }
    }

    /// Types `expr` and its operands, storing the result in `expr.ty`.
    fn visit_expr(&mut self, expr: &mut Expr) -> Type {
        let ty = match &mut expr.kind {
            ExprKind::Assign(target, value) => {
                let target_ty = self.visit_expr(target);
                let value_ty = self.visit_expr(value);
                if !matches!(target.kind, ExprKind::Id(_)) {
                    self.error(expr.line, SemanticError::AssignToNonVariable);
                } else if target_ty != value_ty {
                    self.error(
                        expr.line,
                        SemanticError::AssignMismatch {
                            target: target_ty,
                            value: value_ty,
                        },
                    );
                }
                target_ty
            }
            ExprKind::Binary(op, left, right) => {
                let left_ty = self.visit_expr(left);
                let right_ty = self.visit_expr(right);
                if left_ty != Type::Int || right_ty != Type::Int {
                    self.error(expr.line, SemanticError::OperandNotInt(*op));
                }
                Type::Int
            }
            ExprKind::Const(_) => Type::Int,
            ExprKind::Id(name) => self.visit_id(name, expr.line),
            ExprKind::Call(name, args) => {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    arg_types.push(self.visit_expr(arg));
                }
                self.visit_call(name, &arg_types, expr.line)
            }
            ExprKind::Error => Type::Void,
        };
        expr.ty = ty;
        ty
    }

    fn visit_id(&mut self, name: &str, line: usize) -> Type {
        match self.ctx.symbol_table.lookup(name) {
            None => {
                self.error(line, SemanticError::UndeclaredVariable(name.to_string()));
                Type::Void
            }
            Some(symbol) if symbol.is_function() => {
                let ty = symbol.ty;
                self.error(line, SemanticError::NotAVariable(name.to_string()));
                ty
            }
            Some(symbol) => symbol.ty,
        }
    }

    fn visit_call(&mut self, name: &str, arg_types: &[Type], line: usize) -> Type {
        if let Some(ty) = builtin_return_type(name) {
            return ty;
        }

        let Some(symbol) = self.ctx.symbol_table.lookup(name) else {
            self.error(line, SemanticError::UndeclaredFunction(name.to_string()));
            return Type::Void;
        };
        let DeclKind::Fun { params } = &symbol.decl.kind else {
            self.error(line, SemanticError::NotAFunction(name.to_string()));
            return Type::Void;
        };

        let return_ty = symbol.ty;
        let expected = params.len();
        if expected != arg_types.len() {
            self.error(
                line,
                SemanticError::ArgumentCount {
                    name: name.to_string(),
                    expected,
                    found: arg_types.len(),
                },
            );
        } else if let Some(position) = arg_types.iter().position(|ty| *ty != Type::Int) {
            self.error(
                line,
                SemanticError::ArgumentNotInt {
                    name: name.to_string(),
                    position: position + 1,
                },
            );
        }
        return_ty
    }
}

/// Runs semantic analysis over `program`, reporting into `listing`.
pub fn analyze(program: &mut Program, listing: &mut Listing) -> SymbolTable {
    SemanticVisitor::new(listing).visit_program(program)
}
