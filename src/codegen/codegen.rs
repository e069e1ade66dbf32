use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use phf::phf_set;
use tracing::info;

use crate::error::Error;
use crate::parser::{CompoundStmt, Declaration, Expr, ExprKind, FunDecl, Program, Stmt, Type, VarDecl};

/// The routine that becomes the Java entry point.
pub const ENTRY_POINT: &str = "main";

const INDENT: &str = "    ";

/// Java keywords plus the names the generated class already uses. Source
/// identifiers that collide get a trailing underscore.
static RESERVED_NAMES: phf::Set<&'static str> = phf_set! {
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char",
    "class", "const", "continue", "default", "do", "double", "enum", "extends",
    "final", "finally", "float", "for", "goto", "implements", "import",
    "instanceof", "interface", "long", "native", "new", "package", "private",
    "protected", "public", "short", "static", "strictfp", "super", "switch",
    "synchronized", "this", "throw", "throws", "transient", "try", "volatile",
    "true", "false", "null",
    "sc", "args", "System", "discard",
};

fn ident(name: &str) -> Cow<'_, str> {
    if RESERVED_NAMES.contains(name) {
        Cow::Owned(format!("{}_", name))
    } else {
        Cow::Borrowed(name)
    }
}

fn type_name(ty: Type) -> &'static str {
    match ty {
        Type::Int => "int",
        Type::Void => "void",
    }
}

/// An expression worth keeping as a statement: it calls or assigns
/// somewhere inside.
fn has_side_effects(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Assign(..) | ExprKind::Call(..) => true,
        ExprKind::Binary(_, left, right) => has_side_effects(left) || has_side_effects(right),
        ExprKind::Const(_) | ExprKind::Id(_) | ExprKind::Error => false,
    }
}

fn stmt_needs_discard(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(expr) => {
            !matches!(expr.kind, ExprKind::Assign(..) | ExprKind::Call(..)) && has_side_effects(expr)
        }
        Stmt::Compound(compound) => compound.stmts.iter().any(stmt_needs_discard),
        Stmt::If {
            then, otherwise, ..
        } => stmt_needs_discard(then) || otherwise.as_deref().is_some_and(stmt_needs_discard),
        Stmt::While { body, .. } => stmt_needs_discard(body),
        Stmt::Empty | Stmt::Return { .. } => false,
    }
}

/// Translates an analyzed program into a single Java class.
///
/// Every non-assignment operator is fully parenthesised so the source
/// precedence survives unchanged. Relational results are bridged between
/// C-Minus ints and Java booleans where the context needs it.
///
/// Java forbids a local from shadowing another local or a parameter of the
/// same method, so a shadowing declaration gets a fresh `name_N`. Source
/// identifiers never contain `_`, so those names cannot collide.
pub struct Codegen {
    out: String,
    indent: usize,
    class_name: String,
    file_name: String,
    in_entry_point: bool,
    /// Java names of the method's visible locals, innermost last.
    locals: HashMap<String, Vec<String>>,
    /// Source names declared by each open block of the current method.
    blocks: Vec<Vec<String>>,
    renamed: usize,
}

impl Codegen {
    pub fn new(class_name: &str, file_name: &str) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            class_name: class_name.to_string(),
            file_name: file_name.to_string(),
            in_entry_point: false,
            locals: HashMap::new(),
            blocks: vec![],
            renamed: 0,
        }
    }

    pub fn generate(&mut self, program: &Program) -> String {
        self.out.clear();
        self.indent = 0;

        let needs_discard = program.0.iter().any(|d| match d {
            Declaration::Fun(fun) => fun.body.stmts.iter().any(stmt_needs_discard),
            Declaration::Var(_) => false,
        });
        self.gen_preamble(needs_discard);
        for declaration in &program.0 {
            self.gen_declaration(declaration);
        }

        self.indent = 0;
        self.line("}");
        std::mem::take(&mut self.out)
    }

    fn line(&mut self, s: &str) {
        if !s.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.out.push_str(s);
        }
        self.out.push('\n');
    }

    fn gen_preamble(&mut self, needs_discard: bool) {
        self.line("/* C-Minus Compilation to Java */");
        self.line(&format!("/* Program: {} */", self.file_name));
        self.line("import java.util.*;");
        self.line("");
        self.line(&format!("public class {} {{", self.class_name));
        self.indent = 1;

        self.line("static Scanner sc = new Scanner(System.in);");
        self.line("");

        self.line("static int input() {");
        self.indent += 1;
        self.line("System.out.print(\"input: \");");
        self.line("return sc.nextInt();");
        self.indent -= 1;
        self.line("}");
        self.line("");

        self.line("static void output(int x) {");
        self.indent += 1;
        self.line("System.out.println(x);");
        self.indent -= 1;
        self.line("}");

        if needs_discard {
            self.line("");
            self.line("static void discard(int x) {");
            self.line("}");
        }

        self.line("");
        self.line("/* Generated code */");
    }

    fn gen_declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Var(var) => {
                let s = format!("static {} {};", type_name(var.ty), ident(&var.name));
                self.line(&s);
            }
            Declaration::Fun(fun) => self.gen_fun_decl(fun),
        }
    }

    fn gen_fun_decl(&mut self, fun: &FunDecl) {
        self.line("");
        self.locals.clear();
        self.renamed = 0;
        self.in_entry_point = fun.name == ENTRY_POINT;

        // the entry point has a fixed signature; its parameters become
        // zeroed locals
        self.open_block();
        let header = if self.in_entry_point {
            "public static void main(String[] args)".to_string()
        } else {
            let params = fun
                .params
                .iter()
                .map(|p| format!("{} {}", type_name(p.ty), self.declare(&p.name)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "static {} {}({})",
                type_name(fun.return_ty),
                ident(&fun.name),
                params
            )
        };
        self.line(&header);

        let entry_params: &[VarDecl] = if self.in_entry_point { &fun.params } else { &[] };
        self.gen_block(&fun.body, entry_params);
        self.close_block();
        self.in_entry_point = false;
    }

    fn open_block(&mut self) {
        self.blocks.push(vec![]);
    }

    fn close_block(&mut self) {
        for name in self.blocks.pop().unwrap_or_default() {
            if let Some(names) = self.locals.get_mut(&name) {
                names.pop();
            }
        }
    }

    /// Binds a local or parameter of the current method and returns its Java
    /// name.
    fn declare(&mut self, name: &str) -> String {
        let names = self.locals.entry(name.to_string()).or_default();
        let java = if names.is_empty() {
            ident(name).into_owned()
        } else {
            self.renamed += 1;
            format!("{}_{}", name, self.renamed)
        };
        names.push(java.clone());
        if let Some(block) = self.blocks.last_mut() {
            block.push(name.to_string());
        }
        java
    }

    fn name_of<'a>(&'a self, name: &'a str) -> Cow<'a, str> {
        match self.locals.get(name).and_then(|names| names.last()) {
            Some(java) => Cow::Borrowed(java.as_str()),
            None => ident(name),
        }
    }

    fn gen_local(&mut self, var: &VarDecl) {
        let s = format!("{} {} = 0;", type_name(var.ty), self.declare(&var.name));
        self.line(&s);
    }

    fn gen_compound_stmt(&mut self, compound: &CompoundStmt) {
        self.gen_block(compound, &[]);
    }

    /// A braced block; `extra_locals` are declared ahead of the block's own.
    fn gen_block(&mut self, compound: &CompoundStmt, extra_locals: &[VarDecl]) {
        self.line("{");
        self.indent += 1;
        self.open_block();

        for local in extra_locals.iter().chain(&compound.locals) {
            self.gen_local(local);
        }
        for stmt in &compound.stmts {
            self.gen_stmt(stmt);
        }

        self.close_block();
        self.indent -= 1;
        self.line("}");
    }

    /// Bodies of `if`/`while`: blocks stay at the header's level, single
    /// statements are indented under it.
    fn gen_body(&mut self, stmt: &Stmt) {
        if let Stmt::Compound(compound) = stmt {
            self.gen_compound_stmt(compound);
        } else {
            self.indent += 1;
            self.gen_stmt(stmt);
            self.indent -= 1;
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => self.line(";"),
            Stmt::Expr(expr) => match expr.kind {
                ExprKind::Assign(..) | ExprKind::Call(..) => {
                    let s = format!("{};", self.gen_expr(expr));
                    self.line(&s);
                }
                _ if has_side_effects(expr) => {
                    let s = format!("discard({});", self.gen_value(expr));
                    self.line(&s);
                }
                // nothing to evaluate
                _ => self.line(";"),
            },
            Stmt::Compound(compound) => self.gen_compound_stmt(compound),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                let s = format!("if {}", self.gen_condition(cond));
                self.line(&s);
                self.gen_body(then);
                if let Some(otherwise) = otherwise {
                    self.line("else");
                    self.gen_body(otherwise);
                }
            }
            Stmt::While { cond, body, .. } => {
                let s = format!("while {}", self.gen_condition(cond));
                self.line(&s);
                self.gen_body(body);
            }
            Stmt::Return { value: None, .. } => self.line("return;"),
            // the Java entry point is void: keep side effects, drop the value
            Stmt::Return {
                value: Some(expr), ..
            } if self.in_entry_point => {
                if matches!(expr.kind, ExprKind::Call(..) | ExprKind::Assign(..)) {
                    let s = format!("{};", self.gen_expr(expr));
                    self.line(&s);
                }
                self.line("return;");
            }
            Stmt::Return {
                value: Some(expr), ..
            } => {
                let s = format!("return {};", self.gen_value(expr));
                self.line(&s);
            }
        }
    }

    /// A parenthesised Java boolean.
    fn gen_condition(&self, expr: &Expr) -> String {
        if expr.is_relational() {
            self.gen_expr(expr)
        } else {
            format!("({} != 0)", self.gen_operand(expr))
        }
    }

    /// An expression used where Java expects an int.
    fn gen_value(&self, expr: &Expr) -> String {
        if expr.is_relational() {
            format!("({} ? 1 : 0)", self.gen_expr(expr))
        } else {
            self.gen_expr(expr)
        }
    }

    /// An int operand of a binary operator.
    fn gen_operand(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Assign(_, _) => format!("({})", self.gen_expr(expr)),
            _ => self.gen_value(expr),
        }
    }

    fn gen_expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Assign(target, value) => {
                format!("{} = {}", self.gen_expr(target), self.gen_value(value))
            }
            ExprKind::Binary(op, left, right) => format!(
                "({} {} {})",
                self.gen_operand(left),
                op,
                self.gen_operand(right)
            ),
            ExprKind::Const(value) => value.to_string(),
            ExprKind::Id(name) => self.name_of(name).into_owned(),
            ExprKind::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.gen_value(a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({})", ident(name), args)
            }
            ExprKind::Error => unreachable!("code generation only runs on error-free trees"),
        }
    }
}

/// Java class name for an output file: its stem, with anything that is not
/// valid in an identifier replaced by `_`.
pub fn class_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Generates `program` into the file at `path`. The file is opened before
/// any code is produced; failing to open it ends generation.
pub fn write_output(program: &Program, path: &Path) -> Result<(), Error> {
    let mut file = File::create(path).map_err(|source| Error::OutputNotWritable {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let code = Codegen::new(&class_name_for(path), &file_name).generate(program);
    file.write_all(code.as_bytes())?;

    info!(path = %path.display(), bytes = code.len(), "wrote generated code");
    Ok(())
}
