use cminus::analyzer::{analyze, DeclKind, SymbolTable};
use cminus::error::{Diagnostic, SemanticError};
use cminus::parser::*;
use cminus::Listing;

fn check(src: &str) -> (Program, SymbolTable, Vec<SemanticError>) {
    let mut listing = Listing::quiet();
    let mut program = parse_source(src, &mut listing);
    assert!(!listing.has_errors(), "parse failed: {:?}", listing.diagnostics());

    let globals = analyze(&mut program, &mut listing);
    let errors = listing
        .take_diagnostics()
        .into_iter()
        .map(|d| match d {
            Diagnostic::Semantic { kind, .. } => kind,
            other => panic!("unexpected diagnostic {:?}", other),
        })
        .collect();
    (program, globals, errors)
}

fn errors(src: &str) -> Vec<SemanticError> {
    check(src).2
}

fn main_body(program: &Program) -> &CompoundStmt {
    match program.0.last() {
        Some(Declaration::Fun(f)) => &f.body,
        _ => panic!("expected main last"),
    }
}

#[test]
fn well_typed_program() {
    let src = "
        int f(int x) { return x + 1; }
        void main(void) { int y; y = f(2); output(y); }
    ";
    assert_eq!(errors(src), vec![]);
}

#[test]
fn recursion_sees_its_own_declaration() {
    let src = "
        int fact(int n) {
            if (n <= 1) return 1;
            return n * fact(n - 1);
        }
    ";
    assert_eq!(errors(src), vec![]);
}

#[test]
fn redeclaration_in_same_scope() {
    let mut listing = Listing::quiet();
    let mut program = parse_source("int x;\nint x;\nvoid main(void) { }", &mut listing);
    analyze(&mut program, &mut listing);

    assert_eq!(
        listing.diagnostics(),
        &[Diagnostic::Semantic {
            line: 2,
            kind: SemanticError::Redeclaration("x".to_string()),
        }]
    );
}

#[test]
fn redeclared_function_still_checks_its_body() {
    let src = "
        int f(void) { return 1; }
        void f(void) { return 1; }
    ";
    assert_eq!(
        errors(src),
        vec![
            SemanticError::Redeclaration("f".to_string()),
            SemanticError::ReturnMismatch {
                expected: Type::Void,
                found: Type::Int,
            },
        ]
    );
}

#[test]
fn nested_scopes_may_shadow() {
    let src = "
        int x;
        int f(int x) { int x; { int x; x = 1; } return x; }
        void main(void) { int x; x = f(x); }
    ";
    assert_eq!(errors(src), vec![]);
}

#[test]
fn locals_do_not_outlive_their_block() {
    let src = "
        void main(void) {
            { int inner; inner = 1; }
            inner = 2;
        }
    ";
    assert!(errors(src).contains(&SemanticError::UndeclaredVariable("inner".to_string())));
}

#[test]
fn only_globals_remain_after_analysis() {
    let (_, globals, errs) = check(
        "int a;
         int b;
         int f(int p) { int q; q = p; return q; }
         void main(void) { }",
    );
    assert!(errs.is_empty());

    for local in ["p", "q"] {
        assert!(globals.lookup(local).is_none(), "{} leaked", local);
    }
    let slots: Vec<_> = ["a", "b", "f", "main"]
        .iter()
        .map(|name| globals.lookup(name).map(|s| (s.scope, s.slot)))
        .collect();
    assert_eq!(
        slots,
        vec![Some((0, 0)), Some((0, 1)), Some((0, 2)), Some((0, 3))]
    );

    let f = globals.lookup("f").map(|s| s.decl.clone());
    assert!(matches!(
        f.map(|d| d.kind),
        Some(DeclKind::Fun { params }) if params == vec![Type::Int]
    ));
}

#[test]
fn undeclared_names() {
    assert_eq!(
        errors("void main(void) { g(); }"),
        vec![SemanticError::UndeclaredFunction("g".to_string())]
    );
    assert!(errors("void main(void) { x = 1; }")
        .contains(&SemanticError::UndeclaredVariable("x".to_string())));
}

#[test]
fn variables_and_functions_are_not_interchangeable() {
    assert_eq!(
        errors("int x; void main(void) { x(); }"),
        vec![SemanticError::NotAFunction("x".to_string())]
    );
    assert_eq!(
        errors("int f(void) { return 1; } void main(void) { int y; y = f; }"),
        vec![SemanticError::NotAVariable("f".to_string())]
    );
}

#[test]
fn void_values_are_rejected() {
    let src = "
        void g(void) { }
        void main(void) {
            int x;
            x = g();
            x = g() + 1;
            while (g()) ;
            if (g()) ;
        }
    ";
    assert_eq!(
        errors(src),
        vec![
            SemanticError::AssignMismatch {
                target: Type::Int,
                value: Type::Void,
            },
            SemanticError::OperandNotInt(BinOpKind::Add),
            SemanticError::ConditionNotInt,
            SemanticError::ConditionNotInt,
        ]
    );
}

#[test]
fn return_must_match_function_type() {
    assert_eq!(
        errors("void main(void) { return 1; }"),
        vec![SemanticError::ReturnMismatch {
            expected: Type::Void,
            found: Type::Int,
        }]
    );
    assert_eq!(
        errors("int f(void) { return; }"),
        vec![SemanticError::ReturnMismatch {
            expected: Type::Int,
            found: Type::Void,
        }]
    );
}

#[test]
fn call_arguments_are_checked() {
    let src = "
        int f(int a) { return a; }
        void g(void) { }
        void main(void) { output(f(1, 2)); output(f(g())); }
    ";
    assert_eq!(
        errors(src),
        vec![
            SemanticError::ArgumentCount {
                name: "f".to_string(),
                expected: 1,
                found: 2,
            },
            SemanticError::ArgumentNotInt {
                name: "f".to_string(),
                position: 1,
            },
        ]
    );
}

#[test]
fn builtins_are_predeclared_and_reserved() {
    assert_eq!(errors("void main(void) { output(input()); }"), vec![]);
    assert_eq!(
        errors("int input(void) { return 0; }"),
        vec![SemanticError::Redeclaration("input".to_string())]
    );
    assert_eq!(
        errors("void main(void) { int x; x = output(1); }"),
        vec![SemanticError::AssignMismatch {
            target: Type::Int,
            value: Type::Void,
        }]
    );
}

#[test]
fn void_variables_are_rejected() {
    assert_eq!(
        errors("void x; void main(void) { }"),
        vec![SemanticError::VoidVariable("x".to_string())]
    );
}

#[test]
fn expressions_are_typed() {
    let (program, _, errs) = check(
        "int f(int a) { return a * 2; }
         void main(void) { int x; x = f(input()) + 1; output(x < 3); }",
    );
    assert!(errs.is_empty());

    let body = main_body(&program);
    let Stmt::Expr(assign) = &body.stmts[0] else {
        panic!("expected an expression statement");
    };
    assert_eq!(assign.ty, Type::Int);
    let ExprKind::Assign(_, value) = &assign.kind else {
        panic!("expected an assignment");
    };
    assert_eq!(value.ty, Type::Int);

    let Stmt::Expr(call) = &body.stmts[1] else {
        panic!("expected an expression statement");
    };
    assert_eq!(call.ty, Type::Void);
    let ExprKind::Call(_, args) = &call.kind else {
        panic!("expected a call");
    };
    assert_eq!(args[0].ty, Type::Int);
}
