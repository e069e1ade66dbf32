use cminus::error::{Diagnostic, SyntaxError};
use cminus::parser::*;
use cminus::Listing;

fn parse(src: &str) -> (Program, Vec<Diagnostic>) {
    let mut listing = Listing::quiet();
    let program = parse_source(src, &mut listing);
    (program, listing.take_diagnostics())
}

fn syntax_errors(diagnostics: &[Diagnostic]) -> Vec<&SyntaxError> {
    diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::Syntax { kind, .. } => Some(kind),
            _ => None,
        })
        .collect()
}

fn sexp(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Assign(target, value) => format!("(= {} {})", sexp(target), sexp(value)),
        ExprKind::Binary(op, l, r) => format!("({} {} {})", op, sexp(l), sexp(r)),
        ExprKind::Const(n) => n.to_string(),
        ExprKind::Id(name) => name.clone(),
        ExprKind::Call(name, args) => {
            let args: Vec<_> = args.iter().map(sexp).collect();
            format!("{}({})", name, args.join(" "))
        }
        ExprKind::Error => "<error>".to_string(),
    }
}

/// Parses `expr` as the value of a return statement.
fn parse_expr(expr: &str) -> String {
    let src = format!("int main(void) {{ return {}; }}", expr);
    let (program, diagnostics) = parse(&src);
    assert_eq!(diagnostics, vec![], "{}", src);

    let Declaration::Fun(main) = &program.0[0] else {
        panic!("expected a function");
    };
    let Stmt::Return { value: Some(value), .. } = &main.body.stmts[0] else {
        panic!("expected a return value");
    };
    sexp(value)
}

#[test]
fn multiplication_binds_tighter() {
    assert_eq!(parse_expr("a + b * c"), "(+ a (* b c))");
    assert_eq!(parse_expr("a * b + c"), "(+ (* a b) c)");
    assert_eq!(parse_expr("(a + b) * c"), "(* (+ a b) c)");
}

#[test]
fn arithmetic_is_left_associative() {
    assert_eq!(parse_expr("a - b - c"), "(- (- a b) c)");
    assert_eq!(parse_expr("a / b * c"), "(* (/ a b) c)");
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(parse_expr("a = b = 1"), "(= a (= b 1))");
}

#[test]
fn relational_binds_loosest() {
    assert_eq!(parse_expr("a + 1 <= b * 2"), "(<= (+ a 1) (* b 2))");
    assert_eq!(parse_expr("x = a != b"), "(= x (!= a b))");
}

#[test]
fn calls_and_arguments() {
    assert_eq!(parse_expr("f()"), "f()");
    assert_eq!(parse_expr("f(a, g(1), b + 2)"), "f(a g(1) (+ b 2))");
}

#[test]
fn declarations_in_order() {
    let (program, diagnostics) = parse(
        "int x;
         int f(int a, int b) { int t; t = a; return t + b; }
         void main(void) { }",
    );
    assert!(diagnostics.is_empty());

    let names: Vec<_> = program.0.iter().map(Declaration::name).collect();
    assert_eq!(names, vec!["x", "f", "main"]);

    let Declaration::Fun(f) = &program.0[1] else {
        panic!("expected a function");
    };
    assert_eq!(f.return_ty, Type::Int);
    assert_eq!(f.line, 2);
    let params: Vec<_> = f.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["a", "b"]);
    assert_eq!(f.body.locals.len(), 1);
    assert_eq!(f.body.stmts.len(), 2);

    let Declaration::Fun(main) = &program.0[2] else {
        panic!("expected a function");
    };
    assert!(main.params.is_empty());
    assert_eq!(main.return_ty, Type::Void);
}

#[test]
fn else_binds_to_nearest_if() {
    let (program, diagnostics) =
        parse("void main(void) { if (a) if (b) x = 1; else x = 2; }");
    assert!(diagnostics.is_empty());

    let Declaration::Fun(main) = &program.0[0] else {
        panic!("expected a function");
    };
    let Stmt::If { otherwise: None, then, .. } = &main.body.stmts[0] else {
        panic!("outer if should have no else");
    };
    assert!(matches!(**then, Stmt::If { otherwise: Some(_), .. }));
}

#[test]
fn empty_statements_are_dropped() {
    let (program, diagnostics) = parse("void main(void) { ; ; while (x) ; }");
    assert!(diagnostics.is_empty());

    let Declaration::Fun(main) = &program.0[0] else {
        panic!("expected a function");
    };
    assert_eq!(main.body.stmts.len(), 1);
    let Stmt::While { body, .. } = &main.body.stmts[0] else {
        panic!("expected while");
    };
    assert_eq!(**body, Stmt::Empty);
}

#[test]
fn missing_semicolon_at_end_of_input() {
    let (_, diagnostics) = parse("int x");
    assert_eq!(
        diagnostics,
        vec![Diagnostic::Syntax {
            line: 1,
            kind: SyntaxError::UnexpectedToken("EOF".to_string()),
        }]
    );
}

#[test]
fn assignment_to_non_variable() {
    let (_, diagnostics) = parse("void main(void) {\n  1 = 2;\n}");
    assert_eq!(
        diagnostics,
        vec![Diagnostic::Syntax {
            line: 2,
            kind: SyntaxError::AssignToNonVariable,
        }]
    );
}

#[test]
fn parameters_must_be_int() {
    let (_, diagnostics) = parse("int f(x) { return 1; }");
    assert!(matches!(
        syntax_errors(&diagnostics).first(),
        Some(SyntaxError::ExpectedParamType(_))
    ));
}

#[test]
fn out_of_range_literal() {
    let (_, diagnostics) = parse("void main(void) { x = 99999999999; }");
    assert_eq!(
        syntax_errors(&diagnostics),
        vec![&SyntaxError::NumberOutOfRange("99999999999".to_string())]
    );
}

#[test]
fn bad_character_is_reported_once() {
    let (_, diagnostics) = parse("void main(void) { x = 1 $ 2; }");
    let lexical: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::Lexical { .. }))
        .collect();
    assert_eq!(
        lexical,
        vec![&Diagnostic::Lexical {
            line: 1,
            lexeme: "$".to_string(),
        }]
    );
}

#[test]
fn recovers_at_the_next_declaration() {
    let (program, diagnostics) = parse(
        "int main(void) { @ x = ; } }
         int y;",
    );

    assert_eq!(
        diagnostics.first(),
        Some(&Diagnostic::Lexical {
            line: 1,
            lexeme: "@".to_string(),
        })
    );
    let names: Vec<_> = program.0.iter().map(Declaration::name).collect();
    assert_eq!(names, vec!["main", "y"]);
}

#[test]
fn trailing_garbage_is_one_error() {
    let (program, diagnostics) = parse("int x; ) ) 1 2 3");
    assert_eq!(program.0.len(), 1);
    assert_eq!(
        diagnostics,
        vec![Diagnostic::Syntax {
            line: 1,
            kind: SyntaxError::ExpectedDeclaration(")".to_string()),
        }]
    );
}

#[test]
fn unclosed_body_terminates() {
    let (program, diagnostics) = parse("void main(void) { if (x) { while (y");
    assert!(!diagnostics.is_empty());
    assert_eq!(program.0.len(), 1);
}

#[test]
fn deep_nesting_is_capped() {
    let depth = MAX_DEPTH + 50;
    let src = format!(
        "void main(void) {{ {}{} }}",
        "{".repeat(depth),
        "}".repeat(depth)
    );
    let (_, diagnostics) = parse(&src);

    let too_deep = syntax_errors(&diagnostics)
        .into_iter()
        .filter(|k| **k == SyntaxError::NestingTooDeep)
        .count();
    assert_eq!(too_deep, 1);
}

#[test]
fn deep_parentheses_are_capped() {
    let depth = MAX_DEPTH * 4;
    let src = format!(
        "void main(void) {{ x = {}1{}; }}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let (_, diagnostics) = parse(&src);
    assert!(syntax_errors(&diagnostics).contains(&&SyntaxError::NestingTooDeep));
}

#[test]
fn long_operator_chain_is_capped() {
    let src = format!("void main(void) {{ x = 1{}; }}", " + 1".repeat(20_000));
    let (_, diagnostics) = parse(&src);
    assert_eq!(
        diagnostics,
        vec![Diagnostic::Syntax {
            line: 1,
            kind: SyntaxError::NestingTooDeep,
        }]
    );
}

#[test]
fn long_term_chain_is_capped() {
    let src = format!("void main(void) {{ x = 2{} + 1; }}", " * 2".repeat(20_000));
    let (_, diagnostics) = parse(&src);
    assert_eq!(syntax_errors(&diagnostics), vec![&SyntaxError::NestingTooDeep]);
}

#[test]
fn chain_below_the_cap_parses() {
    let (_, diagnostics) = parse(&format!("void main(void) {{ x = 1{}; }}", " - 1".repeat(200)));
    assert!(diagnostics.is_empty());
}
