#[cfg(test)]
mod parser_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{Expr, Stmt};
    use rox::ast_printer::Ast;
    use rox::parser::Parser;
    use rox::scanner::tokenize;

    fn parser_for(source: &str) -> Parser {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);
        Parser::new(tokens)
    }

    fn print_expression(source: &str) -> String {
        let mut parser = parser_for(source);
        let expr = parser.parse_expression().expect("expression should parse");
        assert!(parser.errors().is_empty());
        Ast.print(&expr)
    }

    fn parse_errors(source: &str) -> Vec<String> {
        let mut parser = parser_for(source);
        parser.parse();
        parser.errors().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parser_01_precedence() {
        assert_eq!(print_expression("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
        assert_eq!(print_expression("(1 + 2) * 3"), "(* (group (+ 1.0 2.0)) 3.0)");
        assert_eq!(print_expression("-123 * (45.67)"), "(* (- 123.0) (group 45.67))");
        assert_eq!(print_expression("10 % 4 - 1"), "(- (% 10.0 4.0) 1.0)");
        assert_eq!(print_expression("!true == false"), "(== (! true) false)");
    }

    #[test]
    fn test_parser_02_left_associativity() {
        assert_eq!(print_expression("1 - 2 - 3"), "(- (- 1.0 2.0) 3.0)");
        assert_eq!(print_expression("8 / 4 / 2"), "(/ (/ 8.0 4.0) 2.0)");
    }

    #[test]
    fn test_parser_03_logical_operators() {
        assert_eq!(
            print_expression("a or b and c"),
            "(or a (and b c))"
        );
        assert_eq!(print_expression("1 < 2 and 3 >= 4"), "(and (< 1.0 2.0) (>= 3.0 4.0))");
    }

    #[test]
    fn test_parser_04_assignment_is_right_associative() {
        assert_eq!(print_expression("a = b = 1"), "(= a (= b 1.0))");
        assert_eq!(print_expression("p.x = 2"), "(= (. p x) 2.0)");
    }

    #[test]
    fn test_parser_05_calls_and_properties() {
        assert_eq!(print_expression("f(1, \"two\")(x)"), "(call (call f 1.0 two) x)");
        assert_eq!(print_expression("a.b.c()"), "(call (. (. a b) c))");
    }

    #[test]
    fn test_parser_06_for_desugars_to_while() {
        let mut parser = parser_for("for (var i = 0; i < 3; i = i + 1) print i;");
        let statements = parser.parse();

        assert!(parser.errors().is_empty());
        assert_eq!(statements.len(), 1);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block, got {:?}", statements[0]);
        };
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while, got {:?}", outer[1]);
        };
        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected block body, got {:?}", body);
        };
        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn test_parser_07_for_without_clauses() {
        let mut parser = parser_for("for (;;) print 1;");
        let statements = parser.parse();

        assert!(parser.errors().is_empty());
        assert!(matches!(statements[0], Stmt::While { .. }));
    }

    #[test]
    fn test_parser_08_class_with_superclass() {
        let mut parser = parser_for("class B < A { init(x) { this.x = x; } get() { return super.get(); } }");
        let statements = parser.parse();

        assert!(parser.errors().is_empty());

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected class, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].params.len(), 1);
    }

    #[test]
    fn test_parser_09_reports_and_recovers() {
        assert_eq!(
            parse_errors("var = 1;\nprint 2;\nvar x = ;\n"),
            vec![
                "[line 1] Error at '=': Expected variable name.",
                "[line 3] Error at ';': Expected expression.",
            ]
        );
    }

    #[test]
    fn test_parser_10_missing_semicolon_at_end() {
        assert_eq!(
            parse_errors("print 1"),
            vec!["[line 1] Error at end: Expected ';' after value."]
        );
    }

    #[test]
    fn test_parser_11_invalid_assignment_target() {
        let mut parser = parser_for("1 + 2 = 3;\nprint 4;");
        let statements = parser.parse();

        assert_eq!(
            parser
                .errors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        // Not a synchronizing error: both statements survive.
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_parser_12_argument_cap() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        assert_eq!(
            parse_errors(&source),
            vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
        );
    }

    #[test]
    fn test_parser_13_expression_mode_rejects_trailing_tokens() {
        let mut parser = parser_for("1 2");

        assert!(parser.parse_expression().is_none());
        assert_eq!(
            parser.errors()[0].to_string(),
            "[line 1] Error at '2': Expected end of expression."
        );
    }

    #[test]
    fn test_parser_14_super_requires_method_name() {
        assert_eq!(
            parse_errors("super;"),
            vec!["[line 1] Error at ';': Expected '.' after 'super'."]
        );
    }
}
