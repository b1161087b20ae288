#[cfg(test)]
mod resolver_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{Expr, ExprId, Stmt};
    use rox::parser::Parser;
    use rox::resolver::{Locals, Resolver};
    use rox::scanner::tokenize;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);

        let mut parser = Parser::new(tokens);
        let statements = parser.parse();
        assert!(parser.errors().is_empty(), "unexpected syntax errors: {:?}", parser.errors());

        statements
    }

    fn resolve(source: &str) -> Locals {
        let statements = parse(source);
        match Resolver::new().resolve(&statements) {
            Ok(locals) => locals,
            Err(errors) => panic!("unexpected resolution errors: {:?}", errors),
        }
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        let statements = parse(source);
        match Resolver::new().resolve(&statements) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(ToString::to_string).collect(),
        }
    }

    /// Id of the variable read by the `print` statement at the end of `stmts`,
    /// descending into trailing blocks.
    fn printed_variable(stmts: &[Stmt]) -> ExprId {
        match stmts.last() {
            Some(Stmt::Print(Expr::Variable { id, .. })) => *id,
            Some(Stmt::Block(inner)) => printed_variable(inner),
            other => panic!("expected a print of a variable, got {:?}", other),
        }
    }

    #[test]
    fn test_resolver_01_globals_are_not_recorded() {
        let locals = resolve("var a = 1; print a;");

        assert!(locals.is_empty());
    }

    #[test]
    fn test_resolver_02_block_distances() {
        let source = "{ var a = 1; { { print a; } } }";
        let statements = parse(source);
        let id = printed_variable(&statements);

        let locals = Resolver::new().resolve(&statements).unwrap();

        assert_eq!(locals.get(&id), Some(&2));
    }

    #[test]
    fn test_resolver_03_shadowing_reads_innermost() {
        let source = "{ var a = 1; { var a = 2; print a; } }";
        let statements = parse(source);
        let id = printed_variable(&statements);

        let locals = Resolver::new().resolve(&statements).unwrap();

        assert_eq!(locals.get(&id), Some(&0));
    }

    #[test]
    fn test_resolver_04_function_parameters_share_body_scope() {
        let source = "fun f(x) { print x; }";
        let statements = parse(source);

        let Stmt::Function(decl) = &statements[0] else {
            panic!("expected function");
        };
        let id = printed_variable(&decl.body);

        let locals = Resolver::new().resolve(&statements).unwrap();

        assert_eq!(locals.get(&id), Some(&0));
    }

    #[test]
    fn test_resolver_05_initializer_reads_enclosing_declaration() {
        assert_eq!(resolve_errors("var a = 1; { var a = a + 1; print a; }"), Vec::<String>::new());
        assert_eq!(resolve_errors("{ var a = 1; { var a = a; } }"), Vec::<String>::new());
    }

    #[test]
    fn test_resolver_06_self_reference_without_outer_declaration() {
        assert_eq!(
            resolve_errors("var b = b;"),
            vec!["[line 1] Error at 'b': Can't read local variable in its own initializer."]
        );
        assert_eq!(
            resolve_errors("{ var c = c; }"),
            vec!["[line 1] Error at 'c': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_resolver_07_known_globals_seed_the_fallback() {
        let statements = parse("{ var clock = clock; }");

        assert!(Resolver::new()
            .with_globals(["clock"])
            .resolve(&statements)
            .is_ok());
    }

    #[test]
    fn test_resolver_08_duplicate_local() {
        assert_eq!(
            resolve_errors("{ var a = 1;\n var a = 2; }"),
            vec!["[line 2] Error at 'a': Already a variable with this name in this scope."]
        );
        // Globals may be redeclared.
        assert_eq!(resolve_errors("var a = 1; var a = 2;"), Vec::<String>::new());
    }

    #[test]
    fn test_resolver_09_invalid_returns() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
        assert_eq!(
            resolve_errors("class A { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );
        assert_eq!(resolve_errors("class A { init() { return; } }"), Vec::<String>::new());
    }

    #[test]
    fn test_resolver_10_this_and_super_placement() {
        assert_eq!(
            resolve_errors("print this;"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
        assert_eq!(
            resolve_errors("fun f() { super.g(); }"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );
        assert_eq!(
            resolve_errors("class A { f() { super.f(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );
    }

    #[test]
    fn test_resolver_11_self_inheritance() {
        assert_eq!(
            resolve_errors("class A < A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_resolver_12_collects_every_error() {
        let errors = resolve_errors("return;\nprint this;\n{ var x; var x; }");

        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_resolver_13_resolution_is_idempotent() {
        let statements = parse("fun f(a) { { var b = a; return b; } }");

        let first = Resolver::new().resolve(&statements).unwrap();
        let second = Resolver::new().resolve(&statements).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_resolver_14_method_this_distance() {
        let statements = parse("class A { m() { return this; } }");

        let Stmt::Class { methods, .. } = &statements[0] else {
            panic!("expected class");
        };
        let Some(Stmt::Return {
            value: Some(Expr::This { id, .. }),
            ..
        }) = methods[0].body.first()
        else {
            panic!("expected return this");
        };

        let locals = Resolver::new().resolve(&statements).unwrap();

        // method scope, then the scope binding `this`
        assert_eq!(locals.get(id), Some(&1));
    }
}
