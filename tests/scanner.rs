#[cfg(test)]
mod scanner_tests {
    use pretty_assertions::assert_eq;

    use rox::error::LoxError;
    use rox::scanner::*;
    use rox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(|r| r.ok()).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    fn rendered(source: &str) -> Vec<String> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.iter().map(ToString::to_string).collect()
    }

    fn error_messages(source: &str) -> Vec<String> {
        let (_, errors) = tokenize(source);
        errors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*%})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::PERCENT, "%"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "! != = == < <= > >= /",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "class fun var _tmp orchid super this",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::FUN, "fun"),
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "_tmp"),
                (TokenType::IDENTIFIER, "orchid"),
                (TokenType::SUPER, "super"),
                (TokenType::THIS, "this"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_comments_and_lines() {
        let (tokens, errors) = tokenize("// a comment\nvar x; // trailing\n\nprint x;");

        assert!(errors.is_empty());

        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![2, 2, 2, 4, 4, 4, 4]);
    }

    #[test]
    fn test_scanner_05_number_literals() {
        assert_eq!(
            rendered("42 3.14 2.00 7."),
            vec![
                "NUMBER 42 42.0",
                "NUMBER 3.14 3.14",
                "NUMBER 2.00 2.0",
                "NUMBER 7 7.0",
                "DOT . null",
                "EOF  null",
            ]
        );
    }

    #[test]
    fn test_scanner_06_integral_and_fractional_payloads() {
        let (tokens, _) = tokenize("12 1.5");

        assert!(matches!(
            tokens[0].token_type,
            TokenType::NUMBER(Number::Integer(12))
        ));
        assert!(matches!(
            tokens[1].token_type,
            TokenType::NUMBER(Number::Fraction(f)) if f == 1.5
        ));
    }

    #[test]
    fn test_scanner_07_string_escapes() {
        let (tokens, errors) = tokenize(r#""a\tb\\c\nd" "\101\102" "\q""#);

        assert!(errors.is_empty());

        let strings: Vec<String> = tokens
            .iter()
            .filter_map(|t| match &t.token_type {
                TokenType::STRING(s) => Some(s.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(strings, vec!["a\tb\\c\nd", "AB", "q"]);
    }

    #[test]
    fn test_scanner_08_multiline_string_advances_line() {
        let (tokens, errors) = tokenize("\"one\ntwo\"\nx");

        assert!(errors.is_empty());
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_scanner_09_lexical_errors() {
        assert_eq!(
            error_messages("\"abc"),
            vec!["[line 1] Error: Unterminated string."]
        );
        assert_eq!(
            error_messages(r#""\777""#),
            vec!["[line 1] Error: Octal escape sequence out of bounds."]
        );
        assert_eq!(
            error_messages("99999999999999999999"),
            vec!["[line 1] Error: Number literal out of range."]
        );
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let results: Vec<_> = Scanner::new(source).collect();

        // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            errors,
            vec![
                "[line 1] Error: Unexpected character: $",
                "[line 1] Error: Unexpected character: #",
            ]
        );

        fn assert_token_matches(
            result: &Result<Token, LoxError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_scanner_10_multibyte_unexpected_character() {
        let (tokens, errors) = tokenize("a £ b");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Unexpected character: £");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_scanner_11_rescanning_is_idempotent() {
        let source = "fun f(a) { return a % 2 == 0; }";

        assert_eq!(tokenize(source).0, tokenize(source).0);
    }

    #[test]
    fn test_scanner_12_json_dump() {
        let (tokens, _) = tokenize("x");
        let json = serde_json::to_value(&tokens).unwrap();

        assert_eq!(json[0]["lexeme"], "x");
        assert_eq!(json[0]["line"], 1);
        assert_eq!(json[1]["token_type"], "EOF");
    }
}
