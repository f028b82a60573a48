//! Fuzz tests for lexer, parser, and compiler crash resistance.
//!
//! These tests use property-based testing to verify that the front end never
//! panics on any input, even malformed or adversarial inputs.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::token::TokenKind;
    use crate::vm::{NoHost, Vm};
    use crate::{Lexer, compile_function, compile_program, parse_program};

    /// Tokenize all input using the lexer (helper function).
    fn tokenize_all(input: &str) {
        let mut lexer = Lexer::new(input);
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
        }
    }

    // ==========================================================================
    // Arbitrary String Generators
    // ==========================================================================

    /// Strategy for generating completely random strings (potential garbage).
    fn arbitrary_string() -> impl Strategy<Value = String> {
        prop::collection::vec(any::<char>(), 0..1000).prop_map(|chars| chars.into_iter().collect())
    }

    /// Strategy for generating strings with script-like structure.
    fn script_like_string() -> impl Strategy<Value = String> {
        let atom = prop_oneof![
            "[0-9]+(\\.[0-9]+)?".prop_map(String::from),
            "[a-z$][a-zA-Z0-9_]*".prop_map(String::from),
            "'[^'\\\\]*'".prop_map(String::from),
            "(true|false|null|this)".prop_map(String::from),
            "(var|function|return|if|else|while|for|break|typeof)".prop_map(String::from),
        ];

        let punct = prop_oneof![
            Just("(".to_string()),
            Just(")".to_string()),
            Just("{".to_string()),
            Just("}".to_string()),
            Just("[".to_string()),
            Just("]".to_string()),
            Just(".".to_string()),
            Just(",".to_string()),
            Just(";".to_string()),
            Just(" = ".to_string()),
            Just(" + ".to_string()),
            Just(" && ".to_string()),
            Just(" ? ".to_string()),
            Just(" : ".to_string()),
            Just("++".to_string()),
            Just(" ".to_string()),
            Just("\n".to_string()),
        ];

        prop::collection::vec(prop_oneof![atom, punct], 0..100).prop_map(|parts| parts.join(""))
    }

    /// Strategy for deeply nested parentheses and brackets.
    fn deep_nesting() -> impl Strategy<Value = String> {
        (1usize..600, prop_oneof![Just('('), Just('['), Just('{')]).prop_map(|(depth, open)| {
            let mut s = String::with_capacity(depth * 2 + 1);
            for _ in 0..depth {
                s.push(open);
            }
            s.push('1');
            s
        })
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn lexer_never_panics(input in arbitrary_string()) {
            tokenize_all(&input);
        }

        #[test]
        fn parser_never_panics_on_garbage(input in arbitrary_string()) {
            let _ = parse_program(&input);
        }

        #[test]
        fn compiler_never_panics_on_script_like_input(input in script_like_string()) {
            let _ = compile_program(&input);
            let _ = compile_function(&input);
        }

        #[test]
        fn deep_nesting_is_rejected_not_overflowed(input in deep_nesting()) {
            let _ = parse_program(&input);
        }

        #[test]
        fn numeric_literals_evaluate_to_themselves(n in 0u32..1_000_000) {
            let mut vm = Vm::new();
            let value = vm.eval(&n.to_string(), &mut NoHost).expect("eval");
            prop_assert_eq!(value, crate::Value::Number(f64::from(n)));
        }
    }
}
