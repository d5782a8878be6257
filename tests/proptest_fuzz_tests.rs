//! Property-based fuzzing tests for the Pigeon scanner, parser and compiler
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. The front end never panics on arbitrary input
//! 2. Literal range checks agree with the type catalog for every type
//! 3. Implicit casts never change signedness or lose width
//! 4. The optimizer reaches a fixpoint in one pass

use pigeon::compiler::types::{self, CastKind, Type, TypeInfo};
use pigeon::compiler::{optimize, CompileOptions, Compiler};
use pigeon::location::Location;
use pigeon::parser::parse_expression;
use pigeon::{Error, Scanner};
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Generate random strings that might break the scanner
fn arbitrary_source_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[\x00-\x7F]{0,300}").unwrap()
}

/// Generate token soup that looks like Pigeon source
fn pigeon_like_string() -> impl Strategy<Value = String> {
    prop::collection::vec(pigeon_token(), 0..60).prop_map(|tokens| tokens.join(" "))
}

fn pigeon_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("(".to_string()),
        Just(")".to_string()),
        Just("{".to_string()),
        Just("}".to_string()),
        Just(";".to_string()),
        Just(",".to_string()),
        Just(":".to_string()),
        // Keywords and types
        Just("if".to_string()),
        Just("else".to_string()),
        Just("while".to_string()),
        Just("return".to_string()),
        Just("void".to_string()),
        Just("i8".to_string()),
        Just("u16".to_string()),
        Just("i32".to_string()),
        Just("u32".to_string()),
        // Operators
        Just("+".to_string()),
        Just("-".to_string()),
        Just("*".to_string()),
        Just("/".to_string()),
        Just("=".to_string()),
        Just("==".to_string()),
        Just("!=".to_string()),
        Just("<".to_string()),
        Just(">=".to_string()),
        // Literals and names
        (-1000i64..1000i64).prop_map(|n| n.to_string()),
        (0u32..0x1_0000u32).prop_map(|n| format!("0x{:X}", n)),
        "[a-z][a-z0-9_]{0,6}".prop_map(|s| s),
        Just("main".to_string()),
        Just("input".to_string()),
        // Comments
        "//[^\n]{0,10}\n".prop_map(|s| s),
    ]
}

/// Additive expressions over two names, small literals and foldable products
fn expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("x".to_string()),
        Just("y".to_string()),
        (0i64..20).prop_map(|n| n.to_string()),
    ];
    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} + {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} - {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} * {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} / {})", a, b)),
            inner.prop_map(|a| format!("-({})", a)),
        ]
    })
}

fn primitive() -> impl Strategy<Value = &'static TypeInfo> {
    (0usize..6).prop_map(|index| types::primitives()[index])
}

/// Values clustered around every type boundary
fn literal_value() -> impl Strategy<Value = i64> {
    prop_oneof![
        -70_000i64..70_000,
        -(1i64 << 33)..(1i64 << 33),
        prop::sample::select(vec![
            -2_147_483_649i64,
            -2_147_483_648,
            -32_769,
            -32_768,
            -129,
            -128,
            -1,
            0,
            127,
            128,
            255,
            256,
            32_767,
            32_768,
            65_535,
            65_536,
            2_147_483_647,
            2_147_483_648,
            4_294_967_295,
            4_294_967_296,
        ]),
    ]
}

fn library() -> Compiler {
    Compiler::new(CompileOptions {
        entry_point: None,
        ..CompileOptions::default()
    })
}

// =============================================================================
// FRONT END ROBUSTNESS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn scanner_never_panics(source in arbitrary_source_string()) {
        let _ = Scanner::new("fuzz", &source).scan_tokens();
    }

    #[test]
    fn compiler_never_panics_on_arbitrary_input(source in arbitrary_source_string()) {
        let _ = Compiler::new(CompileOptions::default()).compile(&source);
    }

    #[test]
    fn compiler_never_panics_on_token_soup(source in pigeon_like_string()) {
        let _ = Compiler::new(CompileOptions::default()).compile(&source);
        let _ = library().compile(&source);
    }

    #[test]
    fn errors_point_into_the_source(source in pigeon_like_string()) {
        if let Err(err) = library().compile(&source) {
            let location = err.location();
            if location.file == "<source>" {
                prop_assert!(location.line >= 1);
                prop_assert!(location.column >= 1);
            }
        }
    }
}

// =============================================================================
// TYPE SYSTEM PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn implicit_literal_range_matches_catalog(ty in primitive(), value in literal_value()) {
        let location = Location::builtin();
        let converted = types::convert_literal(value, None, &Type::from(ty), CastKind::Implicit, &location);
        if ty.contains(value) {
            prop_assert_eq!(converted, Ok(value));
        } else {
            let is_cast_error = matches!(converted, Err(Error::InvalidTypeCast { .. }));
            prop_assert!(is_cast_error);
        }
    }

    #[test]
    fn global_initializers_are_range_checked(ty in primitive(), value in literal_value()) {
        let source = format!("{} v = {};", ty.name, value);
        let mut compiler = library();
        let registered = compiler.register_source(&source);
        prop_assert_eq!(registered.is_ok(), ty.contains(value), "{}", source);
        if registered.is_ok() {
            prop_assert_eq!(compiler.variables()[1].value, value);
        }
    }

    #[test]
    fn explicit_literal_casts_wrap_into_range(ty in primitive(), value in literal_value()) {
        let location = Location::builtin();
        let converted = types::convert_literal(value, None, &Type::from(ty), CastKind::Explicit, &location)
            .unwrap();
        prop_assert!(ty.contains(converted));
        prop_assert_eq!(converted & ty.mask(), value & ty.mask());
    }

    #[test]
    fn implicit_casts_preserve_signedness_and_width(from in primitive(), to in primitive()) {
        let source = format!("{} x = 0; {} y = 0; void f() {{ y = x; }}", from.name, to.name);
        let result = library().compile(&source);

        let legal = from.signed == to.signed && to.size >= from.size;
        prop_assert_eq!(result.is_ok(), legal, "{}", source);
        if let Err(err) = result {
            let is_cast_error = matches!(err, Error::InvalidTypeCast { .. });
            prop_assert!(is_cast_error);
        }
    }

    #[test]
    fn explicit_casts_never_change_signedness(from in primitive(), to in primitive()) {
        let source = format!("{} x = 0; {} y = 0; void f() {{ y = x:{}; }}", from.name, to.name, to.name);
        let result = library().compile(&source);
        prop_assert_eq!(result.is_ok(), from.signed == to.signed, "{}", source);
    }
}

// =============================================================================
// OPTIMIZER PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn optimizer_is_idempotent(source in expression()) {
        let node = parse_expression("fuzz", &source).unwrap();
        let once = optimize(&node);
        let twice = optimize(&once);
        prop_assert_eq!(once.to_string(), twice.to_string(), "{}", source);
    }

    #[test]
    fn literal_only_sums_fold_completely(values in prop::collection::vec(-1000i64..1000, 1..12)) {
        let source = values
            .iter()
            .map(|value| format!("({})", value))
            .collect::<Vec<_>>()
            .join(" + ");
        let node = parse_expression("fuzz", &source).unwrap();
        prop_assert_eq!(optimize(&node).as_integer(), Some(values.iter().sum::<i64>()));
    }
}
