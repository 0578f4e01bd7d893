//! End-to-end scenarios through the public API.

use std::collections::HashMap;

use cel::{compile, eval, Value};

fn bindings(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn arithmetic_precedence_and_grouping() {
    let b = HashMap::new();
    assert_eq!(eval("2 + 3 * 4", &b).unwrap(), Value::Int(14));
    assert_eq!(eval("(2 + 3) * 4", &b).unwrap(), Value::Int(20));
}

#[test]
fn integer_division_yields_a_double() {
    let b = HashMap::new();
    assert_eq!(eval("10 / 3", &b).unwrap(), Value::Double(10.0 / 3.0));
}

#[test]
fn string_concatenation_with_a_binding() {
    let b = bindings(&[("name", Value::string("World"))]);
    assert_eq!(
        eval(r#""Hello, " + name"#, &b).unwrap(),
        Value::string("Hello, World")
    );
}

#[test]
fn ternary_with_bindings() {
    let b = bindings(&[("age", Value::Int(25)), ("hasLicense", Value::Bool(true))]);
    assert_eq!(
        eval(
            r#"age >= 18 && hasLicense ? "can drive" : "cannot drive""#,
            &b
        )
        .unwrap(),
        Value::string("can drive")
    );
}

#[test]
fn filter_then_map_chain() {
    let b = HashMap::new();
    assert_eq!(
        eval("[1, 2, 3, 4, 5].filter(x, x > 2).map(x, x * 10)", &b).unwrap(),
        Value::list(vec![Value::Int(30), Value::Int(40), Value::Int(50)])
    );
}

#[test]
fn has_on_maps() {
    let program = compile(r#"has(user, "email")"#).unwrap();

    let mut present = cel::ValueMap::new();
    present.insert(Value::string("name"), Value::string("Alice"));
    present.insert(Value::string("email"), Value::string("a@b"));
    let b1 = bindings(&[("user", Value::map(present))]);
    assert_eq!(program.evaluate(&b1).unwrap(), Value::Bool(true));

    let mut missing = cel::ValueMap::new();
    missing.insert(Value::string("name"), Value::string("Alice"));
    let b2 = bindings(&[("user", Value::map(missing))]);
    assert_eq!(program.evaluate(&b2).unwrap(), Value::Bool(false));
}

#[test]
fn matches_regex() {
    let b = HashMap::new();
    assert_eq!(
        eval(r#"matches("test@example.com", ".*@.*")"#, &b).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn division_by_zero_and_undefined_variable_are_errors() {
    let b = HashMap::new();
    assert!(eval("1 / 0", &b).is_err());

    let only_x = bindings(&[("x", Value::Int(1))]);
    assert!(eval("x + y", &only_x).is_err());
}

#[test]
fn all_and_exists_short_circuit() {
    let b = HashMap::new();
    assert_eq!(
        eval("[2,4,6].all(x, x % 2 == 0)", &b).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval("[1,3,5].exists(x, x % 2 == 0)", &b).unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn string_escape_scenarios() {
    let b = HashMap::new();
    // Raw string: backslash-n stays two characters.
    assert_eq!(eval(r#"r"\n""#, &b).unwrap(), Value::string("\\n"));
    // Interpreted string: decodes to an actual newline.
    assert_eq!(eval(r#""\n""#, &b).unwrap(), Value::string("\n"));
    // Octal escape \101 is 'A'.
    assert_eq!(eval(r#""\101""#, &b).unwrap(), Value::string("A"));
}

#[test]
fn hex_and_negative_hex_literals() {
    let b = HashMap::new();
    assert_eq!(eval("0x10 == 16", &b).unwrap(), Value::Bool(true));
    assert_eq!(eval("-0x10 == -16", &b).unwrap(), Value::Bool(true));
}

#[test]
fn macro_hygiene_survives_an_error_inside_the_body() {
    let b = bindings(&[("x", Value::Int(7))]);
    // The body divides by zero on the second element; the macro must still
    // not have leaked its own `x` binding into the surrounding failure.
    let result = eval("[1, 0].map(x, 10 / x)", &b);
    assert!(result.is_err());
}

#[test]
fn structural_equality_of_lists_and_maps_is_order_independent_for_maps() {
    let b = HashMap::new();
    assert_eq!(
        eval("[1, 2, 3] == [1, 2, 3]", &b).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"{"a": 1, "b": 2} == {"b": 2, "a": 1}"#, &b).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn exists_one_counts_matches() {
    let b = HashMap::new();
    assert_eq!(
        eval("[1, 2, 3].existsOne(x, x == 2)", &b).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval("[1, 2, 2, 3].existsOne(x, x == 2)", &b).unwrap(),
        Value::Bool(false)
    );
}
