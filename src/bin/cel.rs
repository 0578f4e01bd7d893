//! Thin CLI wrapping the `cel` library: `cel <expression> [name=value]…`.
//! Kept deliberately small — it exists to exercise `compile`/`evaluate`
//! end-to-end, not to grow its own logic. See DESIGN.md for what this is
//! grounded on.

use std::collections::HashMap;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use cel::Value;

#[derive(ClapParser)]
#[command(name = "cel", about = "Evaluate a Common Expression Language expression")]
struct Cli {
    /// The expression to evaluate.
    expression: String,

    /// Bindings in `name=value` form, classified as int, double, bool, or
    /// string by trying each parse in that order.
    bindings: Vec<String>,
}

fn parse_binding(raw: &str) -> Result<(String, Value), String> {
    let (name, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("binding '{raw}' is not in name=value form"))?;
    let value = classify(text);
    Ok((name.to_string(), value))
}

fn classify(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(d) = text.parse::<f64>() {
        return Value::Double(d);
    }
    if let Ok(b) = text.parse::<bool>() {
        return Value::Bool(b);
    }
    Value::string(text)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut bindings = HashMap::new();
    for raw in &cli.bindings {
        match parse_binding(raw) {
            Ok((name, value)) => {
                bindings.insert(name, value);
            }
            Err(message) => {
                eprintln!("Parse error: {message}");
                return ExitCode::FAILURE;
            }
        }
    }

    let program = match cel::compile(&cli.expression) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Parse error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match program.evaluate(&bindings) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Evaluation error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_in_int_double_bool_string_order() {
        assert_eq!(classify("42"), Value::Int(42));
        assert_eq!(classify("3.5"), Value::Double(3.5));
        assert_eq!(classify("true"), Value::Bool(true));
        assert_eq!(classify("hello"), Value::string("hello"));
    }

    #[test]
    fn parse_binding_splits_on_first_equals() {
        let (name, value) = parse_binding("age=25").unwrap();
        assert_eq!(name, "age");
        assert_eq!(value, Value::Int(25));
    }

    #[test]
    fn parse_binding_rejects_missing_equals() {
        assert!(parse_binding("age").is_err());
    }
}
