//! Shared helpers for the integration tests.
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#[allow(unused_imports)]
pub use tailwalk::ast::{Value, sym, val, vector};
pub use tailwalk::evaluator::{Environment, create_global_env, evaluate};
pub use tailwalk::reader::parse;
pub use tailwalk::{Error, rep};

/// Read and evaluate one form in a fresh global environment.
#[allow(dead_code)]
pub fn eval_str(source: &str) -> Result<Value, Error> {
    eval_str_with_env(source, &create_global_env())
}

/// Read and evaluate one form in `env`. Blank input evaluates to nil.
pub fn eval_str_with_env(source: &str, env: &Environment) -> Result<Value, Error> {
    match parse(source)? {
        Some(expr) => evaluate(&expr, env),
        None => Ok(Value::Nil),
    }
}

/// Feed each line through `rep` in one shared session, the way the REPL
/// does, rendering errors with their display text.
#[allow(dead_code)]
pub fn session(lines: &[&str]) -> Vec<String> {
    let env = create_global_env();
    lines
        .iter()
        .map(|line| rep(line, &env).unwrap_or_else(|e| format!("Error: {e}")))
        .collect()
}

/// Assert that `source` evaluates to something printing as `expected`.
#[macro_export]
macro_rules! assert_prints {
    ($env:expr, $source:expr, $expected:expr) => {
        match $crate::common::eval_str_with_env($source, $env) {
            Ok(value) => assert_eq!(value.to_string(), $expected, "evaluating {}", $source),
            Err(e) => panic!("evaluating {} failed: {e}", $source),
        }
    };
}
