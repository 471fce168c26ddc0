//! Built-in native functions installed in the root environment.
//!
//! ```text
//! (+ 1 2 3)        ; 6
//! (- 10 3 2)       ; 5, folds from the first argument
//! (/ 20 2 5)       ; 2, truncating
//! (< 1 2 3)        ; true, chained
//! (count [1 2])    ; 2
//! ```
//!
//! ## Error Handling
//!
//! - **Type Safety**: arithmetic and comparison reject non-integers with `TypeError`
//! - **Overflow Detection**: checked arithmetic reports overflow as `EvalError`
//! - **Arity Checking**: every operation declares its arity and validates it
//!   before running
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** as a typed Rust function (`i64`, `bool` or
//!    `Value` parameters, optionally ending in an [`IntIter`] / [`ValueIter`]
//!    rest parameter)
//! 2. **Add it to the registry** below with its name and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::collections::HashMap;
use std::rc::Rc;

use crate::Error;
use crate::ast::{NativeFn, NumberType, Value};
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation};
use crate::evaluator::{Arity, IntIter, IntRest, ValueIter, ValuesRest};

/// Definition of a built-in operation
#[derive(Clone)]
pub struct BuiltinOp {
    /// The name bound in the root environment
    pub name: &'static str,
    /// The implementation, arity check included
    pub func: Rc<NativeFn>,
    /// Expected number of arguments
    pub arity: Arity,
}

impl BuiltinOp {
    /// The native function value bound under [`BuiltinOp::name`]
    pub fn to_value(&self) -> Value {
        Value::NativeFunction {
            name: self.name.to_owned(),
            func: Rc::clone(&self.func),
        }
    }
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

//
// Builtin Function Implementations
//

fn overflow(op: &str) -> Error {
    Error::EvalError(format!("Integer overflow in {op}"))
}

fn builtin_add(first: NumberType, mut rest: IntIter<'_>) -> Result<NumberType, Error> {
    rest.try_fold(first, |acc, n| {
        acc.checked_add(n).ok_or_else(|| overflow("addition"))
    })
}

/// Left fold from the first argument; a single argument is returned as is.
fn builtin_sub(first: NumberType, mut rest: IntIter<'_>) -> Result<NumberType, Error> {
    rest.try_fold(first, |acc, n| {
        acc.checked_sub(n).ok_or_else(|| overflow("subtraction"))
    })
}

fn builtin_mul(first: NumberType, mut rest: IntIter<'_>) -> Result<NumberType, Error> {
    rest.try_fold(first, |acc, n| {
        acc.checked_mul(n).ok_or_else(|| overflow("multiplication"))
    })
}

fn builtin_div(first: NumberType, mut rest: IntIter<'_>) -> Result<NumberType, Error> {
    rest.try_fold(first, |acc, n| {
        if n == 0 {
            return Err(Error::EvalError("Division by zero".into()));
        }
        acc.checked_div(n).ok_or_else(|| overflow("division"))
    })
}

// Chained comparisons: every adjacent pair must satisfy the operator
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(first: NumberType, rest: IntIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !(prev $op current) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

fn builtin_list(args: ValueIter<'_>) -> Value {
    args.cloned().collect()
}

fn builtin_is_list(value: Value) -> bool {
    value.is_list()
}

fn builtin_is_empty(value: Value) -> Result<bool, Error> {
    match &value {
        Value::List(items) | Value::Vector(items) | Value::Hashmap(items) => Ok(items.is_empty()),
        Value::Nil => Ok(true),
        other => Err(Error::TypeError(format!(
            "empty? expects a sequence, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_count(value: Value) -> Result<NumberType, Error> {
    match &value {
        Value::List(items) | Value::Vector(items) => Ok(items.len() as NumberType),
        Value::Hashmap(items) => Ok((items.len() / 2) as NumberType),
        Value::Nil => Ok(0),
        other => Err(Error::TypeError(format!(
            "count expects a sequence, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

/// Erase a fixed-arity typed function.
fn fixed<Args, R, F>(name: &'static str, arity: Arity, f: F) -> BuiltinOp
where
    F: IntoOperation<Args, R>,
{
    BuiltinOp {
        name,
        func: f.into_operation(),
        arity,
    }
}

/// Erase a variadic typed function, checking `arity` before it runs.
fn variadic<Args, R, F>(name: &'static str, arity: Arity, f: F) -> BuiltinOp
where
    F: IntoVariadicOperation<Args, R>,
{
    let inner = f.into_variadic_operation();
    BuiltinOp {
        name,
        func: Rc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        }),
        arity,
    }
}

fn build_builtin_ops() -> Vec<BuiltinOp> {
    vec![
        variadic::<(NumberType, IntRest), NumberType, _>("+", Arity::AtLeast(1), builtin_add),
        variadic::<(NumberType, IntRest), NumberType, _>("-", Arity::AtLeast(1), builtin_sub),
        variadic::<(NumberType, IntRest), NumberType, _>("*", Arity::AtLeast(1), builtin_mul),
        variadic::<(NumberType, IntRest), NumberType, _>("/", Arity::AtLeast(1), builtin_div),
        variadic::<(NumberType, IntRest), bool, _>("=", Arity::AtLeast(2), builtin_eq),
        variadic::<(NumberType, IntRest), bool, _>("<", Arity::AtLeast(2), builtin_lt),
        variadic::<(NumberType, IntRest), bool, _>(">", Arity::AtLeast(2), builtin_gt),
        variadic::<(NumberType, IntRest), bool, _>("<=", Arity::AtLeast(2), builtin_le),
        variadic::<(NumberType, IntRest), bool, _>(">=", Arity::AtLeast(2), builtin_ge),
        variadic::<(ValuesRest,), Value, _>("list", Arity::Any, builtin_list),
        fixed::<(Value,), bool, _>("list?", Arity::Exact(1), builtin_is_list),
        fixed::<(Value,), bool, _>("empty?", Arity::Exact(1), builtin_is_empty),
        fixed::<(Value,), NumberType, _>("count", Arity::Exact(1), builtin_count),
        fixed::<(Value,), bool, _>("not", Arity::Exact(1), builtin_not),
    ]
}

thread_local! {
    /// Registry of all built-in operations, built once per thread.
    ///
    /// Native functions are reference counted without atomics, so the
    /// registry cannot be a process-wide static. Root environments created on
    /// the same thread share the same function values.
    static BUILTIN_OPS: Vec<BuiltinOp> = build_builtin_ops();

    static BUILTIN_INDEX: HashMap<&'static str, usize> = BUILTIN_OPS.with(|ops| {
        ops.iter().enumerate().map(|(i, op)| (op.name, i)).collect()
    });
}

/// Get all builtin operations (for use by the evaluator)
pub fn get_builtin_ops() -> Vec<BuiltinOp> {
    BUILTIN_OPS.with(Clone::clone)
}

/// Find a builtin operation by name
pub fn find_builtin_op(name: &str) -> Option<BuiltinOp> {
    let index = BUILTIN_INDEX.with(|index| index.get(name).copied())?;
    BUILTIN_OPS.with(|ops| ops.get(index).cloned())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{hashmap, nil, sym, val, vector};

    /// Micro-helper for success cases in data-driven tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a builtin through the registry using the erased signature
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin_op(name).unwrap();
        (op.func)(args.to_vec())
    }

    #[test]
    fn test_builtin_ops_registry() {
        let add = find_builtin_op("+").unwrap();
        assert_eq!(add.arity, Arity::AtLeast(1));
        assert_eq!((add.func)(vec![val(1), val(2)]).unwrap(), val(3));

        let not = find_builtin_op("not").unwrap();
        assert_eq!(not.arity, Arity::Exact(1));

        assert!(find_builtin_op("def!").is_none());
        assert!(find_builtin_op("car").is_none());

        let all = get_builtin_ops();
        let names: Vec<_> = all.iter().map(|op| op.name).collect();
        for required in ["+", "-", "*", "/"] {
            assert!(names.contains(&required), "missing {required}");
        }
        let mut unique = names.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), names.len(), "duplicate builtin names");

        // Same function value on every lookup within a thread
        assert_eq!(add.to_value(), find_builtin_op("+").unwrap().to_value());
        assert_eq!(add.to_value().to_string(), "#<native-function:+>");
    }

    #[test]
    fn test_builtins_data_driven() {
        let cases: Vec<(&str, Vec<Value>, Option<Value>)> = vec![
            // Arithmetic folds from the first argument
            ("+", vec![val(1), val(2), val(3)], success(6)),
            ("+", vec![val(42)], success(42)),
            ("+", vec![val(-5), val(10)], success(5)),
            ("-", vec![val(10), val(3), val(2)], success(5)),
            ("-", vec![val(10)], success(10)),
            ("-", vec![val(0), val(10)], success(-10)),
            ("*", vec![val(2), val(3), val(4)], success(24)),
            ("*", vec![val(7)], success(7)),
            ("/", vec![val(20), val(2), val(5)], success(2)),
            ("/", vec![val(7), val(2)], success(3)),
            ("/", vec![val(-7), val(2)], success(-3)),
            ("/", vec![val(9)], success(9)),
            // Arity, type and overflow errors
            ("+", vec![], None),
            ("-", vec![], None),
            ("/", vec![val(1), val(0)], None),
            ("/", vec![val(i64::MIN), val(-1)], None),
            ("+", vec![val(i64::MAX), val(1)], None),
            ("-", vec![val(i64::MIN), val(1)], None),
            ("*", vec![val(i64::MAX / 2 + 1), val(2)], None),
            ("+", vec![val(1), sym("a")], None),
            ("+", vec![val(true)], None),
            // Chained comparisons
            ("=", vec![val(5), val(5)], success(true)),
            ("=", vec![val(5), val(5), val(6)], success(false)),
            ("<", vec![val(1), val(2), val(3)], success(true)),
            ("<", vec![val(1), val(3), val(2)], success(false)),
            (">", vec![val(3), val(2), val(1)], success(true)),
            ("<=", vec![val(1), val(1), val(2)], success(true)),
            (">=", vec![val(2), val(2), val(3)], success(false)),
            ("=", vec![val(1)], None),
            ("<", vec![val(1), Value::Nil], None),
            // Lists and predicates
            ("list", vec![], success(Vec::<Value>::new())),
            ("list", vec![val(1), sym("a")], success(vec![val(1), sym("a")])),
            ("list?", vec![val([1])], success(true)),
            ("list?", vec![vector(vec![1])], success(false)),
            ("list?", vec![Value::Nil], success(false)),
            ("list?", vec![], None),
            ("empty?", vec![val(Vec::<Value>::new())], success(true)),
            ("empty?", vec![vector(vec![1])], success(false)),
            ("empty?", vec![Value::Nil], success(true)),
            ("empty?", vec![val(0)], None),
            ("count", vec![val([1, 2, 3])], success(3)),
            ("count", vec![vector(Vec::<Value>::new())], success(0)),
            ("count", vec![hashmap(vec![(sym(":a"), 1), (sym(":b"), 2)])], success(2)),
            ("count", vec![nil()], success(0)),
            ("count", vec![sym("x")], None),
            ("not", vec![Value::Nil], success(true)),
            ("not", vec![val(false)], success(true)),
            ("not", vec![val(0)], success(false)),
            ("not", vec![val(Vec::<Value>::new())], success(false)),
            ("not", vec![val(true), val(true)], None),
        ];

        for (i, (name, args, expected)) in cases.into_iter().enumerate() {
            let result = call_builtin(name, &args);
            match expected {
                Some(expected) => assert_eq!(
                    result.unwrap_or_else(|e| panic!("#{} ({name} {args:?}) failed: {e}", i + 1)),
                    expected,
                    "#{} ({name} {args:?})",
                    i + 1
                ),
                None => assert!(result.is_err(), "#{} ({name} {args:?}) should fail", i + 1),
            }
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            call_builtin("+", &[]).unwrap_err(),
            Error::arity_mismatch(Arity::AtLeast(1), 0)
        );
        assert_eq!(
            call_builtin("<", &[val(1)]).unwrap_err(),
            Error::arity_mismatch(Arity::AtLeast(2), 1)
        );
        assert_eq!(
            call_builtin("/", &[val(1), val(0)]).unwrap_err(),
            Error::EvalError("Division by zero".into())
        );
        assert_eq!(
            call_builtin("*", &[val(i64::MAX), val(2)]).unwrap_err(),
            Error::EvalError("Integer overflow in multiplication".into())
        );
        assert!(matches!(
            call_builtin("-", &[sym("x")]).unwrap_err(),
            Error::TypeError(_)
        ));
        assert_eq!(
            call_builtin("count", &[]).unwrap_err(),
            Error::arity_mismatch(Arity::Exact(1), 0)
        );
    }
}
