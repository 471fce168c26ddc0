use std::fmt;

use tracing::{debug, trace};

use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::{Value, check_hashmap_len};
use crate::builtinops::get_builtin_ops;

pub mod environment;
pub mod intooperation;
mod special_forms;

pub use environment::Environment;
pub use intooperation::{IntIter, IntRest, ValueIter, ValuesRest};

use special_forms::{SpecialForm, Step};

/// Expected number of arguments for a callable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly N arguments
    Exact(usize),
    /// At least N arguments
    AtLeast(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid for this arity
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_mismatch(*self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Evaluation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum depth of non-tail re-entry into the evaluator.
    /// Tail calls and `let*`/`do`/`if` bodies do not count.
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// Evaluate an expression in `env` with the default limits (public API)
pub fn evaluate(expr: &Value, env: &Environment) -> Result<Value, Error> {
    evaluate_with_config(expr, env, &EvalConfig::default())
}

/// Evaluate an expression in `env` with explicit limits
pub fn evaluate_with_config(
    expr: &Value,
    env: &Environment,
    config: &EvalConfig,
) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, 0, config)
}

/// Structurally evaluate a value that is not being applied.
///
/// Symbols (other than keywords) are looked up, lists, vectors and hashmaps
/// are rebuilt from their evaluated elements (hashmap keys are kept as they
/// are), and every other value evaluates to itself. Special forms are never
/// recognized here; a list passed in is evaluated element by element.
pub fn evaluate_elements(expr: &Value, env: &Environment) -> Result<Value, Error> {
    evaluate_elements_at_depth(expr, env, 0, &EvalConfig::default())
}

/// Call a native function or closure with already-evaluated arguments.
///
/// A closure body runs through the same evaluation loop as an in-language
/// call, so errors propagate to the caller as `Err`.
pub fn apply(callable: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match callable {
        Value::NativeFunction { func, .. } => func(args),
        Value::Closure(closure) => {
            let env = Environment::new_child(&closure.env, &closure.params, args)?;
            evaluate(&closure.body, &env)
        }
        other => Err(Error::NotCallable(other.clone())),
    }
}

/// The evaluation loop.
///
/// Tail positions (`let*`, `do` and `if` bodies, closure bodies) replace the
/// current `(expr, env)` pair and go round the loop again. Only evaluation of
/// sub-forms re-enters this function, and only that increases `depth`.
pub(crate) fn eval_with_depth_tracking(
    expr: &Value,
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Value, Error> {
    if depth >= config.max_depth {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {})",
            config.max_depth
        )));
    }

    let mut expr = expr.clone();
    let mut env = env.clone();

    loop {
        let Value::List(elements) = &expr else {
            return evaluate_elements_at_depth(&expr, &env, depth, config);
        };
        let elements = elements.clone();
        let Some((head, operands)) = elements.split_first() else {
            // The empty list evaluates to itself
            return Ok(expr);
        };

        if let Some(form) = SpecialForm::recognize(head) {
            match form.apply(operands, &env, depth, config)? {
                Step::Done(value) => return Ok(value),
                Step::Continue(next_expr, next_env) => {
                    trace!(form = form.name(), next = %next_expr, "tail position");
                    expr = next_expr;
                    env = next_env;
                    continue;
                }
            }
        }

        let mut evaluated = eval_each(&elements, &env, depth, config)?.into_iter();
        let callee = evaluated.next().unwrap_or(Value::Nil);
        let args: Vec<Value> = evaluated.collect();

        match &callee {
            Value::Closure(closure) => {
                env = Environment::new_child(&closure.env, &closure.params, args)?;
                expr = closure.body.clone();
                trace!(body = %expr, "tail call");
            }
            Value::NativeFunction { func, .. } => return func(args),
            _ => return Err(Error::NotCallable(callee)),
        }
    }
}

fn evaluate_elements_at_depth(
    expr: &Value,
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Value, Error> {
    match expr {
        Value::Symbol(name) if !expr.is_keyword() => env.get(name),
        Value::List(items) => Ok(Value::List(eval_each(items, env, depth, config)?.into())),
        Value::Vector(items) => Ok(Value::Vector(eval_each(items, env, depth, config)?.into())),
        Value::Hashmap(items) => {
            // The variant is public, so an odd-length map can come from host code
            check_hashmap_len(items.len())?;
            let mut evaluated = Vec::with_capacity(items.len());
            for pair in items.chunks_exact(2) {
                if let [key, value] = pair {
                    evaluated.push(key.clone());
                    evaluated.push(eval_with_depth_tracking(value, env, depth + 1, config)?);
                }
            }
            Ok(Value::Hashmap(evaluated.into()))
        }
        _ => Ok(expr.clone()),
    }
}

fn eval_each(
    items: &[Value],
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Vec<Value>, Error> {
    items
        .iter()
        .map(|item| eval_with_depth_tracking(item, env, depth + 1, config))
        .collect()
}

/// Create a root environment holding every builtin native function
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    let ops = get_builtin_ops();
    for op in &ops {
        env.set(op.name, op.to_value());
    }
    debug!(builtins = ops.len(), "created root environment");
    env
}
