//! Special-form dispatch.
//!
//! A non-empty list whose head is one of the reserved symbols is handled here
//! instead of being applied as a function. Each handler receives the operands
//! unevaluated and returns a [`Step`]: either a finished value, or the next
//! `(expression, environment)` pair for the evaluation loop to continue with.
//! Returning the tail position instead of evaluating it is what keeps `let*`,
//! `do` and `if` bodies off the host stack.

use std::rc::Rc;

use tracing::debug;

use crate::Error;
use crate::ast::{Closure, VARIADIC_MARKER, Value};
use crate::evaluator::{EvalConfig, Environment, eval_with_depth_tracking};

/// Outcome of one special-form step
#[derive(Debug)]
pub(crate) enum Step {
    /// The form produced its value
    Done(Value),
    /// Evaluate this expression in this environment next (tail position)
    Continue(Value, Environment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpecialForm {
    Def,
    Let,
    Do,
    If,
    Fn,
}

impl SpecialForm {
    /// Recognize a reserved head symbol.
    pub(crate) fn recognize(head: &Value) -> Option<Self> {
        let Value::Symbol(name) = head else {
            return None;
        };
        match name.as_str() {
            "def!" => Some(SpecialForm::Def),
            "let*" => Some(SpecialForm::Let),
            "do" => Some(SpecialForm::Do),
            "if" => Some(SpecialForm::If),
            "fn*" | "λ" => Some(SpecialForm::Fn),
            _ => None,
        }
    }

    /// Canonical name, used in syntax errors and diagnostics
    pub(crate) fn name(self) -> &'static str {
        match self {
            SpecialForm::Def => "def!",
            SpecialForm::Let => "let*",
            SpecialForm::Do => "do",
            SpecialForm::If => "if",
            SpecialForm::Fn => "fn*",
        }
    }

    pub(crate) fn apply(
        self,
        operands: &[Value],
        env: &Environment,
        depth: usize,
        config: &EvalConfig,
    ) -> Result<Step, Error> {
        match self {
            SpecialForm::Def => eval_def(operands, env, depth, config),
            SpecialForm::Let => eval_let(operands, env, depth, config),
            SpecialForm::Do => eval_do(operands, env, depth, config),
            SpecialForm::If => eval_if(operands, env, depth, config),
            SpecialForm::Fn => eval_fn(operands, env),
        }
    }
}

/// `(def! name expr)`: bind in the current frame and yield the value.
fn eval_def(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Step, Error> {
    let [Value::Symbol(name), expr] = operands else {
        return Err(Error::syntax(SpecialForm::Def.name()));
    };
    let value = eval_with_depth_tracking(expr, env, depth + 1, config)?;
    debug!(name = %name, value = %value, "def!");
    env.set(name, value.clone());
    Ok(Step::Done(value))
}

/// `(let* (name expr ...) body)`: sequential bindings in a fresh child frame.
fn eval_let(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Step, Error> {
    let [bindings, body] = operands else {
        return Err(Error::syntax(SpecialForm::Let.name()));
    };
    let Some(pairs) = bindings
        .as_sequence()
        .filter(|_| bindings.is_even_length_iterable())
    else {
        return Err(Error::syntax(SpecialForm::Let.name()));
    };

    let scope = env.child();
    for pair in pairs.chunks_exact(2) {
        let [Value::Symbol(name), expr] = pair else {
            return Err(Error::syntax(SpecialForm::Let.name()));
        };
        // Earlier bindings are already visible here
        let value = eval_with_depth_tracking(expr, &scope, depth + 1, config)?;
        scope.set(name, value);
    }
    Ok(Step::Continue(body.clone(), scope))
}

/// `(do expr ... last)`: everything but the last operand for effect.
fn eval_do(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Step, Error> {
    let [init @ .., last] = operands else {
        return Err(Error::syntax(SpecialForm::Do.name()));
    };
    for expr in init {
        eval_with_depth_tracking(expr, env, depth + 1, config)?;
    }
    Ok(Step::Continue(last.clone(), env.clone()))
}

/// `(if cond then)` or `(if cond then else)`
fn eval_if(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    config: &EvalConfig,
) -> Result<Step, Error> {
    let (condition, then_branch, else_branch) = match operands {
        [condition, then_branch] => (condition, then_branch, None),
        [condition, then_branch, else_branch] => (condition, then_branch, Some(else_branch)),
        _ => return Err(Error::syntax(SpecialForm::If.name())),
    };

    let chosen = if eval_with_depth_tracking(condition, env, depth + 1, config)?.is_truthy() {
        then_branch
    } else if let Some(else_branch) = else_branch {
        else_branch
    } else {
        return Ok(Step::Done(Value::Nil));
    };
    Ok(Step::Continue(chosen.clone(), env.clone()))
}

/// `(fn* (params ...) body)`: capture the current frame. Operands after the
/// body are ignored.
fn eval_fn(operands: &[Value], env: &Environment) -> Result<Step, Error> {
    let [param_list, body, ..] = operands else {
        return Err(Error::syntax(SpecialForm::Fn.name()));
    };
    let Some(param_exprs) = param_list.as_sequence() else {
        return Err(Error::syntax(SpecialForm::Fn.name()));
    };

    let mut params = Vec::with_capacity(param_exprs.len());
    for param in param_exprs {
        match param {
            Value::Symbol(name) => params.push(name.clone()),
            _ => return Err(Error::syntax(SpecialForm::Fn.name())),
        }
    }

    // `&` must be followed by exactly one name
    if let Some(marker) = params.iter().position(|p| p == VARIADIC_MARKER)
        && (params.len() != marker + 2 || params[marker + 1] == VARIADIC_MARKER)
    {
        return Err(Error::syntax(SpecialForm::Fn.name()));
    }

    Ok(Step::Done(Value::Closure(Rc::new(Closure {
        params,
        body: body.clone(),
        env: env.clone(),
    }))))
}
