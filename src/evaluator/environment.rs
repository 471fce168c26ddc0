//! Lexical environment frames.
//!
//! A frame holds its own bindings and a shared reference to the enclosing frame.
//! Parent links only point outward, so frames are reclaimed once no closure and no
//! running evaluation holds them. Frames are mutable through shared handles: a
//! `def!` evaluated after a closure was created is visible to that closure.
//!
//! A closure stored into the frame it captured (`(def! f (fn* ...))`) forms an
//! `Rc` cycle. Such frames are never freed; they live as long as the process.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{VARIADIC_MARKER, Value, dismantle};
use crate::evaluator::Arity;
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation};

/// Environment for variable bindings
///
/// Cloning an `Environment` clones the handle, not the frame.
#[derive(Clone, Default)]
pub struct Environment {
    inner: Rc<RefCell<Frame>>,
}

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

// Parent chains and the values bound in them can be arbitrarily deep.
impl Drop for Frame {
    fn drop(&mut self) {
        let values = self.bindings.drain().map(|(_, value)| value).collect();
        let frames = self.parent.take().into_iter().collect();
        dismantle(values, frames);
    }
}

impl Environment {
    /// Create an empty root environment.
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create an empty frame whose parent is `self`.
    pub fn child(&self) -> Self {
        Environment {
            inner: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Create a frame under `parent` binding each parameter name to the matching
    /// argument.
    ///
    /// Without a `&` marker the counts must match exactly. With `a b & rest`, at
    /// least the fixed parameters must be supplied and `rest` is bound to a list of
    /// whatever remains.
    pub fn new_child(
        parent: &Environment,
        params: &[String],
        args: Vec<Value>,
    ) -> Result<Self, Error> {
        let marker = params.iter().position(|p| p == VARIADIC_MARKER);
        let fixed = &params[..marker.unwrap_or(params.len())];

        let arity = match marker {
            Some(_) => Arity::AtLeast(fixed.len()),
            None => Arity::Exact(fixed.len()),
        };
        arity.validate(args.len())?;

        let env = parent.child();
        {
            let mut frame = env.inner.borrow_mut();
            let mut args = args.into_iter();
            for (name, arg) in fixed.iter().zip(args.by_ref()) {
                frame.bindings.insert(name.clone(), arg);
            }
            if let Some(index) = marker {
                let rest = match &params[index + 1..] {
                    [rest] => rest,
                    _ => return Err(Error::syntax("fn*")),
                };
                frame.bindings.insert(rest.clone(), args.collect());
            }
        }
        Ok(env)
    }

    /// Insert or overwrite a binding in this frame only.
    pub fn set(&self, name: &str, value: Value) {
        self.inner.borrow_mut().bindings.insert(name.to_owned(), value);
    }

    /// Look `name` up in this frame, then outward through the parents.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        let mut current = self.clone();
        loop {
            let frame = current.inner.borrow();
            if let Some(value) = frame.bindings.get(name) {
                return Ok(value.clone());
            }
            let parent = frame.parent.clone();
            drop(frame);
            match parent {
                Some(p) => current = p,
                None => return Err(Error::UnresolvedSymbol(name.to_owned())),
            }
        }
    }

    /// If this is the last handle to its frame, move the frame's bindings and
    /// parent onto the work lists.
    pub(crate) fn detach_contents(
        &mut self,
        values: &mut Vec<Value>,
        frames: &mut Vec<Environment>,
    ) {
        if let Some(frame) = Rc::get_mut(&mut self.inner) {
            let frame = frame.get_mut();
            values.extend(frame.bindings.drain().map(|(_, value)| value));
            frames.extend(frame.parent.take());
        }
    }

    /// Check whether `other` is a handle to the same frame.
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a raw native function working directly on the argument vector.
    ///
    /// # Example
    /// ```
    /// use tailwalk::evaluator::create_global_env;
    /// use tailwalk::ast::Value;
    ///
    /// let env = create_global_env();
    /// env.register_native_function("argc", |args: Vec<Value>| {
    ///     Ok(Value::Integer(args.len() as i64))
    /// });
    /// assert!(env.get("argc").is_ok());
    /// ```
    pub fn register_native_function<F>(&self, name: &str, func: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.set(name, Value::native(name, func));
    }

    /// Register a strongly-typed Rust function as a native function using
    /// automatic argument extraction and result conversion.
    ///
    /// ```rust,ignore
    /// fn add(a: i64, b: i64) -> i64 { a + b }
    /// env.register_native_operation("add", add);
    /// ```
    ///
    /// Supported parameter types are `i64`, `bool` and `Value`. The function may
    /// return anything `Into<Value>`, or `Result<R, E>` with `E: Into<Error>`.
    ///
    /// Arity is enforced automatically. Conversion errors yield `TypeError`.
    /// An [`Error`] returned by the function is passed through unchanged, and
    /// string errors become `Error::EvalError`.
    pub fn register_native_operation<F, Args, R>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args, R> + 'static,
    {
        self.set(
            name,
            Value::NativeFunction {
                name: name.to_owned(),
                func: func.into_operation(),
            },
        );
    }

    /// Register a variadic native function with explicit arity metadata.
    ///
    /// The Rust signature ends with an integer rest iterator, optionally after
    /// a fixed `i64` prefix: `fn(IntIter<'_>) -> R` or `fn(i64, IntIter<'_>) -> R`.
    /// `arity` is checked before the function runs.
    pub fn register_variadic_native_operation<F, Args, R>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args, R> + 'static,
    {
        let inner = func.into_variadic_operation();
        self.set(
            name,
            Value::NativeFunction {
                name: name.to_owned(),
                func: Rc::new(move |args: Vec<Value>| {
                    arity.validate(args.len())?;
                    inner(args)
                }),
            },
        );
    }

    /// Get all bindings in this environment and its parents
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();
        let mut current = Some(self.clone());

        // Inner frames first, so they shadow their parents
        while let Some(env) = current {
            let frame = env.inner.borrow();
            for (name, value) in &frame.bindings {
                bindings
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            current = frame.parent.clone();
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.inner.borrow();
        let mut names: Vec<_> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}
