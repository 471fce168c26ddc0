//! This module defines the core value type of the interpreter. The main enum,
//! [`Value`], is a closed sum over every runtime value: integers, symbols, the
//! three sequence kinds (list, vector, hashmap), `nil`, booleans, native functions
//! and closures. Parsed programs are trees of the same type.
//!
//! Sequences share their backing storage through `Rc<[Value]>`, so cloning a
//! value (which the evaluation loop does constantly) never copies a subtree.
//! Helper functions such as [`val`], [`sym`], [`vector`] and [`hashmap`] are
//! provided for convenient construction in code and tests.
//!
//! The `Display` impl is the printer: it renders the surface syntax the reader
//! accepts, so integer/symbol/list/vector trees round-trip through text.
//!
//! Programs can build data nested far deeper than the host stack allows (a
//! tail-recursive loop wrapping an accumulator in a list, or a chain of closures
//! each capturing the previous one). Printing, comparing and dropping values
//! therefore walk an explicit work list instead of recursing.

use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::Error;
use crate::evaluator::Environment;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Host callable stored in [`Value::NativeFunction`].
///
/// Receives ownership of the evaluated arguments and never sees the calling
/// environment.
pub type NativeFn = dyn Fn(Vec<Value>) -> Result<Value, Error>;

/// Prefix marking a symbol as a self-evaluating keyword
pub const KEYWORD_PREFIX: char = ':';

/// Parameter-list marker introducing a rest parameter
pub const VARIADIC_MARKER: &str = "&";

/// Core value type in interpreter
#[derive(Clone)]
pub enum Value {
    Integer(NumberType),
    /// Symbols; a leading ':' makes a keyword that evaluates to itself
    Symbol(String),
    /// Evaluable form. The empty list evaluates to itself.
    List(Rc<[Value]>),
    /// Never evaluated as a form; elements are evaluated one by one
    Vector(Rc<[Value]>),
    /// Alternating key/value sequence of even length. Keys are not evaluated.
    Hashmap(Rc<[Value]>),
    Nil,
    Boolean(bool),
    /// Host function; compared by identity
    NativeFunction { name: String, func: Rc<NativeFn> },
    /// User-defined function
    Closure(Rc<Closure>),
}

/// A user-defined function: parameter names, body and the environment that was
/// current when the `fn*` form was evaluated.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Value,
    pub env: Environment,
}

impl Value {
    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(elements.into())
    }

    pub fn vector(elements: Vec<Value>) -> Value {
        Value::Vector(elements.into())
    }

    /// Build a hashmap from alternating keys and values.
    pub fn hashmap(elements: Vec<Value>) -> Result<Value, Error> {
        check_hashmap_len(elements.len())?;
        Ok(Value::Hashmap(elements.into()))
    }

    /// Wrap a Rust closure as a native function value.
    pub fn native<F>(name: &str, func: F) -> Value
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    {
        Value::NativeFunction {
            name: name.to_owned(),
            func: Rc::new(func),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_empty_list(&self) -> bool {
        matches!(self, Value::List(elements) if elements.is_empty())
    }

    /// Check whether this value is the symbol `name` (special-form recognition).
    pub fn is_symbol_named(&self, name: &str) -> bool {
        matches!(self, Value::Symbol(s) if s == name)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self, Value::Symbol(s) if s.starts_with(KEYWORD_PREFIX))
    }

    /// A list or vector with an even number of elements (binding vectors, map bodies).
    pub fn is_even_length_iterable(&self) -> bool {
        self.as_sequence()
            .is_some_and(|elements| elements.len() % 2 == 0)
    }

    /// Borrow the elements of a list or vector.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(elements) | Value::Vector(elements) => Some(elements),
            _ => None,
        }
    }

    /// Everything except `nil` and `false` is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Hashmap(_) => "hashmap",
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::NativeFunction { .. } => "native-function",
            Value::Closure(_) => "function",
        }
    }

    /// Move the children of a uniquely owned sequence or closure onto the work
    /// lists, leaving `self` shallow. Shared payloads are left alone.
    fn detach_children(&mut self, values: &mut Vec<Value>, frames: &mut Vec<Environment>) {
        match self {
            Value::List(items) | Value::Vector(items) | Value::Hashmap(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    values.extend(items.iter_mut().map(|item| mem::replace(item, Value::Nil)));
                }
            }
            Value::Closure(closure) => {
                if let Some(closure) = Rc::get_mut(closure) {
                    values.push(mem::replace(&mut closure.body, Value::Nil));
                    frames.push(mem::take(&mut closure.env));
                }
            }
            _ => {}
        }
    }
}

/// Hashmaps hold alternating keys and values.
pub(crate) fn check_hashmap_len(len: usize) -> Result<(), Error> {
    if len % 2 != 0 {
        return Err(Error::TypeError(format!(
            "hashmap requires an even number of elements, got {len}"
        )));
    }
    Ok(())
}

/// Drop values and environment frames one level at a time.
///
/// Each popped item hands its uniquely owned children back to the work lists
/// before it is dropped, so the host stack stays flat however deep the data is.
pub(crate) fn dismantle(mut values: Vec<Value>, mut frames: Vec<Environment>) {
    loop {
        if let Some(mut value) = values.pop() {
            value.detach_children(&mut values, &mut frames);
        } else if let Some(mut env) = frames.pop() {
            env.detach_contents(&mut values, &mut frames);
        } else {
            break;
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        let mut values = Vec::new();
        let mut frames = Vec::new();
        self.detach_children(&mut values, &mut frames);
        dismantle(values, frames);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn elements(f: &mut fmt::Formatter<'_>, tag: &str, items: &[Value]) -> fmt::Result {
            write!(f, "{tag}(")?;
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v:?}")?;
            }
            write!(f, ")")
        }

        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::List(items) => elements(f, "List", items),
            Value::Vector(items) => elements(f, "Vector", items),
            Value::Hashmap(items) => elements(f, "Hashmap", items),
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::NativeFunction { name, .. } => write!(f, "NativeFunction({name})"),
            Value::Closure(closure) => write!(
                f,
                "Closure(params={:?}, body={:?})",
                closure.params, closure.body
            ),
        }
    }
}

/// The printer.
///
/// Symbols print verbatim. A symbol whose name reads back as something else
/// (`nil`, `true`, `false`, an integer, or a name starting with a digit) does not
/// survive a print/read round trip. The reader never produces such symbols; they
/// only arise when host code builds them with [`sym`] or `Value::Symbol`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Piece<'a> {
            Value(&'a Value),
            Text(&'static str),
        }

        let mut pending = vec![Piece::Value(self)];
        while let Some(piece) = pending.pop() {
            let value = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Value(value) => value,
            };

            let (open, items, close) = match value {
                Value::List(items) => ("(", &items[..], ")"),
                Value::Vector(items) => ("[", &items[..], "]"),
                Value::Hashmap(items) => ("{", &items[..], "}"),
                Value::Integer(n) => {
                    write!(f, "{n}")?;
                    continue;
                }
                Value::Symbol(s) => {
                    f.write_str(s)?;
                    continue;
                }
                Value::Nil => {
                    f.write_str("nil")?;
                    continue;
                }
                Value::Boolean(b) => {
                    write!(f, "{b}")?;
                    continue;
                }
                Value::NativeFunction { name, .. } => {
                    write!(f, "#<native-function:{name}>")?;
                    continue;
                }
                Value::Closure(_) => {
                    f.write_str("#<function>")?;
                    continue;
                }
            };

            f.write_str(open)?;
            pending.push(Piece::Text(close));
            for (i, item) in items.iter().enumerate().rev() {
                pending.push(Piece::Value(item));
                if i > 0 {
                    pending.push(Piece::Text(" "));
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            let same = match pair {
                (Value::List(a), Value::List(b))
                | (Value::Vector(a), Value::Vector(b))
                | (Value::Hashmap(a), Value::Hashmap(b)) => {
                    if Rc::ptr_eq(a, b) {
                        continue;
                    }
                    if a.len() != b.len() {
                        return false;
                    }
                    pending.extend(a.iter().zip(b.iter()));
                    continue;
                }
                (Value::Integer(a), Value::Integer(b)) => a == b,
                (Value::Symbol(a), Value::Symbol(b)) => a == b,
                (Value::Nil, Value::Nil) => true,
                (Value::Boolean(a), Value::Boolean(b)) => a == b,
                (
                    Value::NativeFunction { func: f1, .. },
                    Value::NativeFunction { func: f2, .. },
                ) => Rc::ptr_eq(f1, f2),
                (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    }
}

// From trait implementations for Value - enables .into() conversion

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

/// Collecting values builds a fresh list
impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::List(iter.into_iter().collect())
    }
}

// Fallible conversions from `Value` back into primitive Rust types.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(Error::TypeError(format!(
                "expected integer, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<bool, Error> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(Error::TypeError(format!(
                "expected boolean, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Helper function for creating symbols - works great in mixed lists!
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for the nil value
pub fn nil() -> Value {
    Value::Nil
}

/// Helper function for creating vectors
pub fn vector<T: Into<Value>>(items: Vec<T>) -> Value {
    Value::Vector(items.into_iter().map(Into::into).collect())
}

/// Helper function for creating hashmaps from key/value pairs
pub fn hashmap<K: Into<Value>, V: Into<Value>>(pairs: Vec<(K, V)>) -> Value {
    Value::Hashmap(
        pairs
            .into_iter()
            .flat_map(|(k, v)| [k.into(), v.into()])
            .collect(),
    )
}
