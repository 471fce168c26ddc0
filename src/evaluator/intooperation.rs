use crate::Error;
use crate::ast::{NativeFn, NumberType, Value};
use crate::evaluator::Arity;
use std::iter::FusedIterator;
use std::rc::Rc;

// =====================================================================
// Fixed-parameter conversion
//
// `FromParam` turns one evaluated argument into a strongly-typed Rust
// parameter. The supported parameter types are listed here so they are
// easy to audit: `Value` itself, plus anything `Value` converts into via
// `TryFrom` in `ast.rs` (`i64`, `bool`).
// =====================================================================

/// Core trait used by the fixed-arity adapters to turn `Value` arguments
/// into strongly-typed parameters.
pub trait FromParam {
    /// The parameter type as seen by the native function.
    type Param<'a>;

    /// Convert a single argument into this parameter type, consuming it.
    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, Value::Nil))
    }
}

impl<T> FromParam for T
where
    Value: TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        std::mem::replace(value, Value::Nil).try_into()
    }
}

/// Normalize both plain values and `Result`-returning functions into `Result<T, Error>`.
pub trait IntoResult<T> {
    fn into_result(self) -> Result<T, Error>;
}

impl<T> IntoResult<T> for T {
    fn into_result(self) -> Result<T, Error> {
        Ok(self)
    }
}

impl<T, E> IntoResult<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn into_result(self) -> Result<T, Error> {
        self.map_err(Into::into)
    }
}

// =====================================================================
// Rest-parameter iterators
// =====================================================================

/// Borrowed iterator over the remaining argument values.
#[derive(Debug, Clone)]
pub struct ValueIter<'a> {
    inner: std::slice::Iter<'a, Value>,
}

impl<'a> ValueIter<'a> {
    pub(crate) fn new(values: &'a [Value]) -> Self {
        ValueIter {
            inner: values.iter(),
        }
    }
}

impl<'a> Iterator for ValueIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ValueIter<'_> {}
impl FusedIterator for ValueIter<'_> {}

/// Borrowed iterator over integer arguments.
///
/// Every element is type-checked once, when the iterator is built, so the
/// native function only ever sees integers.
#[derive(Debug, Clone)]
pub struct IntIter<'a> {
    inner: ValueIter<'a>,
}

impl<'a> IntIter<'a> {
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        if let Some(bad) = values.iter().find(|v| !v.is_integer()) {
            return Err(Error::TypeError(format!(
                "expected integer, got {}",
                bad.type_name()
            )));
        }
        Ok(IntIter {
            inner: ValueIter::new(values),
        })
    }
}

impl Iterator for IntIter<'_> {
    type Item = NumberType;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Value::Integer(n) => Some(*n),
            _ => {
                debug_assert!(false, "IntIter saw non-integer after construction");
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for IntIter<'_> {}
impl FusedIterator for IntIter<'_> {}

/// Builds a rest parameter from the trailing argument slice.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl FromRest for ValueIter<'static> {
    type Param<'a> = ValueIter<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        Ok(ValueIter::new(slice))
    }
}

impl FromRest for IntIter<'static> {
    type Param<'a> = IntIter<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        IntIter::new(slice)
    }
}

/// Marker type used in `Args` tuples to indicate that a parameter
/// position is populated from the variadic "rest" arguments using
/// [`FromRest`].
#[derive(Debug, Clone, Copy)]
pub struct Rest<I>(std::marker::PhantomData<I>);

pub type ValuesRest = Rest<ValueIter<'static>>;
pub type IntRest = Rest<IntIter<'static>>;

/// Convert a strongly-typed Rust function or closure into a [`NativeFn`],
/// parameterized by an argument tuple type.
pub trait IntoOperation<Args, R> {
    fn into_operation(self) -> Rc<NativeFn>;
}

/// Trait for operations registered via the variadic API.
///
/// Implemented for functions whose last parameter is [`ValueIter`] or
/// [`IntIter`], optionally after a fixed prefix of [`FromParam`] parameters.
pub trait IntoVariadicOperation<Args, R> {
    fn into_variadic_operation(self) -> Rc<NativeFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, FR, R, I> IntoVariadicOperation<(Rest<I>,), R> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> FR + 'static,
    FR: IntoResult<R> + 'static,
    R: Into<Value> + 'static,
{
    fn into_variadic_operation(self) -> Rc<NativeFn> {
        Rc::new(move |args: Vec<Value>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            let result: FR = (self)(rest_param);
            let value: R = result.into_result()?;
            Ok(value.into())
        })
    }
}

macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, FR, R, I, $( $A ),+> IntoVariadicOperation<( $( $A, )+ Rest<I>, ), R> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> FR
                + 'static,
            FR: IntoResult<R> + 'static,
            R: Into<Value> + 'static,
        {
            fn into_variadic_operation(self) -> Rc<NativeFn> {
                Rc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            let result: FR = (self)( $( $p ),+, rest_param );
                            let value: R = result.into_result()?;
                            Ok(value.into())
                        }
                        _ => Err(Error::arity_mismatch(Arity::AtLeast($prefix), len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, v0, p0: A1, v1, p1: A2);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Arity is checked up front; the owned argument vector is then
/// destructured into local slots that `FromParam` consumes one by one.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, FR, R, $( $A ),+> IntoOperation<( $( $A, )+ ), R> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> FR + 'static,
            FR: IntoResult<R> + 'static,
            R: Into<Value> + 'static,
            $( $A: FromParam, )+
        {
            fn into_operation(self) -> Rc<NativeFn> {
                Rc::new(move |mut args: Vec<Value>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let result: FR = (self)( $( $p ),+ );
                            let value: R = result.into_result()?;
                            Ok(value.into())
                        }
                        _ => Err(Error::arity_mismatch(Arity::Exact($arity), len)),
                    }
                })
            }
        }
    };
}

impl<F, FR, R> IntoOperation<(), R> for F
where
    F: Fn() -> FR + 'static,
    FR: IntoResult<R> + 'static,
    R: Into<Value> + 'static,
{
    fn into_operation(self) -> Rc<NativeFn> {
        Rc::new(move |args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_mismatch(Arity::Exact(0), args.len()));
            }

            let result: FR = (self)();
            let value: R = result.into_result()?;
            Ok(value.into())
        })
    }
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
impl_into_operation_for_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);
impl_into_operation_for_arity!(4, v0, p0: A1, v1, p1: A2, v2, p2: A3, v3, p3: A4);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    #[test]
    fn test_fixed_arity_conversion_and_errors() {
        fn add(a: i64, b: i64) -> i64 {
            a + b
        }
        let op = IntoOperation::<(i64, i64), i64>::into_operation(add);

        assert_eq!(op(vec![val(2), val(3)]).unwrap(), val(5));
        assert_eq!(
            op(vec![val(2)]).unwrap_err(),
            Error::arity_mismatch(Arity::Exact(2), 1)
        );
        assert!(matches!(
            op(vec![val(2), sym("x")]).unwrap_err(),
            Error::TypeError(_)
        ));
    }

    #[test]
    fn test_result_errors_become_eval_errors() {
        fn checked(n: i64) -> Result<i64, String> {
            if n < 0 { Err("negative".into()) } else { Ok(n) }
        }
        let op = IntoOperation::<(i64,), i64>::into_operation(checked);

        assert_eq!(op(vec![val(4)]).unwrap(), val(4));
        assert_eq!(
            op(vec![val(-1)]).unwrap_err(),
            Error::EvalError("negative".into())
        );
    }

    #[test]
    fn test_zero_arity_and_value_params() {
        let nil = IntoOperation::<(), ()>::into_operation(|| ());
        assert_eq!(nil(vec![]).unwrap(), Value::Nil);
        assert!(nil(vec![val(1)]).is_err());

        fn identity(v: Value) -> Value {
            v
        }
        let identity = IntoOperation::<(Value,), Value>::into_operation(identity);
        assert_eq!(identity(vec![sym("a")]).unwrap(), sym("a"));
    }

    #[test]
    fn test_variadic_rest_only() {
        fn sum(nums: IntIter<'_>) -> i64 {
            nums.sum()
        }
        let op = IntoVariadicOperation::<(IntRest,), i64>::into_variadic_operation(sum);

        assert_eq!(op(vec![]).unwrap(), val(0));
        assert_eq!(op(vec![val(1), val(2), val(3)]).unwrap(), val(6));
        assert!(matches!(
            op(vec![val(1), val(true)]).unwrap_err(),
            Error::TypeError(_)
        ));
    }

    #[test]
    fn test_variadic_prefix_and_rest() {
        fn tagged(first: Value, rest: ValueIter<'_>) -> Value {
            val(vec![first, val(rest.len() as i64)])
        }
        let op = IntoVariadicOperation::<(Value, ValuesRest), Value>::into_variadic_operation(tagged);

        assert_eq!(
            op(vec![sym("x"), val(1), val(false)]).unwrap(),
            val(vec![sym("x"), val(2)])
        );
        assert_eq!(
            op(vec![]).unwrap_err(),
            Error::arity_mismatch(Arity::AtLeast(1), 0)
        );
    }
}
