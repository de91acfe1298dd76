//! Adapter from the host's `(argc, argv)` calling convention to closures
//! with typed parameters.
//!
//! Parameters are converted with [`FromHost`]; optional ones that the
//! caller left out receive [`Param::missing`], which is `Default::default()`
//! for plain types and a `nil` cell for [`Cell`]. A trailing [`Rest`]
//! parameter collects the arguments past the fixed ones and makes the
//! function variadic.

use std::marker::PhantomData;
use std::slice;

use super::make_module_function;
use crate::config::Boxing;
use crate::convert::{FromHost, IntoHost};
use crate::env::{Cell, Env, Value};
use crate::error::{Error, Result};
use crate::ffi::VARIADIC_ARITY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
    pub variadic: bool,
}

impl Arity {
    /// Maximum arity as passed to the host.
    pub fn host_max(&self) -> isize {
        if self.variadic { VARIADIC_ARITY } else { self.max as isize }
    }

    /// Dispatch slot for a call with `argc` arguments: `argc - min`, with
    /// every count past `max` sharing the last slot of a variadic function.
    pub fn slot(&self, argc: usize) -> Option<usize> {
        if argc < self.min {
            return None;
        }
        if argc > self.max {
            return self.variadic.then(|| self.max - self.min);
        }
        Some(argc - self.min)
    }

    pub fn accepts(&self, argc: usize) -> bool {
        self.slot(argc).is_some()
    }
}

/// Arguments past the fixed parameters of a variadic function.
#[derive(Clone, Copy, Debug)]
pub struct Rest {
    env: Env,
    ptr: *const Value,
    len: usize,
}

impl Rest {
    fn new(env: Env, args: &[Value]) -> Self {
        Self {
            env,
            ptr: args.as_ptr(),
            len: args.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[Value] {
        if self.len == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.as_slice().get(index).map(|&v| self.env.cell(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.as_slice().iter().map(|&v| self.env.cell(v))
    }

    /// Converts every remaining argument.
    pub fn extract<T: FromHost>(&self) -> Result<Vec<T>> {
        self.as_slice().iter().map(|&v| self.env.extract(v)).collect()
    }
}

/// Closures the spreader can drive. `M` is [`Fixed`] or [`Variadic`] over
/// the parameter tuple and only exists to keep the impls apart.
pub trait Spread<M>: 'static {
    /// Fixed parameters after the leading [`Env`].
    const PARAMS: usize;
    const VARIADIC: bool;

    /// Calls the closure with the given arguments. `args` must hold at most
    /// `PARAMS` values unless the closure is variadic.
    fn spread(&self, env: Env, args: &[Value]) -> Result<Value>;
}

pub struct Fixed<A>(PhantomData<A>);
pub struct Variadic<A>(PhantomData<A>);

/// Types a spreader parameter can have.
pub trait Param: FromHost {
    /// Value of an optional parameter the caller left out.
    fn missing(env: Env) -> Self;
}

impl<T: FromHost + Default> Param for T {
    fn missing(_env: Env) -> Self {
        T::default()
    }
}

impl Param for Cell {
    fn missing(env: Env) -> Self {
        env.cell(env.nil())
    }
}

fn param<A: Param>(env: Env, args: &[Value], index: usize) -> Result<A> {
    match args.get(index) {
        Some(&value) => env.extract(value),
        None => Ok(A::missing(env)),
    }
}

macro_rules! impl_spread {
    ($n:expr $(; $($A:ident $idx:tt),+)?) => {
        impl<Func, Ret $($(, $A)+)?> Spread<Fixed<($($($A,)+)?)>> for Func
        where
            Func: Fn(Env $($(, $A)+)?) -> Result<Ret> + 'static,
            Ret: IntoHost,
            $($($A: Param,)+)?
        {
            const PARAMS: usize = $n;
            const VARIADIC: bool = false;

            fn spread(&self, env: Env, args: &[Value]) -> Result<Value> {
                let _ = args;
                let ret = self(env $($(, param::<$A>(env, args, $idx)?)+)?)?;
                ret.into_host(env)
            }
        }

        impl<Func, Ret $($(, $A)+)?> Spread<Variadic<($($($A,)+)?)>> for Func
        where
            Func: Fn(Env $($(, $A)+)?, Rest) -> Result<Ret> + 'static,
            Ret: IntoHost,
            $($($A: Param,)+)?
        {
            const PARAMS: usize = $n;
            const VARIADIC: bool = true;

            fn spread(&self, env: Env, args: &[Value]) -> Result<Value> {
                let rest = Rest::new(env, args.get($n..).unwrap_or(&[]));
                let ret = self(env $($(, param::<$A>(env, args, $idx)?)+)?, rest)?;
                ret.into_host(env)
            }
        }
    };
}

impl_spread!(0);
impl_spread!(1; A 0);
impl_spread!(2; A 0, B 1);
impl_spread!(3; A 0, B 1, C 2);
impl_spread!(4; A 0, B 1, C 2, D 3);
impl_spread!(5; A 0, B 1, C 2, D 3, E 4);
impl_spread!(6; A 0, B 1, C 2, D 3, E 4, G 5);
impl_spread!(7; A 0, B 1, C 2, D 3, E 4, G 5, H 6);
impl_spread!(8; A 0, B 1, C 2, D 3, E 4, G 5, H 6, I 7);

/// A closure with typed parameters on its way to becoming a host function.
pub struct Spreader<F, M> {
    function: F,
    doc: String,
    min_arity: Option<usize>,
    boxing: Boxing,
    _marker: PhantomData<fn() -> M>,
}

/// Starts a [`Spreader`]; every parameter is required until
/// [`Spreader::min_arity`] says otherwise.
pub fn make_spreader_function<F, M>(doc: impl Into<String>, function: F) -> Spreader<F, M>
where
    F: Spread<M>,
{
    Spreader::new(doc, function)
}

impl<F, M> Spreader<F, M>
where
    F: Spread<M>,
{
    pub fn new(doc: impl Into<String>, function: F) -> Self {
        Self {
            function,
            doc: doc.into(),
            min_arity: None,
            boxing: Boxing::DEFAULT,
            _marker: PhantomData,
        }
    }

    /// Number of leading parameters the caller must supply.
    pub fn min_arity(mut self, min: usize) -> Self {
        self.min_arity = Some(min);
        self
    }

    /// Policy for reporting errors raised by the closure.
    pub fn boxing(mut self, boxing: Boxing) -> Self {
        self.boxing = boxing;
        self
    }

    pub fn arity(&self) -> Arity {
        Arity {
            min: self.min_arity.unwrap_or(F::PARAMS),
            max: F::PARAMS,
            variadic: F::VARIADIC,
        }
    }
}

impl<F, M> IntoHost for Spreader<F, M>
where
    F: Spread<M>,
{
    fn into_host(self, env: Env) -> Result<Value> {
        let arity = self.arity();
        if arity.min > arity.max {
            return Err(Error::runtime(format!(
                "Minimum arity {} exceeds the {} declared parameters",
                arity.min, arity.max
            )));
        }
        let Spreader {
            function, doc, boxing, ..
        } = self;
        let invoker = move |env: Env, args: &[Value]| -> Value {
            env.run_catching_with(boxing, || {
                arity.slot(args.len()).ok_or_else(|| Error::runtime("Bad arity"))?;
                function.spread(env, args)
            })
        };
        make_module_function(arity.min as isize, arity.host_max(), doc, invoker).into_host(env)
    }
}
