//! Registering native closures as host functions.

use std::ffi::CString;

use crate::convert::IntoHost;
use crate::env::{Env, Value};
use crate::error::Result;

mod repr;
mod spread;

pub use repr::{Representation, fits_inline};
pub use spread::{Arity, Fixed, Param, Rest, Spread, Spreader, Variadic, make_spreader_function};

#[cfg(test)]
mod spread_test;

/// A closure ready to become a host function. The closure receives the
/// raw argument array and must produce a value; panics are reported to
/// the host as errors.
pub struct ModuleFunction<F> {
    min_arity: isize,
    max_arity: isize,
    doc: String,
    inline: bool,
    function: F,
}

/// Wraps `function` for registration. Zero-sized closures are stored in the
/// function's data slot; anything else is moved to the heap and released by
/// a host finalizer.
pub fn make_module_function<F>(min_arity: isize, max_arity: isize, doc: impl Into<String>, function: F) -> ModuleFunction<F>
where
    F: Fn(Env, &[Value]) -> Value + 'static,
{
    ModuleFunction {
        min_arity,
        max_arity,
        doc: doc.into(),
        inline: size_of::<F>() == 0,
        function,
    }
}

/// Like [`make_module_function`] but stores the closure bit for bit in the
/// data slot. The closure must fit in a pointer; this is checked at compile
/// time.
pub fn make_inline_module_function<F>(
    min_arity: isize,
    max_arity: isize,
    doc: impl Into<String>,
    function: F,
) -> ModuleFunction<F>
where
    F: Fn(Env, &[Value]) -> Value + Copy + 'static,
{
    const { assert!(fits_inline::<F>(), "closure does not fit in the function data slot") };
    ModuleFunction {
        min_arity,
        max_arity,
        doc: doc.into(),
        inline: true,
        function,
    }
}

impl<F> ModuleFunction<F>
where
    F: Fn(Env, &[Value]) -> Value + 'static,
{
    pub fn representation(&self) -> Representation {
        if self.inline && fits_inline::<F>() {
            Representation::Inline
        } else {
            Representation::Boxed
        }
    }
}

impl<F> IntoHost for ModuleFunction<F>
where
    F: Fn(Env, &[Value]) -> Value + 'static,
{
    fn into_host(self, env: Env) -> Result<Value> {
        env.maybe_non_local_exit()?;
        let doc = CString::new(self.doc.as_str())?;
        match self.representation() {
            Representation::Inline => repr::make_inline(env, self.min_arity, self.max_arity, &doc, self.function),
            Representation::Boxed => repr::make_boxed(env, self.min_arity, self.max_arity, &doc, self.function),
        }
    }
}
