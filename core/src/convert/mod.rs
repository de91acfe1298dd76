//! Conversions between native Rust values and host values.
//!
//! [`IntoHost`] and [`FromHost`] are the extension points: implement them
//! for your own types to make them usable as spreader parameters, return
//! values and call arguments.

use std::marker::PhantomData;

use crate::env::{Cell, Env, Value};
use crate::error::{Error, Result};
use crate::ffi::Version;

mod bigint;
mod time;
mod user_ptr;
mod vector;

pub use bigint::{U64_LIMBS, U128_LIMBS, join_limbs, limbs_for, split_limbs};
pub use user_ptr::{OwnedUserPtr, UserPtr};
pub use vector::Vector;

#[cfg(test)]
mod bigint_test;

/// Native → host conversion.
pub trait IntoHost {
    fn into_host(self, env: Env) -> Result<Value>;
}

/// Host → native conversion.
pub trait FromHost: Sized {
    fn from_host(env: Env, value: Value) -> Result<Self>;
}

/// Names the native type of a conversion without carrying a value.
pub struct Tag<T: ?Sized>(PhantomData<fn() -> T>);

impl<T: ?Sized> Tag<T> {
    pub const fn new() -> Self {
        Tag(PhantomData)
    }
}

impl<T: ?Sized> Clone for Tag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Tag<T> {}

impl<T: ?Sized> Default for Tag<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn to_host<T: IntoHost>(_tag: Tag<T>, env: Env, x: T) -> Result<Value> {
    x.into_host(env)
}

pub fn from_host<T: FromHost>(_tag: Tag<T>, env: Env, value: Value) -> Result<T> {
    T::from_host(env, value)
}

pub(crate) fn out_of_range() -> Error {
    Error::runtime("Integer out of range")
}

/// A symbol name; converts by interning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Symbol<'a>(pub &'a str);

impl IntoHost for Symbol<'_> {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.intern(self.0))
    }
}

impl IntoHost for Value {
    fn into_host(self, _env: Env) -> Result<Value> {
        Ok(self)
    }
}

impl FromHost for Value {
    fn from_host(_env: Env, value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl IntoHost for Cell {
    fn into_host(self, _env: Env) -> Result<Value> {
        Ok(self.value())
    }
}

impl FromHost for Cell {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        Ok(env.cell(value))
    }
}

impl IntoHost for () {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.nil())
    }
}

impl IntoHost for bool {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(if self { env.t() } else { env.nil() })
    }
}

impl FromHost for bool {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        Ok(env.is_not_nil(value))
    }
}

impl IntoHost for &str {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.make_string(self))
    }
}

impl IntoHost for &String {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.make_string(self))
    }
}

impl IntoHost for String {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.make_string(&self))
    }
}

impl FromHost for String {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        let mut len: isize = 0;
        if env.copy_string_contents(value, None, &mut len) && len > 0 {
            let mut buf = vec![0u8; len as usize];
            if env.copy_string_contents(value, Some(&mut buf), &mut len) {
                // `len` counts the terminating nul.
                buf.truncate((len as usize).saturating_sub(1));
                return String::from_utf8(buf).map_err(|_| Error::runtime("String conversion failed"));
            }
        }
        env.maybe_non_local_exit()?;
        Err(Error::runtime("String conversion failed"))
    }
}

macro_rules! impl_narrow_int {
    ($($t:ty),* $(,)?) => {$(
        impl IntoHost for $t {
            fn into_host(self, env: Env) -> Result<Value> {
                Ok(env.make_integer(self as i64))
            }
        }

        impl FromHost for $t {
            fn from_host(env: Env, value: Value) -> Result<Self> {
                let n = env.extract_integer(value);
                env.maybe_non_local_exit()?;
                <$t>::try_from(n).map_err(|_| out_of_range())
            }
        }
    )*};
}

impl_narrow_int!(i8, i16, i32, i64, isize, u8, u16, u32);

impl IntoHost for u64 {
    fn into_host(self, env: Env) -> Result<Value> {
        match i64::try_from(self) {
            Ok(n) => Ok(env.make_integer(n)),
            Err(_) => bigint::make::<U64_LIMBS>(env, false, self as u128),
        }
    }
}

impl FromHost for u64 {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        if !env.is_compatible(Version::V27) {
            let n = env.extract_integer(value);
            env.maybe_non_local_exit()?;
            return u64::try_from(n).map_err(|_| out_of_range());
        }
        match bigint::extract::<U64_LIMBS>(env, value, u64::BITS)? {
            (false, magnitude) => Ok(magnitude as u64),
            (true, _) => Err(out_of_range()),
        }
    }
}

impl IntoHost for usize {
    fn into_host(self, env: Env) -> Result<Value> {
        (self as u64).into_host(env)
    }
}

impl FromHost for usize {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        usize::try_from(u64::from_host(env, value)?).map_err(|_| out_of_range())
    }
}

impl IntoHost for u128 {
    fn into_host(self, env: Env) -> Result<Value> {
        match i64::try_from(self) {
            Ok(n) => Ok(env.make_integer(n)),
            Err(_) => bigint::make::<U128_LIMBS>(env, false, self),
        }
    }
}

impl FromHost for u128 {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        if !env.is_compatible(Version::V27) {
            return u128::try_from(i64::from_host(env, value)?).map_err(|_| out_of_range());
        }
        match bigint::extract::<U128_LIMBS>(env, value, u128::BITS)? {
            (false, magnitude) => Ok(magnitude),
            (true, _) => Err(out_of_range()),
        }
    }
}

impl IntoHost for i128 {
    fn into_host(self, env: Env) -> Result<Value> {
        match i64::try_from(self) {
            Ok(n) => Ok(env.make_integer(n)),
            Err(_) => bigint::make::<U128_LIMBS>(env, self < 0, self.unsigned_abs()),
        }
    }
}

impl FromHost for i128 {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        if !env.is_compatible(Version::V27) {
            return i64::from_host(env, value).map(i128::from);
        }
        let (negative, magnitude) = bigint::extract::<U128_LIMBS>(env, value, u128::BITS)?;
        if negative {
            if magnitude > i128::MIN.unsigned_abs() {
                return Err(out_of_range());
            }
            Ok((magnitude as i128).wrapping_neg())
        } else {
            i128::try_from(magnitude).map_err(|_| out_of_range())
        }
    }
}

impl IntoHost for f64 {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.make_float(self))
    }
}

impl FromHost for f64 {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        let d = env.extract_float(value);
        env.maybe_non_local_exit()?;
        Ok(d)
    }
}

impl IntoHost for f32 {
    fn into_host(self, env: Env) -> Result<Value> {
        Ok(env.make_float(f64::from(self)))
    }
}

impl FromHost for f32 {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        f64::from_host(env, value).map(|d| d as f32)
    }
}

/// `None` is `nil`.
impl<T: IntoHost> IntoHost for Option<T> {
    fn into_host(self, env: Env) -> Result<Value> {
        match self {
            Some(x) => x.into_host(env),
            None => Ok(env.nil()),
        }
    }
}

impl<T: FromHost> FromHost for Option<T> {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        if env.is_not_nil(value) {
            T::from_host(env, value).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Builds a host vector.
impl<T: IntoHost> IntoHost for Vec<T> {
    fn into_host(self, env: Env) -> Result<Value> {
        let items = self
            .into_iter()
            .map(|x| x.into_host(env))
            .collect::<Result<Vec<Value>>>()?;
        env.maybe_non_local_exit()?;
        let vector = env.intern("vector");
        Ok(env.funcall(vector, &items))
    }
}

impl<T: FromHost> FromHost for Vec<T> {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        Vector::from_host(env, value)?
            .iter()?
            .map(|item| item.and_then(|cell| T::from_host(env, cell.value())))
            .collect()
    }
}
