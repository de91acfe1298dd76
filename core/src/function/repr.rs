use std::ffi::{CStr, c_void};
use std::mem::{align_of, needs_drop, size_of};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::{self, NonNull};
use std::slice;

use crate::config::Boxing;
use crate::env::{Env, Value};
use crate::error::{Error, Result};
use crate::ffi::{RawEnv, RawValue, Version};

/// Where a registered closure lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    /// Bit-copied into the function's data slot; nothing to release.
    Inline,
    /// Heap allocated; released by a finalizer when the host collects the
    /// function.
    Boxed,
}

/// Whether `F` fits the data slot and needs no destructor.
pub const fn fits_inline<F>() -> bool {
    size_of::<F>() <= size_of::<*mut c_void>() && align_of::<F>() <= align_of::<*mut c_void>() && !needs_drop::<F>()
}

fn invoke<F>(function: &F, env: *mut RawEnv, nargs: isize, args: *mut RawValue) -> RawValue
where
    F: Fn(Env, &[Value]) -> Value,
{
    let Some(env) = (unsafe { Env::from_raw(env) }) else {
        return ptr::null_mut();
    };
    let args: &[Value] = if nargs > 0 && !args.is_null() {
        unsafe { slice::from_raw_parts(args as *const Value, nargs as usize) }
    } else {
        &[]
    };
    match catch_unwind(AssertUnwindSafe(|| function(env, args))) {
        Ok(value) => value.raw(),
        Err(payload) => {
            env.report_error(Error::Panic(payload), Boxing::DEFAULT);
            ptr::null_mut()
        }
    }
}

unsafe extern "C" fn inline_trampoline<F>(
    env: *mut RawEnv,
    nargs: isize,
    args: *mut RawValue,
    data: *mut c_void,
) -> RawValue
where
    F: Fn(Env, &[Value]) -> Value,
{
    let function = unsafe { &*((&data as *const *mut c_void).cast::<F>()) };
    invoke(function, env, nargs, args)
}

unsafe extern "C" fn boxed_trampoline<F>(env: *mut RawEnv, nargs: isize, args: *mut RawValue, data: *mut c_void) -> RawValue
where
    F: Fn(Env, &[Value]) -> Value,
{
    let function = unsafe { &*(data as *const F) };
    invoke(function, env, nargs, args)
}

unsafe extern "C" fn drop_boxed<F>(data: *mut c_void) {
    if data.is_null() {
        return;
    }
    let dropped = catch_unwind(AssertUnwindSafe(|| drop(unsafe { Box::from_raw(data as *mut F) })));
    if dropped.is_err() {
        tracing::warn!(target: "emod::function", "panic while dropping a module function closure");
    }
}

/// Heap closure not yet owned by the host; freed on drop unless released.
struct PendingBox<F> {
    ptr: NonNull<F>,
}

impl<F> PendingBox<F> {
    fn new(value: F) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(value))),
        }
    }

    fn as_data(&self) -> *mut c_void {
        self.ptr.as_ptr() as *mut c_void
    }

    fn release(self) {
        std::mem::forget(self);
    }
}

impl<F> Drop for PendingBox<F> {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

pub(super) fn make_inline<F>(env: Env, min_arity: isize, max_arity: isize, doc: &CStr, function: F) -> Result<Value>
where
    F: Fn(Env, &[Value]) -> Value + 'static,
{
    debug_assert!(fits_inline::<F>());
    let mut slot: *mut c_void = ptr::null_mut();
    unsafe { ptr::write((&mut slot as *mut *mut c_void).cast::<F>(), function) };
    let value = env.make_function(min_arity, max_arity, inline_trampoline::<F>, Some(doc), slot);
    env.maybe_non_local_exit()?;
    tracing::debug!(target: "emod::function", min_arity, max_arity, "registered inline closure");
    Ok(value)
}

/// Registers a heap closure. Hosts with function finalizers release it
/// directly; older hosts get a fresh uninterned symbol aliased to the
/// function whose property list keeps a finalizing user pointer alive, and
/// that symbol is returned in place of the function.
pub(super) fn make_boxed<F>(env: Env, min_arity: isize, max_arity: isize, doc: &CStr, function: F) -> Result<Value>
where
    F: Fn(Env, &[Value]) -> Value + 'static,
{
    let pending = PendingBox::new(function);
    let data = pending.as_data();
    let value = env.make_function(min_arity, max_arity, boxed_trampoline::<F>, Some(doc), data);
    env.maybe_non_local_exit()?;

    if env.is_compatible(Version::V28) {
        env.set_function_finalizer(value, Some(drop_boxed::<F>))?;
        env.maybe_non_local_exit()?;
        pending.release();
        tracing::debug!(target: "emod::function", min_arity, max_arity, "registered boxed closure with function finalizer");
        return Ok(value);
    }

    let symbol = env.call("gensym", ("emod-fun-",))?;
    env.call("defalias", (symbol, value))?;
    let finalizer = env.make_user_ptr(Some(drop_boxed::<F>), data);
    env.maybe_non_local_exit()?;
    pending.release();
    let key = env.call("gensym", ())?;
    env.call("put", (symbol, key, finalizer))?;
    tracing::debug!(target: "emod::function", min_arity, max_arity, "registered boxed closure behind a finalizing alias");
    Ok(symbol.value())
}
