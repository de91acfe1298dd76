use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::rc::Rc;

use once_cell::sync::OnceCell;

use crate::env::{Env, Value};
use crate::error::{Error, Result};

/// Error condition signalled with a boxed native error as its data.
pub const BOXED_ERROR_SYMBOL: &str = "emod--exception";

const BOXED_ERROR_MESSAGE: &str = "Opaque native error";

static CONDITION_DEFINED: OnceCell<()> = OnceCell::new();

struct BoxedError {
    inner: Rc<Error>,
}

unsafe extern "C" fn finalize_boxed(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let dropped = catch_unwind(AssertUnwindSafe(|| drop(unsafe { Box::from_raw(ptr as *mut BoxedError) })));
    if dropped.is_err() {
        tracing::warn!(target: "emod::exit", "panic while dropping a boxed native error");
    }
}

fn define_condition(env: &Env, tag: Value) -> Result<()> {
    env.call("define-error", (tag, BOXED_ERROR_MESSAGE))?;
    Ok(())
}

/// Leaves `(signal 'emod--exception #<user-ptr>)` pending, the user pointer
/// sharing `err`.
pub(super) fn raise(env: &Env, err: Error) {
    let tag = env.intern(BOXED_ERROR_SYMBOL);
    if CONDITION_DEFINED.get_or_try_init(|| define_condition(env, tag)).is_err() {
        return;
    }
    tracing::trace!(target: "emod::exit", error = ?err, "boxing native error");
    let inner = match err {
        Error::Boxed(shared) => shared,
        err => Rc::new(err),
    };
    let boxed = Box::into_raw(Box::new(BoxedError { inner }));
    let uptr = env.make_user_ptr(Some(finalize_boxed), boxed as *mut c_void);
    if env.non_local_exit_check().is_pending() {
        drop(unsafe { Box::from_raw(boxed) });
        return;
    }
    let signal = env.intern("signal");
    env.funcall(signal, &[tag, uptr]);
}

/// The native error held by boxed signal data. The box keeps its share, so
/// every unbox of the same data yields the same error.
pub(super) fn unbox(env: &Env, data: Value) -> Option<Error> {
    let finalizer = env.get_user_finalizer(data);
    let ptr = env.get_user_ptr(data) as *mut BoxedError;
    if env.non_local_exit_check().is_pending() {
        env.non_local_exit_clear();
        return None;
    }
    let ours = finalizer.is_some_and(|fin| ptr::fn_addr_eq(fin, finalize_boxed as unsafe extern "C" fn(*mut c_void)));
    if !ours || ptr.is_null() {
        return None;
    }
    Some(Error::Boxed(unsafe { Rc::clone(&(*ptr).inner) }))
}
