use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use super::Env;
use crate::error::{Error, Result};
use crate::ffi::{RawEnv, RawValue};

struct Scope<F> {
    body: Option<F>,
    outcome: Option<Result<()>>,
}

unsafe extern "C" fn scope_trampoline<F>(env: *mut RawEnv, nargs: isize, args: *mut RawValue, data: *mut c_void) -> RawValue
where
    F: FnOnce(Env) -> Result<()>,
{
    let scope = unsafe { &mut *(data as *mut Scope<F>) };
    let Some(env) = (unsafe { Env::from_raw(env) }) else {
        return ptr::null_mut();
    };
    if let Some(body) = scope.body.take() {
        let outcome = catch_unwind(AssertUnwindSafe(|| body(env))).unwrap_or_else(|payload| Err(Error::Panic(payload)));
        scope.outcome = Some(outcome);
    }
    if nargs > 0 && !args.is_null() {
        unsafe { *args }
    } else {
        ptr::null_mut()
    }
}

impl Env {
    /// Runs `body` in a fresh host call frame, so local values it creates
    /// become garbage once it returns. Errors raised by `body` are
    /// propagated; handles carried by them belong to the finished frame.
    pub fn run_scoped<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce(Env) -> Result<()>,
    {
        self.maybe_non_local_exit()?;
        let mut scope = Scope {
            body: Some(body),
            outcome: None,
        };
        let data = &mut scope as *mut Scope<F> as *mut c_void;
        let function = self.make_function(1, 1, scope_trampoline::<F>, None, data);
        self.maybe_non_local_exit()?;
        self.funcall(function, &[function]);
        if let Some(Err(err)) = scope.outcome.take() {
            return Err(err);
        }
        self.maybe_non_local_exit()
    }
}
