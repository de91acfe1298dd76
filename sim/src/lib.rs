//! An in-process stand-in for the Emacs side of the module ABI.
//!
//! [`Sim`] owns a small Lisp heap with a mark and sweep collector, hands
//! out environments whose function tables advertise a chosen
//! [`Version`], and can evaluate simple forms so module functions can be
//! exercised the way the editor would call them.

use std::ffi::c_int;
use std::ptr;
use std::rc::Rc;

use anyhow::{Result, anyhow, bail};
use emod_core::Version;
use emod_core::env::{Env, Value};
use emod_core::ffi::{RawEnv, RawRuntime};

mod builtins;
mod heap;
mod host;
mod printer;
mod reader;
mod table;

use heap::Exit;
use host::{Host, SimEnv};

#[cfg(test)]
mod conversions_test;
#[cfg(test)]
mod exceptions_test;
#[cfg(test)]
mod functions_test;
#[cfg(test)]
mod gc_test;
#[cfg(test)]
mod reader_test;
#[cfg(test)]
mod test_support;

/// Signature of an exported `emacs_module_init`.
pub type ModuleInit = unsafe extern "C" fn(runtime: *mut RawRuntime) -> c_int;

#[repr(C)]
struct SimRuntime {
    raw: RawRuntime,
    env: Box<SimEnv>,
}

unsafe extern "C" fn get_environment(runtime: *mut RawRuntime) -> *mut RawEnv {
    let runtime = unsafe { &*(runtime as *const SimRuntime) };
    runtime.env.as_raw()
}

pub struct Sim {
    host: Rc<Host>,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Sim {
    /// A host speaking the newest known table layout.
    pub fn new() -> Self {
        Self::with_version(Version::LATEST)
    }

    pub fn with_version(version: Version) -> Self {
        tracing::debug!(target: "emod_sim", %version, "starting simulated host");
        Self {
            host: Host::new(version),
        }
    }

    pub fn version(&self) -> Version {
        self.host.version
    }

    /// Runs `f` as if inside a module function call: with a fresh
    /// environment and a fresh frame of local references, both gone when
    /// `f` returns. The environment must not escape `f`.
    pub fn with_env<R>(&self, f: impl FnOnce(Env) -> R) -> R {
        self.in_frame(|| {
            let env = SimEnv::new(self.host.clone());
            f(unsafe { Env::from_non_null(env.as_non_null()) })
        })
    }

    /// Hands `f` a runtime structure whose environment is valid until `f`
    /// returns.
    pub fn with_runtime<R>(&self, f: impl FnOnce(*mut RawRuntime) -> R) -> R {
        self.in_frame(|| {
            let mut runtime = Box::new(SimRuntime {
                raw: RawRuntime {
                    size: size_of::<RawRuntime>() as isize,
                    private_members: ptr::null_mut(),
                    get_environment,
                },
                env: SimEnv::new(self.host.clone()),
            });
            f(ptr::from_mut(&mut *runtime).cast::<RawRuntime>())
        })
    }

    /// Loads a module through its entry point, failing like `module-load`
    /// does on a non-zero return or an exit left pending by init.
    pub fn load(&self, init: ModuleInit) -> Result<()> {
        self.with_runtime(|runtime| {
            let code = unsafe { init(runtime) };
            let env = unsafe { &*(runtime as *const SimRuntime) }.env.as_ref();
            if let Some(exit) = env.pending() {
                bail!(self.describe(exit));
            }
            if code != 0 {
                bail!("(module-init-failed {})", code);
            }
            Ok(())
        })
    }

    /// Reads and evaluates `source`, returning the printed result. A signal
    /// or throw comes back as an error printed as `(SYMBOL . DATA)` or
    /// `(throw TAG VALUE)`.
    pub fn eval(&self, source: &str) -> Result<String> {
        self.in_frame(|| {
            let datum = reader::read(source).map_err(|err| anyhow!("read error: {:?}", err))?;
            let form = reader::build(&mut self.host.heap.borrow_mut(), &datum);
            match host::eval(&self.host, form) {
                Ok(value) => Ok(printer::print(&self.host.heap.borrow(), value, true)),
                Err(exit) => Err(anyhow!(self.describe(exit))),
            }
        })
    }

    /// The exit pending in `env`, printed as by [`Sim::eval`].
    pub fn describe_pending(&self, env: Env) -> Option<String> {
        let env = unsafe { SimEnv::from_raw(env.as_raw()) };
        env.pending().map(|exit| self.describe(exit))
    }

    /// Calls `function` from `env` the way `funcall` does, except that a
    /// module function receives `args` even when their count is outside
    /// its declared arity.
    pub fn funcall_unchecked(&self, env: Env, function: impl Into<Value>, args: &[Value]) -> Value {
        let function = function.into().raw();
        let env = unsafe { SimEnv::from_raw(env.as_raw()) };
        Value::from_raw(env.run_value(|host| {
            let function = host.arg(function)?;
            let args = args.iter().map(|a| host.arg(a.raw())).collect::<Result<Vec<_>, _>>()?;
            host::funcall_unchecked(host, function, &args)
        }))
    }

    pub fn collect_garbage(&self) -> usize {
        self.host.collect_garbage()
    }

    pub fn live_objects(&self) -> usize {
        self.host.heap.borrow().live_objects()
    }

    /// Makes the next `should_quit` report true and the next
    /// `process_input` signal `quit`.
    pub fn request_quit(&self) {
        self.host.quit_requested.set(true);
    }

    pub fn features(&self) -> Vec<String> {
        self.host.features.borrow().clone()
    }

    fn in_frame<R>(&self, f: impl FnOnce() -> R) -> R {
        self.host.heap.borrow_mut().push_frame();
        let out = f();
        self.host.heap.borrow_mut().pop_frame();
        out
    }

    fn describe(&self, exit: Exit) -> String {
        let mut heap = self.host.heap.borrow_mut();
        match exit {
            Exit::Signal(symbol, data) => {
                let form = heap.cons(symbol, data);
                printer::print(&heap, form, true)
            }
            Exit::Throw(tag, value) => {
                let throw = heap.intern("throw");
                let form = heap.list(&[throw, tag, value]);
                printer::print(&heap, form, true)
            }
        }
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        let finalizations = {
            let mut heap = self.host.heap.borrow_mut();
            heap.drain_finalizers()
        };
        tracing::trace!(target: "emod_sim", count = finalizations.len(), "running finalizers at shutdown");
        for finalization in finalizations {
            finalization.run();
        }
    }
}
