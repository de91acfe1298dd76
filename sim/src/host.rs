//! Host state shared by all environments, and the call machinery.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use emod_core::Version;
use emod_core::ffi::{RawEnv, RawFunction, RawValue, ValueTag};

use crate::builtins::{BUILTINS, Builtin};
use crate::heap::{Exit, Heap, NIL, ObjRef, Object, T};
use crate::table;

pub(crate) struct Host {
    pub heap: RefCell<Heap>,
    pub version: Version,
    gensym_counter: Cell<u64>,
    pub quit_requested: Cell<bool>,
    pub features: RefCell<Vec<String>>,
}

pub(crate) fn encode(r: ObjRef) -> RawValue {
    ptr::without_provenance_mut::<ValueTag>(r as usize + 1)
}

pub(crate) fn decode(raw: RawValue) -> Option<ObjRef> {
    raw.addr().checked_sub(1).and_then(|r| ObjRef::try_from(r).ok())
}

enum Callee {
    Alias(ObjRef),
    Builtin(&'static Builtin),
    Module {
        min_arity: isize,
        max_arity: isize,
        function: RawFunction,
        data: *mut c_void,
    },
    Invalid,
}

/// Longest chain of symbol aliases followed before giving up.
const MAX_INDIRECTION: usize = 64;

impl Host {
    pub fn new(version: Version) -> Rc<Self> {
        let host = Rc::new(Host {
            heap: RefCell::new(Heap::new()),
            version,
            gensym_counter: Cell::new(0),
            quit_requested: Cell::new(false),
            features: RefCell::new(Vec::new()),
        });
        {
            let mut heap = host.heap.borrow_mut();
            for builtin in BUILTINS {
                let symbol = heap.intern(builtin.name);
                let subr = heap.alloc(Object::Builtin(builtin));
                heap.set_function(symbol, subr);
            }
        }
        host
    }

    pub fn next_gensym(&self) -> u64 {
        let n = self.gensym_counter.get();
        self.gensym_counter.set(n + 1);
        n
    }

    /// Decodes a value handed in by a module.
    pub fn arg(&self, raw: RawValue) -> Result<ObjRef, Exit> {
        let mut heap = self.heap.borrow_mut();
        match decode(raw).filter(|&r| heap.is_live(r)) {
            Some(r) => Ok(r),
            None => Err(heap.wrong_type("valid-value-p", NIL)),
        }
    }

    pub fn signal(&self, name: &str, data: &[ObjRef]) -> Exit {
        self.heap.borrow_mut().signal(name, data)
    }

    pub fn error(&self, message: &str) -> Exit {
        self.heap.borrow_mut().error(message)
    }

    pub fn wrong_type(&self, predicate: &str, value: ObjRef) -> Exit {
        self.heap.borrow_mut().wrong_type(predicate, value)
    }

    /// Runs a collection and then the finalizers of everything freed.
    pub fn collect_garbage(&self) -> usize {
        let (freed, finalizations) = self.heap.borrow_mut().collect();
        for finalization in finalizations {
            finalization.run();
        }
        tracing::trace!(target: "emod_sim::gc", freed, "garbage collected");
        freed
    }
}

/// Calls `function` with `args`, following symbol aliases.
pub(crate) fn funcall(host: &Rc<Host>, function: ObjRef, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    dispatch(host, function, args, true)
}

/// Like [`funcall`], but hands a module function whatever `args` it gets
/// and leaves the arity check to the module.
pub(crate) fn funcall_unchecked(host: &Rc<Host>, function: ObjRef, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    dispatch(host, function, args, false)
}

fn dispatch(host: &Rc<Host>, function: ObjRef, args: &[ObjRef], check_module_arity: bool) -> Result<ObjRef, Exit> {
    let mut target = function;
    for _ in 0..MAX_INDIRECTION {
        let callee = {
            let heap = host.heap.borrow();
            match heap.get(target) {
                Some(Object::Symbol { function, .. }) => Callee::Alias(*function),
                Some(Object::Builtin(builtin)) => Callee::Builtin(builtin),
                Some(Object::ModuleFn(m)) => Callee::Module {
                    min_arity: m.min_arity,
                    max_arity: m.max_arity,
                    function: m.function,
                    data: m.data,
                },
                _ => Callee::Invalid,
            }
        };
        match callee {
            Callee::Alias(NIL) => return Err(host.signal("void-function", &[target])),
            Callee::Alias(next) => target = next,
            Callee::Builtin(builtin) => {
                if args.len() < builtin.min || builtin.max.is_some_and(|max| args.len() > max) {
                    return Err(wrong_arity(host, target, args.len()));
                }
                return (builtin.func)(host, args);
            }
            Callee::Module {
                min_arity,
                max_arity,
                function,
                data,
            } => {
                let nargs = args.len() as isize;
                if check_module_arity && (nargs < min_arity || (max_arity >= 0 && nargs > max_arity)) {
                    return Err(wrong_arity(host, target, args.len()));
                }
                return call_module(host, function, data, args);
            }
            Callee::Invalid => return Err(host.signal("invalid-function", &[target])),
        }
    }
    Err(host.signal("cyclic-function-indirection", &[function]))
}

fn wrong_arity(host: &Rc<Host>, function: ObjRef, nargs: usize) -> Exit {
    let mut heap = host.heap.borrow_mut();
    let n = heap.int(crate::heap::SimInt::from_i64(nargs as i64));
    heap.signal("wrong-number-of-arguments", &[function, n])
}

/// Runs a module function in a fresh environment and frame. Whatever the
/// function returns or leaves pending is rooted in the caller's frame.
fn call_module(host: &Rc<Host>, function: RawFunction, data: *mut c_void, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    host.heap.borrow_mut().push_frame();
    let env = SimEnv::new(host.clone());
    {
        let mut heap = host.heap.borrow_mut();
        for &arg in args {
            heap.root(arg);
        }
    }
    let mut argv: Vec<RawValue> = args.iter().map(|&r| encode(r)).collect();
    let ret = unsafe { function(env.as_raw(), argv.len() as isize, argv.as_mut_ptr(), data) };
    let pending = env.pending();

    let mut heap = host.heap.borrow_mut();
    heap.pop_frame();
    match pending {
        Some(exit) => {
            for r in exit.refs() {
                heap.root(r);
            }
            Err(exit)
        }
        None => {
            let r = decode(ret).filter(|&r| heap.is_live(r)).unwrap_or(NIL);
            heap.root(r);
            Ok(r)
        }
    }
}

enum Form {
    Value,
    Symbol(ObjRef),
    Call(ObjRef, Vec<ObjRef>),
    Malformed,
}

pub(crate) fn eval(host: &Rc<Host>, form: ObjRef) -> Result<ObjRef, Exit> {
    let classified = {
        let heap = host.heap.borrow();
        match heap.get(form) {
            Some(Object::Symbol { .. }) => Form::Symbol(form),
            Some(Object::Cons(head, tail)) => match heap.list_items(*tail) {
                Some(args) => Form::Call(*head, args),
                None => Form::Malformed,
            },
            _ => Form::Value,
        }
    };
    match classified {
        Form::Value => Ok(form),
        Form::Symbol(symbol) => {
            let self_evaluating = {
                let heap = host.heap.borrow();
                symbol == NIL || symbol == T || heap.symbol_name(symbol).is_some_and(|n| n.starts_with(':'))
            };
            if self_evaluating {
                Ok(symbol)
            } else {
                Err(host.signal("void-variable", &[symbol]))
            }
        }
        Form::Malformed => Err(host.signal("invalid-function", &[form])),
        Form::Call(head, args) => {
            let special = host.heap.borrow().symbol_name(head).map(str::to_owned);
            match special.as_deref() {
                Some("quote") | Some("function") => args
                    .first()
                    .copied()
                    .ok_or_else(|| wrong_arity(host, head, args.len())),
                Some("progn") => {
                    let mut last = NIL;
                    for arg in args {
                        last = eval(host, arg)?;
                    }
                    Ok(last)
                }
                _ => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(eval(host, arg)?);
                    }
                    funcall(host, head, &values)
                }
            }
        }
    }
}

/// The environment handed to one module call. The function table comes
/// first so a `*mut RawEnv` can be turned back into the whole struct.
#[repr(C)]
pub(crate) struct SimEnv {
    raw: RawEnv,
    pub host: Rc<Host>,
    pending: Cell<Option<Exit>>,
}

impl SimEnv {
    pub fn new(host: Rc<Host>) -> Box<SimEnv> {
        Box::new(SimEnv {
            raw: table::raw_env(host.version),
            host,
            pending: Cell::new(None),
        })
    }

    pub fn as_raw(&self) -> *mut RawEnv {
        ptr::from_ref(self).cast_mut().cast::<RawEnv>()
    }

    pub fn as_non_null(&self) -> NonNull<RawEnv> {
        NonNull::from(self).cast::<RawEnv>()
    }

    /// # Safety
    /// `raw` must come from [`SimEnv::as_raw`] of a live environment.
    pub unsafe fn from_raw<'a>(raw: *mut RawEnv) -> &'a SimEnv {
        unsafe { &*(raw as *const SimEnv) }
    }

    pub fn pending(&self) -> Option<Exit> {
        self.pending.get()
    }

    /// Records `exit` unless another one is already pending.
    pub fn set_pending(&self, exit: Exit) {
        if self.pending.get().is_some() {
            return;
        }
        let mut heap = self.host.heap.borrow_mut();
        for r in exit.refs() {
            heap.root(r);
        }
        self.pending.set(Some(exit));
    }

    pub fn clear_pending(&self) {
        self.pending.set(None);
    }

    /// Runs a table operation: nothing happens while an exit is pending,
    /// and a failure becomes the pending exit.
    pub fn run<R>(&self, fallback: R, op: impl FnOnce(&Rc<Host>) -> Result<R, Exit>) -> R {
        if self.pending().is_some() {
            return fallback;
        }
        match op(&self.host) {
            Ok(out) => out,
            Err(exit) => {
                self.set_pending(exit);
                fallback
            }
        }
    }

    pub fn run_value(&self, op: impl FnOnce(&Rc<Host>) -> Result<ObjRef, Exit>) -> RawValue {
        self.run(ptr::null_mut(), |host| {
            let r = op(host)?;
            host.heap.borrow_mut().root(r);
            Ok(encode(r))
        })
    }
}
