//! The `emacs_env` function table of the simulated host.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::os::raw::c_long;
use std::{ptr, slice};

use emod_core::Version;
use emod_core::ffi::{
    FUNCALL_EXIT_RETURN, FUNCALL_EXIT_SIGNAL, FUNCALL_EXIT_THROW, LIMB_BITS, Limb, PROCESS_INPUT_CONTINUE,
    PROCESS_INPUT_QUIT, RawEnv, RawFinalizer, RawFuncallExit, RawFunction, RawProcessInput, RawValue, Timespec,
};

use crate::heap::{Exit, ModuleFn, NIL, ObjRef, Object, SimInt};
use crate::host::{self, SimEnv, encode};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// A table advertising exactly the entries of `version`.
pub(crate) fn raw_env(version: Version) -> RawEnv {
    RawEnv {
        size: version.table_size() as isize,
        private_members: ptr::null_mut(),
        make_global_ref,
        free_global_ref,
        non_local_exit_check,
        non_local_exit_clear,
        non_local_exit_get,
        non_local_exit_signal,
        non_local_exit_throw,
        make_function,
        funcall,
        intern,
        type_of,
        is_not_nil,
        eq,
        extract_integer,
        make_integer,
        extract_float,
        make_float,
        copy_string_contents,
        make_string,
        make_user_ptr,
        get_user_ptr,
        set_user_ptr,
        get_user_finalizer,
        set_user_finalizer,
        vec_get,
        vec_set,
        vec_size,
        should_quit,
        process_input,
        extract_time,
        make_time,
        extract_big_integer,
        make_big_integer,
        get_function_finalizer,
        set_function_finalizer,
        open_channel,
        make_interactive,
        make_unibyte_string,
    }
}

unsafe fn sim<'a>(env: *mut RawEnv) -> &'a SimEnv {
    unsafe { SimEnv::from_raw(env) }
}

// Usable while an exit is pending.

unsafe extern "C" fn make_global_ref(env: *mut RawEnv, value: RawValue) -> RawValue {
    let env = unsafe { sim(env) };
    match host::decode(value) {
        Some(r) => {
            env.host.heap.borrow_mut().global_ref(r);
            encode(r)
        }
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn free_global_ref(env: *mut RawEnv, value: RawValue) {
    let env = unsafe { sim(env) };
    if let Some(r) = host::decode(value) {
        env.host.heap.borrow_mut().free_global(r);
    }
}

unsafe extern "C" fn non_local_exit_check(env: *mut RawEnv) -> RawFuncallExit {
    match unsafe { sim(env) }.pending() {
        None => FUNCALL_EXIT_RETURN,
        Some(Exit::Signal(..)) => FUNCALL_EXIT_SIGNAL,
        Some(Exit::Throw(..)) => FUNCALL_EXIT_THROW,
    }
}

unsafe extern "C" fn non_local_exit_clear(env: *mut RawEnv) {
    unsafe { sim(env) }.clear_pending();
}

unsafe extern "C" fn non_local_exit_get(env: *mut RawEnv, symbol: *mut RawValue, data: *mut RawValue) -> RawFuncallExit {
    let (code, [a, b]) = match unsafe { sim(env) }.pending() {
        None => return FUNCALL_EXIT_RETURN,
        Some(exit @ Exit::Signal(..)) => (FUNCALL_EXIT_SIGNAL, exit.refs()),
        Some(exit @ Exit::Throw(..)) => (FUNCALL_EXIT_THROW, exit.refs()),
    };
    unsafe {
        *symbol = encode(a);
        *data = encode(b);
    }
    code
}

unsafe extern "C" fn non_local_exit_signal(env: *mut RawEnv, symbol: RawValue, data: RawValue) {
    let env = unsafe { sim(env) };
    let symbol = host::decode(symbol).unwrap_or(NIL);
    let data = host::decode(data).unwrap_or(NIL);
    env.set_pending(Exit::Signal(symbol, data));
}

unsafe extern "C" fn non_local_exit_throw(env: *mut RawEnv, tag: RawValue, value: RawValue) {
    let env = unsafe { sim(env) };
    let tag = host::decode(tag).unwrap_or(NIL);
    let value = host::decode(value).unwrap_or(NIL);
    env.set_pending(Exit::Throw(tag, value));
}

unsafe extern "C" fn should_quit(env: *mut RawEnv) -> bool {
    unsafe { sim(env) }.host.quit_requested.get()
}

// Everything below does nothing while an exit is pending.

unsafe extern "C" fn make_function(
    env: *mut RawEnv,
    min_arity: isize,
    max_arity: isize,
    function: RawFunction,
    documentation: *const c_char,
    data: *mut c_void,
) -> RawValue {
    let doc = if documentation.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(documentation) }.to_string_lossy().into_owned()
    };
    unsafe { sim(env) }.run_value(|host| {
        if min_arity < 0 || (max_arity >= 0 && max_arity < min_arity) {
            let mut heap = host.heap.borrow_mut();
            let min = heap.int(SimInt::from_i64(min_arity as i64));
            let max = heap.int(SimInt::from_i64(max_arity as i64));
            return Err(heap.signal("args-out-of-range", &[min, max]));
        }
        Ok(host.heap.borrow_mut().alloc(Object::ModuleFn(ModuleFn {
            min_arity,
            max_arity,
            function,
            data,
            doc,
            finalizer: None,
            interactive: None,
        })))
    })
}

unsafe extern "C" fn funcall(env: *mut RawEnv, function: RawValue, nargs: isize, args: *mut RawValue) -> RawValue {
    let raw_args: &[RawValue] = match usize::try_from(nargs) {
        Ok(n) if n > 0 && !args.is_null() => unsafe { slice::from_raw_parts(args, n) },
        _ => &[],
    };
    unsafe { sim(env) }.run_value(|host| {
        let function = host.arg(function)?;
        let args = raw_args.iter().map(|&a| host.arg(a)).collect::<Result<Vec<_>, _>>()?;
        host::funcall(host, function, &args)
    })
}

unsafe extern "C" fn intern(env: *mut RawEnv, name: *const c_char) -> RawValue {
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    unsafe { sim(env) }.run_value(|host| Ok(host.heap.borrow_mut().intern(&name)))
}

unsafe extern "C" fn type_of(env: *mut RawEnv, value: RawValue) -> RawValue {
    unsafe { sim(env) }.run_value(|host| {
        let r = host.arg(value)?;
        let name = match host.heap.borrow().get(r) {
            Some(Object::Symbol { .. }) => "symbol",
            Some(Object::Int(_)) => "integer",
            Some(Object::Float(_)) => "float",
            Some(Object::Str(_)) => "string",
            Some(Object::Cons(..)) => "cons",
            Some(Object::Vector(_)) => "vector",
            Some(Object::UserPtr { .. }) => "user-ptr",
            Some(Object::ModuleFn(_)) => "module-function",
            Some(Object::Builtin(_)) | None => "subr",
        };
        Ok(host.heap.borrow_mut().intern(name))
    })
}

unsafe extern "C" fn is_not_nil(env: *mut RawEnv, value: RawValue) -> bool {
    unsafe { sim(env) }.run(false, |host| Ok(host.arg(value)? != NIL))
}

unsafe extern "C" fn eq(env: *mut RawEnv, a: RawValue, b: RawValue) -> bool {
    unsafe { sim(env) }.run(false, |host| {
        let (a, b) = (host.arg(a)?, host.arg(b)?);
        Ok(host.heap.borrow().eq(a, b))
    })
}

fn integer_arg(host: &host::Host, r: ObjRef) -> Result<SimInt, Exit> {
    let n = match host.heap.borrow().get(r) {
        Some(Object::Int(n)) => Some(*n),
        _ => None,
    };
    n.ok_or_else(|| host.wrong_type("integerp", r))
}

unsafe extern "C" fn extract_integer(env: *mut RawEnv, value: RawValue) -> i64 {
    unsafe { sim(env) }.run(0, |host| {
        let r = host.arg(value)?;
        let n = integer_arg(host, r)?;
        n.to_i64().ok_or_else(|| host.signal("overflow-error", &[r]))
    })
}

unsafe extern "C" fn make_integer(env: *mut RawEnv, n: i64) -> RawValue {
    unsafe { sim(env) }.run_value(|host| Ok(host.heap.borrow_mut().int(SimInt::from_i64(n))))
}

unsafe extern "C" fn extract_float(env: *mut RawEnv, value: RawValue) -> f64 {
    unsafe { sim(env) }.run(0.0, |host| {
        let r = host.arg(value)?;
        let d = match host.heap.borrow().get(r) {
            Some(Object::Float(d)) => Some(*d),
            _ => None,
        };
        d.ok_or_else(|| host.wrong_type("floatp", r))
    })
}

unsafe extern "C" fn make_float(env: *mut RawEnv, d: f64) -> RawValue {
    unsafe { sim(env) }.run_value(|host| Ok(host.heap.borrow_mut().alloc(Object::Float(d))))
}

/// With a null buffer only the required size (including the nul) is
/// reported. A buffer that is too small signals `args-out-of-range`.
unsafe extern "C" fn copy_string_contents(
    env: *mut RawEnv,
    value: RawValue,
    buffer: *mut c_char,
    size: *mut isize,
) -> bool {
    unsafe { sim(env) }.run(false, |host| {
        let r = host.arg(value)?;
        let bytes = match host.heap.borrow().get(r) {
            Some(Object::Str(s)) => Some(s.clone().into_bytes()),
            _ => None,
        };
        let bytes = bytes.ok_or_else(|| host.wrong_type("stringp", r))?;
        let required = bytes.len() as isize + 1;
        let available = unsafe { *size };
        unsafe { *size = required };
        if buffer.is_null() {
            return Ok(true);
        }
        if available < required {
            let mut heap = host.heap.borrow_mut();
            let available = heap.int(SimInt::from_i64(available as i64));
            let required = heap.int(SimInt::from_i64(required as i64));
            return Err(heap.signal("args-out-of-range", &[available, required]));
        }
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), bytes.len());
            *buffer.add(bytes.len()) = 0;
        }
        Ok(true)
    })
}

unsafe fn byte_slice<'a>(contents: *const c_char, length: isize) -> &'a [u8] {
    match usize::try_from(length) {
        Ok(n) if n > 0 && !contents.is_null() => unsafe { slice::from_raw_parts(contents.cast::<u8>(), n) },
        _ => &[],
    }
}

unsafe extern "C" fn make_string(env: *mut RawEnv, contents: *const c_char, length: isize) -> RawValue {
    let bytes = unsafe { byte_slice(contents, length) };
    unsafe { sim(env) }.run_value(|host| match std::str::from_utf8(bytes) {
        Ok(text) => Ok(host.heap.borrow_mut().string(text)),
        Err(_) => Err(host.error("Invalid UTF-8 in module string")),
    })
}

unsafe extern "C" fn make_unibyte_string(env: *mut RawEnv, contents: *const c_char, length: isize) -> RawValue {
    let bytes = unsafe { byte_slice(contents, length) };
    unsafe { sim(env) }.run_value(|host| {
        let text: String = bytes.iter().map(|&b| char::from(b)).collect();
        Ok(host.heap.borrow_mut().string(text))
    })
}

unsafe extern "C" fn make_user_ptr(env: *mut RawEnv, finalizer: Option<RawFinalizer>, data: *mut c_void) -> RawValue {
    unsafe { sim(env) }.run_value(|host| Ok(host.heap.borrow_mut().alloc(Object::UserPtr { ptr: data, finalizer })))
}

/// Applies `op` to the user pointer behind `value`.
fn with_user_ptr<R>(
    host: &host::Host,
    value: RawValue,
    op: impl FnOnce(&mut *mut c_void, &mut Option<RawFinalizer>) -> R,
) -> Result<R, Exit> {
    let r = host.arg(value)?;
    let mut heap = host.heap.borrow_mut();
    match heap.get_mut(r) {
        Some(Object::UserPtr { ptr, finalizer }) => Ok(op(ptr, finalizer)),
        _ => {
            let predicate = heap.intern("user-ptrp");
            Err(heap.signal("wrong-type-argument", &[predicate, r]))
        }
    }
}

unsafe extern "C" fn get_user_ptr(env: *mut RawEnv, value: RawValue) -> *mut c_void {
    unsafe { sim(env) }.run(ptr::null_mut(), |host| with_user_ptr(host, value, |data, _| *data))
}

unsafe extern "C" fn set_user_ptr(env: *mut RawEnv, value: RawValue, new: *mut c_void) {
    unsafe { sim(env) }.run((), |host| with_user_ptr(host, value, |data, _| *data = new))
}

unsafe extern "C" fn get_user_finalizer(env: *mut RawEnv, value: RawValue) -> Option<RawFinalizer> {
    unsafe { sim(env) }.run(None, |host| with_user_ptr(host, value, |_, finalizer| *finalizer))
}

unsafe extern "C" fn set_user_finalizer(env: *mut RawEnv, value: RawValue, new: Option<RawFinalizer>) {
    unsafe { sim(env) }.run((), |host| with_user_ptr(host, value, |_, finalizer| *finalizer = new))
}

/// Applies `op` to the vector behind `value` and a checked index.
fn with_vector<R>(
    host: &host::Host,
    value: RawValue,
    index: Option<isize>,
    op: impl FnOnce(&mut Vec<ObjRef>, usize) -> R,
) -> Result<R, Exit> {
    let r = host.arg(value)?;
    let mut heap = host.heap.borrow_mut();
    let len = match heap.get(r) {
        Some(Object::Vector(items)) => items.len(),
        _ => {
            let predicate = heap.intern("vectorp");
            return Err(heap.signal("wrong-type-argument", &[predicate, r]));
        }
    };
    let slot = match index {
        None => 0,
        Some(i) => match usize::try_from(i).ok().filter(|&i| i < len) {
            Some(i) => i,
            None => {
                let i = heap.int(SimInt::from_i64(i as i64));
                return Err(heap.signal("args-out-of-range", &[r, i]));
            }
        },
    };
    match heap.get_mut(r) {
        Some(Object::Vector(items)) => Ok(op(items, slot)),
        _ => Err(heap.error("Vector vanished")),
    }
}

unsafe extern "C" fn vec_get(env: *mut RawEnv, vector: RawValue, index: isize) -> RawValue {
    unsafe { sim(env) }.run_value(|host| with_vector(host, vector, Some(index), |items, i| items[i]))
}

unsafe extern "C" fn vec_set(env: *mut RawEnv, vector: RawValue, index: isize, value: RawValue) {
    unsafe { sim(env) }.run((), |host| {
        let value = host.arg(value)?;
        with_vector(host, vector, Some(index), |items, i| items[i] = value)
    })
}

unsafe extern "C" fn vec_size(env: *mut RawEnv, vector: RawValue) -> isize {
    unsafe { sim(env) }.run(0, |host| with_vector(host, vector, None, |items, _| items.len() as isize))
}

unsafe extern "C" fn process_input(env: *mut RawEnv) -> RawProcessInput {
    unsafe { sim(env) }.run(PROCESS_INPUT_QUIT, |host| {
        if host.quit_requested.replace(false) {
            Err(host.signal("quit", &[]))
        } else {
            Ok(PROCESS_INPUT_CONTINUE)
        }
    })
}

/// Accepts an integer, a float or a `(TICKS . HZ)` pair.
unsafe extern "C" fn extract_time(env: *mut RawEnv, value: RawValue) -> Timespec {
    unsafe { sim(env) }.run(Timespec::default(), |host| {
        let r = host.arg(value)?;
        let (ticks, hz) = {
            let heap = host.heap.borrow();
            let int_of = |r: ObjRef| match heap.get(r) {
                Some(Object::Int(n)) => n.to_i128(),
                _ => None,
            };
            match heap.get(r) {
                Some(Object::Int(n)) => (n.to_i128(), Some(1)),
                Some(Object::Float(d)) if d.is_finite() => (Some((d * NANOS_PER_SEC as f64).floor() as i128), Some(NANOS_PER_SEC)),
                Some(Object::Cons(ticks, hz)) => (int_of(*ticks), int_of(*hz).filter(|&hz| hz > 0)),
                _ => (None, None),
            }
        };
        let (Some(ticks), Some(hz)) = (ticks, hz) else {
            return Err(host.error("Invalid time specification"));
        };
        let tv_sec = i64::try_from(ticks.div_euclid(hz)).map_err(|_| host.signal("overflow-error", &[r]))?;
        let tv_nsec = (ticks.rem_euclid(hz) * NANOS_PER_SEC / hz) as c_long;
        Ok(Timespec { tv_sec, tv_nsec })
    })
}

unsafe extern "C" fn make_time(env: *mut RawEnv, time: Timespec) -> RawValue {
    unsafe { sim(env) }.run_value(|host| {
        let ticks = time.tv_sec as i128 * NANOS_PER_SEC + time.tv_nsec as i128;
        let mut heap = host.heap.borrow_mut();
        let ticks = heap.int(SimInt::from_i128(ticks));
        let hz = heap.int(SimInt::from_i128(NANOS_PER_SEC));
        Ok(heap.cons(ticks, hz))
    })
}

fn limbs_of(magnitude: u128) -> Vec<Limb> {
    let mut limbs = Vec::new();
    let mut rest = magnitude;
    while rest != 0 {
        limbs.push(rest as Limb);
        rest = rest.checked_shr(LIMB_BITS).unwrap_or(0);
    }
    limbs
}

/// Reports sign and limb count, and fills `magnitude` when it is given and
/// large enough. A short buffer signals `args-out-of-range`.
unsafe extern "C" fn extract_big_integer(
    env: *mut RawEnv,
    value: RawValue,
    sign: *mut c_int,
    count: *mut isize,
    magnitude: *mut Limb,
) -> bool {
    unsafe { sim(env) }.run(false, |host| {
        let r = host.arg(value)?;
        let n = integer_arg(host, r)?;
        let limbs = limbs_of(n.magnitude);
        let available = unsafe { *count };
        unsafe {
            *sign = match (limbs.is_empty(), n.negative) {
                (true, _) => 0,
                (false, true) => -1,
                (false, false) => 1,
            };
            *count = limbs.len() as isize;
        }
        if magnitude.is_null() || limbs.is_empty() {
            return Ok(true);
        }
        if available < limbs.len() as isize {
            let mut heap = host.heap.borrow_mut();
            let available = heap.int(SimInt::from_i64(available as i64));
            return Err(heap.signal("args-out-of-range", &[r, available]));
        }
        unsafe { ptr::copy_nonoverlapping(limbs.as_ptr(), magnitude, limbs.len()) };
        Ok(true)
    })
}

unsafe extern "C" fn make_big_integer(env: *mut RawEnv, sign: c_int, count: isize, magnitude: *const Limb) -> RawValue {
    let limbs: &[Limb] = match usize::try_from(count) {
        Ok(n) if n > 0 && !magnitude.is_null() && sign != 0 => unsafe { slice::from_raw_parts(magnitude, n) },
        _ => &[],
    };
    unsafe { sim(env) }.run_value(|host| {
        let mut acc: u128 = 0;
        for &limb in limbs.iter().rev() {
            if acc.leading_zeros() < LIMB_BITS {
                return Err(host.signal("overflow-error", &[]));
            }
            acc = (acc << LIMB_BITS) | limb as u128;
        }
        Ok(host.heap.borrow_mut().int(SimInt::new(sign < 0, acc)))
    })
}

/// Applies `op` to the module function behind `value`.
fn with_module_fn<R>(host: &host::Host, value: RawValue, op: impl FnOnce(&mut ModuleFn) -> R) -> Result<R, Exit> {
    let r = host.arg(value)?;
    let mut heap = host.heap.borrow_mut();
    match heap.get_mut(r) {
        Some(Object::ModuleFn(m)) => Ok(op(m)),
        _ => {
            let predicate = heap.intern("module-function-p");
            Err(heap.signal("wrong-type-argument", &[predicate, r]))
        }
    }
}

unsafe extern "C" fn get_function_finalizer(env: *mut RawEnv, value: RawValue) -> Option<RawFinalizer> {
    unsafe { sim(env) }.run(None, |host| with_module_fn(host, value, |m| m.finalizer))
}

unsafe extern "C" fn set_function_finalizer(env: *mut RawEnv, value: RawValue, finalizer: Option<RawFinalizer>) {
    unsafe { sim(env) }.run((), |host| with_module_fn(host, value, |m| m.finalizer = finalizer))
}

unsafe extern "C" fn make_interactive(env: *mut RawEnv, function: RawValue, spec: RawValue) {
    unsafe { sim(env) }.run((), |host| {
        let spec = host.arg(spec)?;
        with_module_fn(host, function, |m| m.interactive = Some(spec))
    })
}

/// Pipe processes do not exist here.
unsafe extern "C" fn open_channel(env: *mut RawEnv, pipe_process: RawValue) -> c_int {
    unsafe { sim(env) }.run(-1, |host| {
        let process = host.arg(pipe_process)?;
        let predicate = host.heap.borrow_mut().intern("processp");
        Err(host.signal("wrong-type-argument", &[predicate, process]))
    })
}
