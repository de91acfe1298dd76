//! Raw declarations of the Emacs dynamic module ABI.
//!
//! The layout mirrors `emacs-module.h`. The environment table only grows
//! between releases, so one struct carrying every known entry is used for
//! all versions and the `size` field tells which prefix of it is valid.

use std::ffi::{c_char, c_int, c_void};
use std::os::raw::c_long;

mod version;

pub use version::Version;

#[cfg(test)]
mod version_test;

/// Opaque target of a host value handle.
#[repr(C)]
pub struct ValueTag {
    _opaque: [u8; 0],
}

/// `emacs_value`
pub type RawValue = *mut ValueTag;

#[repr(C)]
pub struct EnvPrivate {
    _opaque: [u8; 0],
}

#[repr(C)]
pub struct RuntimePrivate {
    _opaque: [u8; 0],
}

/// `emacs_limb_t`, the digit type of big integers.
pub type Limb = usize;

pub const LIMB_BITS: u32 = Limb::BITS;

/// `emacs_variadic_function`
pub const VARIADIC_ARITY: isize = -2;

/// `enum emacs_funcall_exit`. Kept as a plain integer so an unexpected
/// value from the host cannot produce an invalid Rust enum.
pub type RawFuncallExit = c_int;
pub const FUNCALL_EXIT_RETURN: RawFuncallExit = 0;
pub const FUNCALL_EXIT_SIGNAL: RawFuncallExit = 1;
pub const FUNCALL_EXIT_THROW: RawFuncallExit = 2;

/// `enum emacs_process_input_result`
pub type RawProcessInput = c_int;
pub const PROCESS_INPUT_CONTINUE: RawProcessInput = 0;
pub const PROCESS_INPUT_QUIT: RawProcessInput = 1;

/// `struct timespec` as used by `make_time` / `extract_time`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timespec {
    pub tv_sec: i64,
    pub tv_nsec: c_long,
}

/// `emacs_function`
pub type RawFunction =
    unsafe extern "C" fn(env: *mut RawEnv, nargs: isize, args: *mut RawValue, data: *mut c_void) -> RawValue;

/// Finalizer attached to user pointers and module functions.
pub type RawFinalizer = unsafe extern "C" fn(data: *mut c_void);

/// `struct emacs_runtime`
#[repr(C)]
pub struct RawRuntime {
    pub size: isize,
    pub private_members: *mut RuntimePrivate,
    pub get_environment: unsafe extern "C" fn(runtime: *mut RawRuntime) -> *mut RawEnv,
}

/// `struct emacs_env_29`
#[repr(C)]
pub struct RawEnv {
    pub size: isize,
    pub private_members: *mut EnvPrivate,

    pub make_global_ref: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> RawValue,
    pub free_global_ref: unsafe extern "C" fn(env: *mut RawEnv, global_value: RawValue),
    pub non_local_exit_check: unsafe extern "C" fn(env: *mut RawEnv) -> RawFuncallExit,
    pub non_local_exit_clear: unsafe extern "C" fn(env: *mut RawEnv),
    pub non_local_exit_get:
        unsafe extern "C" fn(env: *mut RawEnv, symbol: *mut RawValue, data: *mut RawValue) -> RawFuncallExit,
    pub non_local_exit_signal: unsafe extern "C" fn(env: *mut RawEnv, symbol: RawValue, data: RawValue),
    pub non_local_exit_throw: unsafe extern "C" fn(env: *mut RawEnv, tag: RawValue, value: RawValue),
    pub make_function: unsafe extern "C" fn(
        env: *mut RawEnv,
        min_arity: isize,
        max_arity: isize,
        function: RawFunction,
        documentation: *const c_char,
        data: *mut c_void,
    ) -> RawValue,
    pub funcall:
        unsafe extern "C" fn(env: *mut RawEnv, function: RawValue, nargs: isize, args: *mut RawValue) -> RawValue,
    pub intern: unsafe extern "C" fn(env: *mut RawEnv, name: *const c_char) -> RawValue,
    pub type_of: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> RawValue,
    pub is_not_nil: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> bool,
    pub eq: unsafe extern "C" fn(env: *mut RawEnv, a: RawValue, b: RawValue) -> bool,
    pub extract_integer: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> i64,
    pub make_integer: unsafe extern "C" fn(env: *mut RawEnv, n: i64) -> RawValue,
    pub extract_float: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> f64,
    pub make_float: unsafe extern "C" fn(env: *mut RawEnv, d: f64) -> RawValue,
    pub copy_string_contents:
        unsafe extern "C" fn(env: *mut RawEnv, value: RawValue, buffer: *mut c_char, size: *mut isize) -> bool,
    pub make_string: unsafe extern "C" fn(env: *mut RawEnv, contents: *const c_char, length: isize) -> RawValue,
    pub make_user_ptr:
        unsafe extern "C" fn(env: *mut RawEnv, finalizer: Option<RawFinalizer>, ptr: *mut c_void) -> RawValue,
    pub get_user_ptr: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> *mut c_void,
    pub set_user_ptr: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue, ptr: *mut c_void),
    pub get_user_finalizer: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> Option<RawFinalizer>,
    pub set_user_finalizer: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue, finalizer: Option<RawFinalizer>),
    pub vec_get: unsafe extern "C" fn(env: *mut RawEnv, vector: RawValue, index: isize) -> RawValue,
    pub vec_set: unsafe extern "C" fn(env: *mut RawEnv, vector: RawValue, index: isize, value: RawValue),
    pub vec_size: unsafe extern "C" fn(env: *mut RawEnv, vector: RawValue) -> isize,

    // Emacs 26
    pub should_quit: unsafe extern "C" fn(env: *mut RawEnv) -> bool,

    // Emacs 27
    pub process_input: unsafe extern "C" fn(env: *mut RawEnv) -> RawProcessInput,
    pub extract_time: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> Timespec,
    pub make_time: unsafe extern "C" fn(env: *mut RawEnv, time: Timespec) -> RawValue,
    pub extract_big_integer: unsafe extern "C" fn(
        env: *mut RawEnv,
        value: RawValue,
        sign: *mut c_int,
        count: *mut isize,
        magnitude: *mut Limb,
    ) -> bool,
    pub make_big_integer:
        unsafe extern "C" fn(env: *mut RawEnv, sign: c_int, count: isize, magnitude: *const Limb) -> RawValue,

    // Emacs 28
    pub get_function_finalizer: unsafe extern "C" fn(env: *mut RawEnv, value: RawValue) -> Option<RawFinalizer>,
    pub set_function_finalizer:
        unsafe extern "C" fn(env: *mut RawEnv, value: RawValue, finalizer: Option<RawFinalizer>),
    pub open_channel: unsafe extern "C" fn(env: *mut RawEnv, pipe_process: RawValue) -> c_int,
    pub make_interactive: unsafe extern "C" fn(env: *mut RawEnv, function: RawValue, spec: RawValue),
    pub make_unibyte_string:
        unsafe extern "C" fn(env: *mut RawEnv, contents: *const c_char, length: isize) -> RawValue,
}
