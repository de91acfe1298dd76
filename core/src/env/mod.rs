//! Environment handle and value handles.
//!
//! [`Env`] is a copyable wrapper around the host's function table. It is
//! only meaningful for the dynamic extent of the host callback that handed
//! it out, and so are the [`Value`]s created through it unless promoted with
//! [`Env::make_global_ref`].

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr::{self, NonNull};

use crate::error::{Error, Result};
use crate::ffi::{
    FUNCALL_EXIT_RETURN, FUNCALL_EXIT_SIGNAL, Limb, PROCESS_INPUT_QUIT, RawEnv, RawFinalizer, RawFunction, RawValue,
    Timespec, Version,
};

mod args;
mod cell;
mod global;
mod scoped;

pub use args::IntoArgs;
pub use cell::Cell;
pub use global::GlobalRef;

/// Raw host value handle (`emacs_value`). Null stands for "no value".
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Value(RawValue);

impl Value {
    pub const fn from_raw(raw: RawValue) -> Self {
        Value(raw)
    }

    pub const fn raw(self) -> RawValue {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for Value {
    fn default() -> Self {
        Value(ptr::null_mut())
    }
}

/// Outcome of the last host operation, as reported by `non_local_exit_check`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuncallExit {
    Return,
    Signal,
    Throw,
}

impl FuncallExit {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            FUNCALL_EXIT_RETURN => FuncallExit::Return,
            FUNCALL_EXIT_SIGNAL => FuncallExit::Signal,
            _ => FuncallExit::Throw,
        }
    }

    pub fn is_pending(self) -> bool {
        self != FuncallExit::Return
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessInput {
    Continue,
    Quit,
}

/// Handle to the host environment of the current callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Env {
    raw: NonNull<RawEnv>,
}

macro_rules! raw_call {
    ($env:expr, $name:ident $(, $arg:expr)* $(,)?) => {{
        let raw = $env.raw.as_ptr();
        unsafe { ((*raw).$name)(raw $(, $arg)*) }
    }};
}

impl Env {
    /// # Safety
    /// `raw` must be null or point to a host environment that stays valid
    /// for as long as the returned handle is used.
    pub unsafe fn from_raw(raw: *mut RawEnv) -> Option<Self> {
        NonNull::new(raw).map(|raw| Env { raw })
    }

    /// # Safety
    /// Same as [`Env::from_raw`].
    pub unsafe fn from_non_null(raw: NonNull<RawEnv>) -> Self {
        Env { raw }
    }

    pub fn as_raw(&self) -> *mut RawEnv {
        self.raw.as_ptr()
    }

    /// Byte size of the table the host handed out.
    pub fn size(&self) -> isize {
        unsafe { (*self.raw.as_ptr()).size }
    }

    pub fn version(&self) -> Option<Version> {
        Version::for_table_size(self.size())
    }

    pub fn is_compatible(&self, version: Version) -> bool {
        usize::try_from(self.size()).is_ok_and(|size| size >= version.table_size())
    }

    pub fn check_compatible(&self, version: Version) -> Result<()> {
        if self.is_compatible(version) {
            Ok(())
        } else {
            Err(Error::runtime(format!("Emacs major version {} required", version.major())))
        }
    }

    // Memory management.

    pub fn make_global_ref(&self, value: impl Into<Value>) -> Value {
        Value(raw_call!(self, make_global_ref, value.into().0))
    }

    pub fn free_global_ref(&self, value: impl Into<Value>) {
        raw_call!(self, free_global_ref, value.into().0)
    }

    // Non-local exit state.

    pub fn non_local_exit_check(&self) -> FuncallExit {
        FuncallExit::from_raw(raw_call!(self, non_local_exit_check))
    }

    pub fn non_local_exit_clear(&self) {
        raw_call!(self, non_local_exit_clear)
    }

    /// Pending exit kind together with its symbol (or tag) and data (or value).
    pub fn non_local_exit_get(&self) -> (FuncallExit, Value, Value) {
        let mut symbol: RawValue = ptr::null_mut();
        let mut data: RawValue = ptr::null_mut();
        let kind = raw_call!(self, non_local_exit_get, &mut symbol, &mut data);
        (FuncallExit::from_raw(kind), Value(symbol), Value(data))
    }

    pub fn non_local_exit_signal(&self, symbol: impl Into<Value>, data: impl Into<Value>) {
        raw_call!(self, non_local_exit_signal, symbol.into().0, data.into().0)
    }

    pub fn non_local_exit_throw(&self, tag: impl Into<Value>, value: impl Into<Value>) {
        raw_call!(self, non_local_exit_throw, tag.into().0, value.into().0)
    }

    // Function registration and calls.

    pub fn make_function(
        &self,
        min_arity: isize,
        max_arity: isize,
        function: RawFunction,
        documentation: Option<&CStr>,
        data: *mut c_void,
    ) -> Value {
        let doc = documentation.map_or(ptr::null(), CStr::as_ptr);
        Value(raw_call!(self, make_function, min_arity, max_arity, function, doc, data))
    }

    pub fn funcall(&self, function: impl Into<Value>, args: &[Value]) -> Value {
        // The host never writes through the argument array.
        let argv = args.as_ptr() as *mut RawValue;
        Value(raw_call!(self, funcall, function.into().0, args.len() as isize, argv))
    }

    /// Interns `name`. Like the C API the name ends at the first nul byte.
    pub fn intern(&self, name: &str) -> Value {
        let name = match CString::new(name) {
            Ok(name) => name,
            Err(err) => {
                let end = err.nul_position();
                let mut bytes = err.into_vec();
                bytes.truncate(end);
                CString::new(bytes).unwrap_or_default()
            }
        };
        self.intern_c(&name)
    }

    pub fn intern_c(&self, name: &CStr) -> Value {
        Value(raw_call!(self, intern, name.as_ptr()))
    }

    pub fn nil(&self) -> Value {
        self.intern_c(c"nil")
    }

    pub fn t(&self) -> Value {
        self.intern_c(c"t")
    }

    // Type predicates and primitive conversions.

    pub fn type_of(&self, value: impl Into<Value>) -> Value {
        Value(raw_call!(self, type_of, value.into().0))
    }

    pub fn is_not_nil(&self, value: impl Into<Value>) -> bool {
        raw_call!(self, is_not_nil, value.into().0)
    }

    pub fn eq(&self, a: impl Into<Value>, b: impl Into<Value>) -> bool {
        raw_call!(self, eq, a.into().0, b.into().0)
    }

    pub fn extract_integer(&self, value: impl Into<Value>) -> i64 {
        raw_call!(self, extract_integer, value.into().0)
    }

    pub fn make_integer(&self, n: i64) -> Value {
        Value(raw_call!(self, make_integer, n))
    }

    pub fn extract_float(&self, value: impl Into<Value>) -> f64 {
        raw_call!(self, extract_float, value.into().0)
    }

    pub fn make_float(&self, d: f64) -> Value {
        Value(raw_call!(self, make_float, d))
    }

    /// Copies the UTF-8 contents of a string, nul terminated. With no buffer
    /// only the required size is stored in `len`.
    pub fn copy_string_contents(&self, value: impl Into<Value>, buffer: Option<&mut [u8]>, len: &mut isize) -> bool {
        let buf = match buffer {
            Some(buf) => {
                *len = (*len).min(buf.len() as isize);
                buf.as_mut_ptr() as *mut c_char
            }
            None => ptr::null_mut(),
        };
        raw_call!(self, copy_string_contents, value.into().0, buf, len as *mut isize)
    }

    pub fn make_string(&self, contents: &str) -> Value {
        Value(raw_call!(
            self,
            make_string,
            contents.as_ptr() as *const c_char,
            contents.len() as isize
        ))
    }

    // User pointers.

    pub fn make_user_ptr(&self, finalizer: Option<RawFinalizer>, ptr: *mut c_void) -> Value {
        Value(raw_call!(self, make_user_ptr, finalizer, ptr))
    }

    pub fn get_user_ptr(&self, value: impl Into<Value>) -> *mut c_void {
        raw_call!(self, get_user_ptr, value.into().0)
    }

    pub fn set_user_ptr(&self, value: impl Into<Value>, ptr: *mut c_void) {
        raw_call!(self, set_user_ptr, value.into().0, ptr)
    }

    pub fn get_user_finalizer(&self, value: impl Into<Value>) -> Option<RawFinalizer> {
        raw_call!(self, get_user_finalizer, value.into().0)
    }

    pub fn set_user_finalizer(&self, value: impl Into<Value>, finalizer: Option<RawFinalizer>) {
        raw_call!(self, set_user_finalizer, value.into().0, finalizer)
    }

    // Vectors.

    pub fn vec_get(&self, vector: impl Into<Value>, index: isize) -> Value {
        Value(raw_call!(self, vec_get, vector.into().0, index))
    }

    pub fn vec_set(&self, vector: impl Into<Value>, index: isize, value: impl Into<Value>) {
        raw_call!(self, vec_set, vector.into().0, index, value.into().0)
    }

    pub fn vec_size(&self, vector: impl Into<Value>) -> isize {
        raw_call!(self, vec_size, vector.into().0)
    }

    // Entries added after Emacs 25 are only read once the table is known
    // to be large enough.

    pub fn should_quit(&self) -> Result<bool> {
        self.check_compatible(Version::V26)?;
        Ok(raw_call!(self, should_quit))
    }

    pub fn process_input(&self) -> Result<ProcessInput> {
        self.check_compatible(Version::V27)?;
        Ok(match raw_call!(self, process_input) {
            PROCESS_INPUT_QUIT => ProcessInput::Quit,
            _ => ProcessInput::Continue,
        })
    }

    pub fn extract_time(&self, value: impl Into<Value>) -> Result<Timespec> {
        self.check_compatible(Version::V27)?;
        Ok(raw_call!(self, extract_time, value.into().0))
    }

    pub fn make_time(&self, time: Timespec) -> Result<Value> {
        self.check_compatible(Version::V27)?;
        Ok(Value(raw_call!(self, make_time, time)))
    }

    /// With no `magnitude` buffer only `sign` and `count` are filled in.
    pub fn extract_big_integer(
        &self,
        value: impl Into<Value>,
        sign: &mut c_int,
        count: &mut isize,
        magnitude: Option<&mut [Limb]>,
    ) -> Result<bool> {
        self.check_compatible(Version::V27)?;
        let mag = match magnitude {
            Some(buf) => {
                *count = (*count).min(buf.len() as isize);
                buf.as_mut_ptr()
            }
            None => ptr::null_mut(),
        };
        Ok(raw_call!(self, extract_big_integer, value.into().0, sign, count, mag))
    }

    pub fn make_big_integer(&self, sign: c_int, magnitude: &[Limb]) -> Result<Value> {
        self.check_compatible(Version::V27)?;
        Ok(Value(raw_call!(
            self,
            make_big_integer,
            sign,
            magnitude.len() as isize,
            magnitude.as_ptr()
        )))
    }

    pub fn get_function_finalizer(&self, function: impl Into<Value>) -> Result<Option<RawFinalizer>> {
        self.check_compatible(Version::V28)?;
        Ok(raw_call!(self, get_function_finalizer, function.into().0))
    }

    pub fn set_function_finalizer(&self, function: impl Into<Value>, finalizer: Option<RawFinalizer>) -> Result<()> {
        self.check_compatible(Version::V28)?;
        raw_call!(self, set_function_finalizer, function.into().0, finalizer);
        Ok(())
    }

    pub fn open_channel(&self, pipe_process: impl Into<Value>) -> Result<c_int> {
        self.check_compatible(Version::V28)?;
        Ok(raw_call!(self, open_channel, pipe_process.into().0))
    }

    pub fn make_interactive(&self, function: impl Into<Value>, spec: impl Into<Value>) -> Result<()> {
        self.check_compatible(Version::V28)?;
        raw_call!(self, make_interactive, function.into().0, spec.into().0);
        Ok(())
    }

    pub fn make_unibyte_string(&self, contents: &[u8]) -> Result<Value> {
        self.check_compatible(Version::V28)?;
        Ok(Value(raw_call!(
            self,
            make_unibyte_string,
            contents.as_ptr() as *const c_char,
            contents.len() as isize
        )))
    }

    // Checked conveniences.

    pub fn cell(&self, value: impl Into<Value>) -> Cell {
        Cell::new(*self, value.into())
    }

    /// Interns `name` and wraps the symbol.
    pub fn symbol(&self, name: &str) -> Cell {
        self.cell(self.intern(name))
    }

    /// Converts `x` into a host value, failing if the conversion left an
    /// exit pending.
    pub fn inject<T: crate::convert::IntoHost>(&self, x: T) -> Result<Cell> {
        let value = x.into_host(*self)?;
        self.maybe_non_local_exit()?;
        Ok(self.cell(value))
    }

    /// Converts a host value, failing if the conversion left an exit pending.
    pub fn extract<T: crate::convert::FromHost>(&self, value: impl Into<Value>) -> Result<T> {
        let out = T::from_host(*self, value.into())?;
        self.maybe_non_local_exit()?;
        Ok(out)
    }

    /// Calls the function named `name` with converted arguments.
    pub fn call(&self, name: &str, args: impl IntoArgs) -> Result<Cell> {
        self.symbol(name).call(args)
    }

    /// Lets the host process pending input, failing with the pending
    /// `quit` exit if the user asked to quit.
    pub fn check_quit(&self) -> Result<()> {
        if self.is_compatible(Version::V27) {
            if self.process_input()? == ProcessInput::Quit {
                return Err(Error::NonLocalExit);
            }
            return Ok(());
        }
        if self.is_compatible(Version::V26) && self.should_quit()? {
            let quit = self.intern("quit");
            let nil = self.nil();
            self.non_local_exit_signal(quit, nil);
            return Err(Error::NonLocalExit);
        }
        Ok(())
    }
}
