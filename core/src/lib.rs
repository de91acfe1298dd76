//! Safe bindings for writing Emacs dynamic modules.
//!
//! An [`Env`] wraps the host's function table for the current callback.
//! Values move across the boundary through [`IntoHost`] / [`FromHost`];
//! native failures are [`Error`]s that [`Env::run_catching`] turns into host
//! signals, and host signals come back as [`Error`]s through
//! [`Env::maybe_non_local_exit`] and [`Env::rethrow_non_local_exit`].
//! Closures become host functions with [`make_module_function`] or, with
//! typed parameters, [`Spreader`].

pub mod config;
pub mod convert;
pub mod env;
pub mod error;
pub mod exit;
pub mod ffi;
pub mod function;
pub mod intern;
pub mod module;

pub use config::{Boxing, Config};
pub use convert::{FromHost, IntoHost, OwnedUserPtr, Symbol, Tag, UserPtr, Vector};
pub use env::{Cell, Env, FuncallExit, GlobalRef, IntoArgs, ProcessInput, Value};
pub use error::{Error, Result};
pub use exit::BOXED_ERROR_SYMBOL;
pub use ffi::Version;
pub use function::{
    ModuleFunction, Param, Representation, Rest, Spreader, make_inline_module_function, make_module_function,
    make_spreader_function,
};
pub use intern::InternEnv;
