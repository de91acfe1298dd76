//! Module entry point.
//!
//! The host loads a module by calling its exported `emacs_module_init`
//! with a runtime structure and refuses modules that do not export
//! `plugin_is_GPL_compatible`. [`export_module!`](crate::export_module)
//! emits both symbols and forwards to [`init_module`].

use std::ffi::c_int;
use std::mem::size_of;

use crate::config::Config;
use crate::env::Env;
use crate::error::Result;
use crate::ffi::RawRuntime;

/// Init returned normally; a pending exit, if any, is reported by the host.
pub const INIT_OK: c_int = 0;
/// The runtime structure was missing, too small, or had no environment.
pub const INIT_BAD_RUNTIME: c_int = 1;
/// The environment is older than [`Config::min_version`].
pub const INIT_VERSION_TOO_OLD: c_int = 2;

/// Validates the runtime and runs `init` under catch-and-report.
///
/// # Safety
/// `runtime` must be null or the pointer the host passed to
/// `emacs_module_init`.
pub unsafe fn init_module<F>(runtime: *mut RawRuntime, config: &Config, init: F) -> c_int
where
    F: FnOnce(Env) -> Result<()>,
{
    if runtime.is_null() {
        tracing::error!(target: "emod::module", "module init called without a runtime");
        return INIT_BAD_RUNTIME;
    }
    let size = unsafe { (*runtime).size };
    if usize::try_from(size).map_or(true, |size| size < size_of::<RawRuntime>()) {
        tracing::error!(target: "emod::module", size, "runtime structure too small");
        return INIT_BAD_RUNTIME;
    }
    let raw_env = unsafe { ((*runtime).get_environment)(runtime) };
    let Some(env) = (unsafe { Env::from_raw(raw_env) }) else {
        tracing::error!(target: "emod::module", "runtime returned no environment");
        return INIT_BAD_RUNTIME;
    };
    if !env.is_compatible(config.min_version) {
        tracing::error!(
            target: "emod::module",
            required = config.min_version.major(),
            "host environment is older than required"
        );
        return INIT_VERSION_TOO_OLD;
    }
    env.run_catching_with(config.boxing, || init(env));
    INIT_OK
}

/// Exports the module entry points.
///
/// ```ignore
/// emod_core::export_module!(Config::new().min_version(Version::V27), init);
///
/// fn init(env: Env) -> emod_core::Result<()> {
///     env.call("provide", (Symbol("my-module"),))?;
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! export_module {
    ($config:expr, $init:path) => {
        #[allow(non_upper_case_globals)]
        #[unsafe(no_mangle)]
        pub static plugin_is_GPL_compatible: ::std::ffi::c_int = 0;

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn emacs_module_init(runtime: *mut $crate::ffi::RawRuntime) -> ::std::ffi::c_int {
            let config: $crate::Config = $config;
            unsafe { $crate::module::init_module(runtime, &config, $init) }
        }
    };
}
