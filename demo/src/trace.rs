//! Opt-in stderr logging for the demo module, driven by `EMOD_TRACE`.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "emod=debug,emod_demo=debug";

/// The filter `EMOD_TRACE` asks for, or `None` when tracing stays off.
///
/// An unset, empty, `0`, `false` or `off` value disables it. A bare switch
/// (`1`, `true`, `on`) defers to `RUST_LOG` and then to the default filter.
/// Anything else is taken as the filter expression itself.
pub(crate) fn requested_filter(emod_trace: Option<&str>, rust_log: Option<&str>) -> Option<String> {
    let value = emod_trace.map(str::trim).filter(|v| !v.is_empty())?;
    let is = |word: &str| value.eq_ignore_ascii_case(word);
    if is("0") || is("false") || is("off") {
        return None;
    }
    if is("1") || is("true") || is("on") {
        let fallback = rust_log.map(str::trim).filter(|v| !v.is_empty());
        return Some(fallback.unwrap_or(DEFAULT_FILTER).to_owned());
    }
    Some(value.to_owned())
}

/// Installs the subscriber at most once per process, returning the filter
/// in effect. The host may load the module more than once.
pub(crate) fn init_from_env() -> Option<&'static str> {
    static INSTALLED: OnceLock<Option<String>> = OnceLock::new();
    INSTALLED
        .get_or_init(|| {
            let emod_trace = std::env::var("EMOD_TRACE").ok();
            let rust_log = std::env::var("RUST_LOG").ok();
            let expr = requested_filter(emod_trace.as_deref(), rust_log.as_deref())?;
            let filter = EnvFilter::try_new(&expr).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
            let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).try_init();
            Some(expr)
        })
        .as_deref()
}
