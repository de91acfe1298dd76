//! Bridge between the host's pending non-local exit and native `Result`s.
//!
//! Host → native: after a host call, [`Env::maybe_non_local_exit`] turns a
//! pending exit into [`Error::NonLocalExit`] without touching the host
//! state, while [`Env::rethrow_non_local_exit`] takes the exit out of the
//! host and returns it as a value.
//!
//! Native → host: [`Env::run_catching`] runs native code and reports any
//! error or panic as a pending host exit, so nothing unwinds into the host.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::config::Boxing;
use crate::convert::FromHost;
use crate::env::{Env, FuncallExit, Value};
use crate::error::{Error, Result};

mod boxed;

pub use boxed::BOXED_ERROR_SYMBOL;

impl Env {
    /// Fails with the valueless marker if an exit is pending. The host
    /// state is left as is.
    pub fn maybe_non_local_exit(&self) -> Result<()> {
        if self.non_local_exit_check().is_pending() {
            Err(Error::NonLocalExit)
        } else {
            Ok(())
        }
    }

    /// Takes a pending exit out of the host and returns it as an error,
    /// unboxing according to [`Boxing::DEFAULT`].
    pub fn rethrow_non_local_exit(&self) -> Result<()> {
        self.rethrow_non_local_exit_with(Boxing::DEFAULT)
    }

    /// Takes a pending exit out of the host and returns it as an error.
    ///
    /// With `unbox` on, an `error` signal carrying a single string message
    /// becomes [`Error::Runtime`], and a boxed native error comes back as
    /// [`Error::Boxed`] sharing the error that was raised. Otherwise the
    /// result is [`Error::Signal`] or [`Error::Throw`].
    pub fn rethrow_non_local_exit_with(&self, unbox: Boxing) -> Result<()> {
        let (kind, symbol, data) = self.non_local_exit_get();
        match kind {
            FuncallExit::Return => Ok(()),
            FuncallExit::Throw => {
                self.non_local_exit_clear();
                Err(Error::Throw { tag: symbol, value: data })
            }
            FuncallExit::Signal => {
                self.non_local_exit_clear();
                if unbox.is_on()
                    && let Some(err) = self.unbox_signal(symbol, data)
                {
                    return Err(err);
                }
                Err(Error::Signal { symbol, data })
            }
        }
    }

    fn unbox_signal(&self, symbol: Value, data: Value) -> Option<Error> {
        if self.eq(symbol, self.intern("error")) {
            return self.error_message(data).map(Error::Runtime);
        }
        if self.eq(symbol, self.intern(BOXED_ERROR_SYMBOL)) {
            return boxed::unbox(self, data);
        }
        None
    }

    /// Message of `error` signal data shaped `("message")`. Any host error
    /// raised while inspecting the data is cleared.
    fn error_message(&self, data: Value) -> Option<String> {
        let inspected = (|| -> Result<Option<String>> {
            if !self.is_not_nil(data) || self.call("cdr", [data])?.is_not_nil() {
                return Ok(None);
            }
            let message = self.call("car", [data])?;
            if !self.call("stringp", [message.value()])?.is_not_nil() {
                return Ok(None);
            }
            String::from_host(*self, message.value()).map(Some)
        })();
        match inspected {
            Ok(message) => message,
            Err(_) => {
                self.non_local_exit_clear();
                None
            }
        }
    }

    /// Runs `body`, reporting any error or panic to the host according to
    /// [`Boxing::DEFAULT`]. Returns `T::default()` on failure.
    pub fn run_catching<T, F>(&self, body: F) -> T
    where
        T: Default,
        F: FnOnce() -> Result<T>,
    {
        self.run_catching_with(Boxing::DEFAULT, body)
    }

    /// Runs `body` and converts a failure into a pending host exit:
    ///
    /// - an exit already pending in the host wins and the error is dropped;
    /// - [`Error::Signal`] and [`Error::Throw`] are raised again as they were;
    /// - [`Error::Runtime`] becomes `(error message)`;
    /// - the marker, custom errors and panics are boxed with `boxing` on.
    ///   With it off, custom errors report their message, the marker reports
    ///   "Expected non-local exit" and panics "Unrecognised exception".
    pub fn run_catching_with<T, F>(&self, boxing: Boxing, body: F) -> T
    where
        T: Default,
        F: FnOnce() -> Result<T>,
    {
        let outcome = catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| Err(Error::Panic(payload)));
        match outcome {
            Ok(value) => value,
            Err(err) => {
                self.report_error(err, boxing);
                T::default()
            }
        }
    }

    pub(crate) fn report_error(&self, err: Error, boxing: Boxing) {
        if self.non_local_exit_check().is_pending() {
            tracing::debug!(target: "emod::exit", error = %err, "host exit already pending; dropping native error");
            return;
        }
        match err {
            Error::Signal { symbol, data } => self.non_local_exit_signal(symbol, data),
            Error::Throw { tag, value } => self.non_local_exit_throw(tag, value),
            Error::Runtime(message) => self.signal_error(&message),
            Error::Boxed(shared) => match Rc::try_unwrap(shared) {
                Ok(err) => self.report_error(err, boxing),
                Err(shared) => self.report_shared(shared, boxing),
            },
            err if boxing.is_on() => boxed::raise(self, err),
            err => self.signal_error(&unrecognised_message(&err)),
        }
        debug_assert!(self.non_local_exit_check().is_pending());
    }

    /// Reports an error that is still held by a boxed host value.
    fn report_shared(&self, shared: Rc<Error>, boxing: Boxing) {
        let host_error = matches!(
            shared.resolved(),
            Error::Signal { .. } | Error::Throw { .. } | Error::Runtime(_)
        );
        if boxing.is_on() && !host_error {
            boxed::raise(self, Error::Boxed(shared));
            return;
        }
        match shared.resolved() {
            Error::Signal { symbol, data } => self.non_local_exit_signal(*symbol, *data),
            Error::Throw { tag, value } => self.non_local_exit_throw(*tag, *value),
            Error::Runtime(message) => self.signal_error(message),
            err => self.signal_error(&unrecognised_message(err)),
        }
    }

    /// Leaves `(error "%s" message)` pending.
    fn signal_error(&self, message: &str) {
        let error = self.intern("error");
        let args = [self.make_string("%s"), self.make_string(message)];
        self.funcall(error, &args);
    }
}

/// Host error message for a native error reported with boxing off.
fn unrecognised_message(err: &Error) -> String {
    match err.resolved() {
        Error::NonLocalExit => "Expected non-local exit".to_string(),
        Error::Custom(err) => format!("{:#}", err),
        Error::Panic(payload) => {
            if let Some(message) = crate::error::panic_payload_str(payload.as_ref()) {
                tracing::warn!(target: "emod::exit", "panic in module function: {}", message);
            }
            "Unrecognised exception".to_string()
        }
        err => err.to_string(),
    }
}
