use std::any::Any;
use std::ffi::NulError;
use std::fmt;
use std::rc::Rc;

use crate::env::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Native-side failure crossing the module boundary.
pub enum Error {
    /// The host already has a pending signal or throw; its state is left
    /// untouched so the exit propagates once control returns to the host.
    NonLocalExit,
    /// A signal taken out of the host state.
    Signal { symbol: Value, data: Value },
    /// A throw taken out of the host state.
    Throw { tag: Value, value: Value },
    /// Plain error with a message, reported to the host as `error`.
    Runtime(String),
    /// Any other native error. Keeps its concrete type for `downcast_ref`.
    Custom(anyhow::Error),
    /// Payload of a caught panic.
    Panic(Box<dyn Any + Send + 'static>),
    /// A native error recovered from a boxed host signal. The host value
    /// still holds it, so unboxing the same signal again yields it again.
    Boxed(Rc<Error>),
}

impl Error {
    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }

    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Custom(anyhow::Error::new(err))
    }

    pub fn signal(symbol: impl Into<Value>, data: impl Into<Value>) -> Self {
        Error::Signal {
            symbol: symbol.into(),
            data: data.into(),
        }
    }

    pub fn throw(tag: impl Into<Value>, value: impl Into<Value>) -> Self {
        Error::Throw {
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// The error itself, or the one a [`Error::Boxed`] shares.
    pub fn resolved(&self) -> &Error {
        match self {
            Error::Boxed(inner) => inner.resolved(),
            err => err,
        }
    }

    pub fn is_non_local_exit(&self) -> bool {
        matches!(self.resolved(), Error::NonLocalExit)
    }

    /// Message carried by a runtime error.
    pub fn message(&self) -> Option<&str> {
        match self.resolved() {
            Error::Runtime(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self.resolved() {
            Error::Custom(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Text of a panic payload raised with a string message.
    pub fn panic_message(&self) -> Option<&str> {
        match self.resolved() {
            Error::Panic(payload) => panic_payload_str(payload.as_ref()),
            _ => None,
        }
    }
}

pub(crate) fn panic_payload_str(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NonLocalExit => f.write_str("NonLocalExit"),
            Error::Signal { symbol, data } => f
                .debug_struct("Signal")
                .field("symbol", symbol)
                .field("data", data)
                .finish(),
            Error::Throw { tag, value } => f.debug_struct("Throw").field("tag", tag).field("value", value).finish(),
            Error::Runtime(msg) => f.debug_tuple("Runtime").field(msg).finish(),
            Error::Custom(err) => f.debug_tuple("Custom").field(err).finish(),
            Error::Panic(payload) => f
                .debug_tuple("Panic")
                .field(&panic_payload_str(payload.as_ref()).unwrap_or("<opaque>"))
                .finish(),
            Error::Boxed(inner) => f.debug_tuple("Boxed").field(inner).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NonLocalExit => f.write_str("non-local exit pending in host"),
            Error::Signal { .. } => f.write_str("host signal"),
            Error::Throw { .. } => f.write_str("host throw"),
            Error::Runtime(msg) => f.write_str(msg),
            Error::Custom(err) => write!(f, "{:#}", err),
            Error::Panic(payload) => match panic_payload_str(payload.as_ref()) {
                Some(msg) => write!(f, "panic: {}", msg),
                None => f.write_str("panic"),
            },
            Error::Boxed(inner) => fmt::Display::fmt(inner, f),
        }
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Custom(err)
    }
}

impl From<NulError> for Error {
    fn from(_: NulError) -> Self {
        Error::runtime("String contains an interior nul byte")
    }
}
