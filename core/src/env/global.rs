use super::{Cell, Env, Value};
use crate::error::Result;

/// A value promoted out of the local frame. Must be released exactly once
/// with [`GlobalRef::free`].
#[must_use = "global references must be released with `GlobalRef::free`"]
#[derive(Debug)]
pub struct GlobalRef {
    value: Value,
    live: bool,
}

impl GlobalRef {
    pub fn value(&self) -> Value {
        self.value
    }

    /// The referenced value as seen from `env`.
    pub fn bind(&self, env: Env) -> Cell {
        env.cell(self.value)
    }

    pub fn free(mut self, env: Env) {
        env.free_global_ref(self.value);
        self.live = false;
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        if self.live {
            tracing::warn!(target: "emod::env", "global reference dropped without being freed; host value leaked");
        }
    }
}

impl Env {
    /// Promotes `value` to a [`GlobalRef`].
    pub fn global_ref(&self, value: impl Into<Value>) -> Result<GlobalRef> {
        let value = self.make_global_ref(value);
        self.maybe_non_local_exit()?;
        Ok(GlobalRef { value, live: true })
    }
}
