use super::{Env, IntoArgs, Value};
use crate::convert::FromHost;
use crate::error::Result;

/// A host value paired with the environment it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    env: Env,
    value: Value,
}

impl Cell {
    pub fn new(env: Env, value: Value) -> Self {
        Self { env, value }
    }

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn value(&self) -> Value {
        self.value
    }

    /// Calls this value as a function.
    pub fn call(&self, args: impl IntoArgs) -> Result<Cell> {
        let args = args.into_args(self.env)?;
        let ret = self.env.funcall(self.value, &args);
        self.env.maybe_non_local_exit()?;
        Ok(self.env.cell(ret))
    }

    pub fn type_of(&self) -> Cell {
        self.env.cell(self.env.type_of(self.value))
    }

    pub fn is_not_nil(&self) -> bool {
        self.env.is_not_nil(self.value)
    }

    pub fn eq(&self, other: impl Into<Value>) -> bool {
        self.env.eq(self.value, other)
    }

    pub fn extract<T: FromHost>(&self) -> Result<T> {
        self.env.extract(self.value)
    }

    /// Text the host shows for this value with `(format "%s" value)`.
    pub fn display(&self) -> Result<String> {
        self.env.call("format", ("%s", *self))?.extract()
    }

    /// Printed representation, `(format "%S" value)`.
    pub fn repr(&self) -> Result<String> {
        self.env.call("format", ("%S", *self))?.extract()
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        cell.value
    }
}

impl From<&Cell> for Value {
    fn from(cell: &Cell) -> Self {
        cell.value
    }
}
