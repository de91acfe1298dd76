use super::{FromHost, IntoHost};
use crate::env::{Cell, Env, Value};
use crate::error::{Error, Result};

/// Indexed access to a host vector.
#[derive(Clone, Copy, Debug)]
pub struct Vector {
    cell: Cell,
}

impl Vector {
    pub fn new(cell: Cell) -> Self {
        Self { cell }
    }

    pub fn cell(&self) -> Cell {
        self.cell
    }

    pub fn len(&self) -> Result<usize> {
        let env = self.cell.env();
        let size = env.vec_size(self.cell);
        env.maybe_non_local_exit()?;
        usize::try_from(size).map_err(|_| Error::runtime("Invalid vector size"))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<Cell> {
        let env = self.cell.env();
        let item = env.vec_get(self.cell, index as isize);
        env.maybe_non_local_exit()?;
        Ok(env.cell(item))
    }

    pub fn set(&self, index: usize, item: impl IntoHost) -> Result<()> {
        let env = self.cell.env();
        let item = item.into_host(env)?;
        env.maybe_non_local_exit()?;
        env.vec_set(self.cell, index as isize, item);
        env.maybe_non_local_exit()
    }

    pub fn iter(self) -> Result<impl Iterator<Item = Result<Cell>>> {
        let len = self.len()?;
        Ok((0..len).map(move |i| self.get(i)))
    }
}

impl IntoHost for Vector {
    fn into_host(self, _env: Env) -> Result<Value> {
        Ok(self.cell.value())
    }
}

impl FromHost for Vector {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        Ok(Vector::new(env.cell(value)))
    }
}
