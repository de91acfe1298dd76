use emod_core::function::{Spread, Spreader};
use emod_core::{Result, Symbol};

use crate::Sim;

/// Installs `spreader` as the global function `name`.
pub(crate) fn define<F, M>(sim: &Sim, name: &str, spreader: Spreader<F, M>) -> Result<()>
where
    F: Spread<M>,
{
    sim.with_env(|env| env.call("defalias", (Symbol(name), spreader)).map(drop))
}
