use std::ops::Deref;

use crate::env::{Env, Value};

type SymbolCache = rustc_hash::FxHashMap<Box<str>, Value>;

/// An [`Env`] that remembers the symbols it interned. Cached values are
/// local to the current call, so the cache must not outlive it.
pub struct InternEnv {
    env: Env,
    symbols: SymbolCache,
}

impl InternEnv {
    pub fn new(env: Env) -> Self {
        Self {
            env,
            symbols: SymbolCache::default(),
        }
    }

    pub fn intern(&mut self, name: &str) -> Value {
        if let Some(&symbol) = self.symbols.get(name) {
            return symbol;
        }
        let symbol = self.env.intern(name);
        if !self.env.non_local_exit_check().is_pending() {
            self.symbols.insert(name.into(), symbol);
        }
        symbol
    }

    pub fn cached(&self) -> usize {
        self.symbols.len()
    }
}

impl Deref for InternEnv {
    type Target = Env;

    fn deref(&self) -> &Env {
        &self.env
    }
}
