//! A small Emacs module exercising the `emod` bindings.
//!
//! Load it from Emacs with `(module-load "libemod_demo.so")` and
//! `(require 'emod-demo)`. Set `EMOD_TRACE=1` to log boundary events.

use std::cell::Cell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use emod_core::{Config, Env, Error, OwnedUserPtr, Rest, Result, Spreader, Symbol, UserPtr, Value, Version};

mod trace;


pub const FEATURE: &str = "emod-demo";

/// State behind the user pointers made by `emod-demo-counter-new`.
type Counter = Cell<i64>;

emod_core::export_module!(Config::new().min_version(Version::V25), init);

fn defalias<F, M>(env: Env, name: &str, spreader: Spreader<F, M>) -> Result<()>
where
    F: emod_core::function::Spread<M>,
{
    env.call("defalias", (Symbol(name), spreader))?;
    Ok(())
}

fn init(env: Env) -> Result<()> {
    let filter = trace::init_from_env();
    tracing::debug!(target: "emod_demo", version = ?env.version(), ?filter, "initialising");

    defalias(
        env,
        "emod-demo-add",
        Spreader::new("Add two integers.", |_env: Env, a: i64, b: i64| -> Result<i64> {
            a.checked_add(b).ok_or_else(|| Error::runtime("Integer overflow"))
        }),
    )?;
    defalias(
        env,
        "emod-demo-greet",
        Spreader::new(
            "Greet NAME, with GREETING or \"Hello\".\n\n(fn NAME &optional GREETING)",
            |_env: Env, name: String, greeting: Option<String>| -> Result<String> {
                Ok(format!("{}, {}!", greeting.as_deref().unwrap_or("Hello"), name))
            },
        )
        .min_arity(1),
    )?;
    defalias(
        env,
        "emod-demo-sum",
        Spreader::new("Sum any number of integers.", |_env: Env, numbers: Rest| -> Result<i64> {
            numbers
                .extract::<i64>()?
                .into_iter()
                .try_fold(0i64, |acc, n| acc.checked_add(n))
                .ok_or_else(|| Error::runtime("Integer overflow"))
        }),
    )?;
    defalias(
        env,
        "emod-demo-parse-port",
        Spreader::new("Parse TEXT as a TCP port.", |_env: Env, text: String| -> Result<u16> {
            let port = text.trim().parse::<u16>().with_context(|| format!("invalid port {:?}", text))?;
            Ok(port)
        }),
    )?;
    defalias(
        env,
        "emod-demo-counter-new",
        Spreader::new("Make a counter starting at START.", |_env: Env, start: i64| -> Result<OwnedUserPtr<Counter>> {
            Ok(OwnedUserPtr::new(Counter::new(start)))
        })
        .min_arity(0),
    )?;
    defalias(
        env,
        "emod-demo-counter-incr",
        Spreader::new("Increment COUNTER and return its new value.", |env: Env, counter: Value| -> Result<i64> {
            let counter = env.extract::<UserPtr<Counter>>(counter)?;
            let count: &Counter = counter.get();
            let next = count.get().checked_add(1).ok_or_else(|| Error::runtime("Integer overflow"))?;
            count.set(next);
            Ok(next)
        }),
    )?;
    defalias(
        env,
        "emod-demo-now",
        Spreader::new("Current time as a Lisp timestamp.", |_env: Env| -> Result<Duration> {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|_| Error::runtime("Clock is before the epoch"))
        }),
    )?;

    env.call("provide", (Symbol(FEATURE),))?;
    tracing::debug!(target: "emod_demo", feature = FEATURE, "provided");
    Ok(())
}
