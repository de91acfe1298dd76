use std::fmt;
use std::rc::Rc;

use emod_core::{Boxing, Env, Error, FuncallExit, Result, Spreader, Symbol, Version};

use crate::Sim;
use crate::test_support::define;

#[derive(Debug)]
struct Overheated(u32);

impl fmt::Display for Overheated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overheated at {}", self.0)
    }
}

impl std::error::Error for Overheated {}

#[test]
fn test_native_signal_and_throw_reach_host() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-signal",
        Spreader::new("", |env: Env| -> Result<()> {
            Err(Error::signal(env.intern("arith-error"), env.nil()))
        }),
    )?;
    define(
        &sim,
        "t-throw",
        Spreader::new("", |env: Env| -> Result<()> {
            Err(Error::throw(env.intern("done"), env.make_integer(7)))
        }),
    )?;
    define(
        &sim,
        "t-runtime",
        Spreader::new("", |_env: Env| -> Result<()> { Err(Error::runtime("bad input")) }),
    )?;

    assert_eq!(sim.eval("(t-signal)").unwrap_err().to_string(), "(arith-error)");
    assert_eq!(sim.eval("(t-throw)").unwrap_err().to_string(), "(throw done 7)");
    assert_eq!(sim.eval("(t-runtime)").unwrap_err().to_string(), "(error \"bad input\")");
    Ok(())
}

#[test]
fn test_host_signal_passes_through_callback() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-car",
        Spreader::new("", |env: Env, x: i64| -> Result<i64> {
            env.call("car", (x,))?;
            Ok(x)
        }),
    )?;
    assert_eq!(
        sim.eval("(t-car 1)").unwrap_err().to_string(),
        "(wrong-type-argument listp 1)"
    );
    Ok(())
}

#[test]
fn test_rethrow_unboxes_error_messages() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        assert!(env.call("error", ("boom %d", 3i64)).unwrap_err().is_non_local_exit());
        let err = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert_eq!(err.message(), Some("boom 3"));
        assert_eq!(env.non_local_exit_check(), FuncallExit::Return);

        assert!(env.call("error", ("boom",)).is_err());
        let Error::Signal { symbol, data } = env.rethrow_non_local_exit_with(Boxing::Off).unwrap_err() else {
            panic!("expected a signal");
        };
        assert_eq!(env.cell(symbol).display()?, "error");
        assert_eq!(env.cell(data).repr()?, "(\"boom\")");

        // Extra data after the message is not a plain error message.
        let data = env.call("list", ("odd", 2i64))?;
        env.non_local_exit_signal(env.intern("error"), data);
        assert!(matches!(
            env.rethrow_non_local_exit_with(Boxing::On),
            Err(Error::Signal { .. })
        ));

        assert!(env.call("throw", (Symbol("tag"), 5i64)).is_err());
        let Error::Throw { tag, value } = env.rethrow_non_local_exit().unwrap_err() else {
            panic!("expected a throw");
        };
        assert_eq!(env.cell(tag).display()?, "tag");
        assert_eq!(env.extract::<i64>(value)?, 5);

        assert!(env.rethrow_non_local_exit().is_ok());
        Ok(())
    })
}

#[test]
fn test_boxing_recovers_custom_error() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(
            Spreader::new("", |_env: Env| -> Result<()> { Err(Error::custom(Overheated(451))) }).boxing(Boxing::On),
        )?;
        assert!(f.call(()).unwrap_err().is_non_local_exit());
        let err = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert_eq!(err.downcast_ref::<Overheated>().map(|e| e.0), Some(451));
        assert_eq!(err.to_string(), "overheated at 451");
        Ok(())
    })
}

#[test]
fn test_boxed_error_survives_repeated_unboxing() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(
            Spreader::new("", |_env: Env| -> Result<()> { Err(Error::custom(Overheated(7))) }).boxing(Boxing::On),
        )?;
        assert!(f.call(()).is_err());
        let (_, symbol, data) = env.non_local_exit_get();
        let first = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert_eq!(first.downcast_ref::<Overheated>().map(|e| e.0), Some(7));

        env.non_local_exit_signal(symbol, data);
        let second = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert_eq!(second.downcast_ref::<Overheated>().map(|e| e.0), Some(7));
        let (Error::Boxed(a), Error::Boxed(b)) = (&first, &second) else {
            panic!("expected boxed errors");
        };
        assert!(Rc::ptr_eq(a, b));

        // Reporting a shared error boxes the same error again.
        env.run_catching_with(Boxing::On, || -> Result<()> { Err(second) });
        let third = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert_eq!(third.to_string(), "overheated at 7");

        env.run_catching_with(Boxing::Off, || -> Result<()> { Err(third) });
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(error \"overheated at 7\")"));
        env.non_local_exit_clear();
        Ok(())
    })
}

#[test]
fn test_boxing_recovers_panic() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(
            Spreader::new("", |_env: Env| -> Result<()> { panic!("kaboom") }).boxing(Boxing::On),
        )?;
        assert!(f.call(()).is_err());
        let err = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert_eq!(err.panic_message(), Some("kaboom"));
        Ok(())
    })
}

#[test]
fn test_boxed_error_seen_by_host() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-boxed",
        Spreader::new("", |_env: Env| -> Result<()> { Err(Error::custom(Overheated(1))) }).boxing(Boxing::On),
    )?;
    let shown = sim.eval("(t-boxed)").unwrap_err().to_string();
    assert!(shown.starts_with("(emod--exception . #<user-ptr"), "{}", shown);

    // Without unboxing the native side sees an ordinary signal.
    sim.with_env(|env| -> Result<()> {
        let f = env.call("symbol-function", (Symbol("t-boxed"),))?;
        assert!(f.call(()).is_err());
        let err = env.rethrow_non_local_exit_with(Boxing::Off).unwrap_err();
        assert!(matches!(err, Error::Signal { .. }));
        Ok(())
    })
}

#[test]
fn test_unboxed_reports() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-custom",
        Spreader::new("", |_env: Env| -> Result<()> { Err(Error::custom(Overheated(451))) }).boxing(Boxing::Off),
    )?;
    define(
        &sim,
        "t-panic",
        Spreader::new("", |_env: Env| -> Result<()> { panic!("kaboom") }).boxing(Boxing::Off),
    )?;
    define(
        &sim,
        "t-marker",
        Spreader::new("", |_env: Env| -> Result<()> { Err(Error::NonLocalExit) }).boxing(Boxing::Off),
    )?;
    define(
        &sim,
        "t-anyhow",
        Spreader::new("", |_env: Env| -> Result<()> {
            Err(anyhow::anyhow!("disk full").context("saving buffer"))?
        })
        .boxing(Boxing::Off),
    )?;

    assert_eq!(sim.eval("(t-custom)").unwrap_err().to_string(), "(error \"overheated at 451\")");
    assert_eq!(sim.eval("(t-panic)").unwrap_err().to_string(), "(error \"Unrecognised exception\")");
    assert_eq!(sim.eval("(t-marker)").unwrap_err().to_string(), "(error \"Expected non-local exit\")");
    assert_eq!(
        sim.eval("(t-anyhow)").unwrap_err().to_string(),
        "(error \"saving buffer: disk full\")"
    );
    Ok(())
}

#[test]
fn test_stray_marker_is_boxed_with_boxing_on() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(Spreader::new("", |_env: Env| -> Result<()> { Err(Error::NonLocalExit) }).boxing(Boxing::On))?;
        assert!(f.call(()).is_err());
        let err = env.rethrow_non_local_exit_with(Boxing::On).unwrap_err();
        assert!(err.is_non_local_exit());
        Ok(())
    })
}

#[test]
fn test_pending_exit_wins_over_native_error() -> Result<()> {
    for boxing in [Boxing::Off, Boxing::On] {
        let sim = Sim::new();
        define(
            &sim,
            "t-twice",
            Spreader::new("", |env: Env| -> Result<()> {
                env.non_local_exit_signal(env.intern("arith-error"), env.nil());
                Err(Error::runtime("ignored"))
            })
            .boxing(boxing),
        )?;
        assert_eq!(sim.eval("(t-twice)").unwrap_err().to_string(), "(arith-error)");
    }
    Ok(())
}

#[test]
fn test_operations_while_pending() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let kept = env.make_integer(9);
        env.non_local_exit_signal(env.intern("arith-error"), env.nil());

        assert!(env.intern("anything").is_null());
        assert!(env.make_integer(1).is_null());
        assert!(!env.is_not_nil(kept));
        assert!(env.inject(3i64).is_err());

        let global = env.make_global_ref(kept);
        assert!(!global.is_null());
        env.free_global_ref(global);

        // A second signal does not replace the first.
        env.non_local_exit_signal(env.intern("overflow-error"), env.nil());
        let (kind, symbol, _) = env.non_local_exit_get();
        assert_eq!(kind, FuncallExit::Signal);
        env.non_local_exit_clear();
        assert!(env.eq(symbol, env.intern("arith-error")));
        assert_eq!(env.extract::<i64>(kept)?, 9);
        Ok(())
    })
}

#[test]
fn test_run_catching_returns_default() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let n: i64 = env.run_catching_with(Boxing::Off, || Err(Error::runtime("nope")));
        assert_eq!(n, 0);
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(error \"nope\")"));
        env.non_local_exit_clear();

        let n: i64 = env.run_catching(|| Ok(12));
        assert_eq!(n, 12);
        Ok(())
    })
}

#[test]
fn test_quit_requests() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        env.check_quit()?;
        sim.request_quit();
        assert!(env.should_quit()?);
        assert!(env.check_quit().unwrap_err().is_non_local_exit());
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(quit)"));
        env.non_local_exit_clear();
        env.check_quit()?;
        Ok(())
    })?;

    let sim = Sim::with_version(Version::V26);
    sim.with_env(|env| -> Result<()> {
        sim.request_quit();
        assert!(env.check_quit().is_err());
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(quit)"));
        env.non_local_exit_clear();
        Ok(())
    })
}
