use std::ptr;
use std::sync::Arc;

use emod_core::{Env, OwnedUserPtr, Result, Spreader, UserPtr, Version};

use crate::Sim;
use crate::test_support::define;

/// Drops its token when the host finalizes it.
#[derive(Debug)]
struct Tracker {
    token: Arc<()>,
}

fn define_counter(sim: &Sim, name: &str, token: &Arc<()>) -> Result<()> {
    let held = token.clone();
    define(
        sim,
        name,
        Spreader::new("", move |_env: Env| -> Result<usize> { Ok(Arc::strong_count(&held)) }),
    )
}

#[test]
fn test_closure_freed_with_function() -> Result<()> {
    for version in Version::ALL {
        let sim = Sim::with_version(version);
        let token = Arc::new(());
        define_counter(&sim, "t-count", &token)?;

        assert_eq!(sim.eval("(t-count)")?, "2", "{}", version);
        sim.collect_garbage();
        assert_eq!(Arc::strong_count(&token), 2, "{}", version);
        assert_eq!(sim.eval("(t-count)")?, "2", "{}", version);

        sim.eval("(fmakunbound 't-count)")?;
        sim.collect_garbage();
        assert_eq!(Arc::strong_count(&token), 1, "{}", version);
    }
    Ok(())
}

#[test]
fn test_old_hosts_return_alias_symbol() -> Result<()> {
    let sim = Sim::with_version(Version::V27);
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(Spreader::new("", |_env: Env, n: i64| -> Result<i64> { Ok(n * 2) }))?;
        assert_eq!(f.type_of().display()?, "symbol");
        assert!(f.display()?.starts_with("emod-fun-"));
        assert_eq!(f.call((21i64,))?.extract::<i64>()?, 42);
        Ok(())
    })?;

    let sim = Sim::with_version(Version::V28);
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(Spreader::new("", |_env: Env, n: i64| -> Result<i64> { Ok(n * 2) }))?;
        assert_eq!(f.type_of().display()?, "module-function");
        assert!(env.get_function_finalizer(f)?.is_some());
        Ok(())
    })
}

#[test]
fn test_shutdown_runs_finalizers() -> Result<()> {
    let token = Arc::new(());
    {
        let sim = Sim::new();
        define_counter(&sim, "t-count", &token)?;
        assert_eq!(Arc::strong_count(&token), 2);
    }
    assert_eq!(Arc::strong_count(&token), 1);
    Ok(())
}

#[test]
fn test_user_ptr_round_trip_and_type_check() -> Result<()> {
    let sim = Sim::new();
    let token = Arc::new(());
    sim.with_env(|env| -> Result<()> {
        let cell = env.inject(OwnedUserPtr::new(Tracker { token: token.clone() }))?;
        assert_eq!(cell.type_of().display()?, "user-ptr");

        let tracker = cell.extract::<UserPtr<Tracker>>()?;
        assert!(Arc::ptr_eq(&tracker.token, &token));

        let err = cell.extract::<UserPtr<String>>().unwrap_err();
        assert_eq!(err.message(), Some("User ptr type mismatch"));

        let foreign = env.make_user_ptr(None, ptr::null_mut());
        let err = env.extract::<UserPtr<Tracker>>(foreign).unwrap_err();
        assert_eq!(err.message(), Some("User ptr type mismatch"));

        let number = env.make_integer(3);
        assert!(env.extract::<UserPtr<Tracker>>(number).unwrap_err().is_non_local_exit());
        assert_eq!(
            sim.describe_pending(env).as_deref(),
            Some("(wrong-type-argument user-ptrp 3)")
        );
        env.non_local_exit_clear();
        Ok(())
    })?;

    assert_eq!(Arc::strong_count(&token), 2);
    sim.collect_garbage();
    assert_eq!(Arc::strong_count(&token), 1);
    Ok(())
}

#[test]
fn test_owned_user_ptr_not_converted_stays_native() {
    let token = Arc::new(());
    let owned = OwnedUserPtr::new(Tracker { token: token.clone() });
    assert_eq!(Arc::strong_count(&token), 2);
    let tracker = owned.into_inner();
    drop(tracker);
    assert_eq!(Arc::strong_count(&token), 1);
}

#[test]
fn test_global_ref_keeps_value_alive() -> Result<()> {
    let sim = Sim::new();
    let token = Arc::new(());
    let global = sim.with_env(|env| -> Result<_> {
        let cell = env.inject(OwnedUserPtr::new(Tracker { token: token.clone() }))?;
        env.global_ref(cell)
    })?;

    sim.collect_garbage();
    assert_eq!(Arc::strong_count(&token), 2);

    sim.with_env(|env| -> Result<()> {
        let tracker = global.bind(env).extract::<UserPtr<Tracker>>()?;
        assert!(Arc::ptr_eq(&tracker.token, &token));
        global.free(env);
        Ok(())
    })?;

    sim.collect_garbage();
    assert_eq!(Arc::strong_count(&token), 1);
    Ok(())
}

#[test]
fn test_scoped_locals_become_garbage() -> Result<()> {
    let sim = Sim::new();
    let token = Arc::new(());
    sim.with_env(|env| -> Result<()> {
        env.run_scoped(|inner| {
            inner.inject(OwnedUserPtr::new(Tracker { token: token.clone() }))?;
            Ok(())
        })?;
        sim.collect_garbage();
        assert_eq!(Arc::strong_count(&token), 1);
        Ok(())
    })
}

#[test]
fn test_collection_frees_temporaries() -> Result<()> {
    let sim = Sim::new();
    sim.collect_garbage();
    let baseline = sim.live_objects();
    sim.with_env(|env| -> Result<()> {
        for i in 0..50i64 {
            env.inject(vec![i, i + 1])?;
        }
        assert!(sim.live_objects() > baseline + 50);
        Ok(())
    })?;
    sim.collect_garbage();
    assert_eq!(sim.live_objects(), baseline);
    Ok(())
}
