use emod_core::{
    Cell, Env, Error, InternEnv, Representation, Rest, Result, Spreader, Value, make_inline_module_function,
    make_module_function, make_spreader_function,
};

use crate::Sim;
use crate::test_support::define;

#[test]
fn test_missing_optionals_get_defaults() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-one",
        Spreader::new("", |_env: Env, a: i64| -> Result<Vec<i64>> { Ok(vec![a]) }).min_arity(0),
    )?;
    define(
        &sim,
        "t-two",
        Spreader::new("", |_env: Env, a: i64, b: i64| -> Result<Vec<i64>> { Ok(vec![a, b]) }).min_arity(1),
    )?;
    define(
        &sim,
        "t-three",
        Spreader::new("", |_env: Env, a: i64, b: i64, c: i64| -> Result<Vec<i64>> { Ok(vec![a, b, c]) }).min_arity(1),
    )?;
    define(
        &sim,
        "t-four",
        make_spreader_function("", |_env: Env, a: i64, b: i64, c: i64, d: i64| -> Result<Vec<i64>> {
            Ok(vec![a, b, c, d])
        })
        .min_arity(2),
    )?;

    assert_eq!(sim.eval("(t-one)")?, "[0]");
    assert_eq!(sim.eval("(t-one 5)")?, "[5]");
    assert_eq!(sim.eval("(t-two 1)")?, "[1 0]");
    assert_eq!(sim.eval("(t-three 1 2)")?, "[1 2 0]");
    assert_eq!(sim.eval("(t-three 1 2 3)")?, "[1 2 3]");
    assert_eq!(sim.eval("(t-four 1 2)")?, "[1 2 0 0]");
    assert_eq!(sim.eval("(t-four 1 2 3 4)")?, "[1 2 3 4]");
    Ok(())
}

#[test]
fn test_four_params_with_one_required() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-quad",
        Spreader::new("", |_env: Env, a: i64, b: i64, c: i64, d: i64| -> Result<Vec<i64>> {
            Ok(vec![a, b, c, d])
        })
        .min_arity(1),
    )?;
    assert_eq!(sim.eval("(t-quad 1)")?, "[1 0 0 0]");
    assert_eq!(sim.eval("(t-quad 1 2)")?, "[1 2 0 0]");
    assert_eq!(sim.eval("(t-quad 1 2 3)")?, "[1 2 3 0]");
    assert_eq!(sim.eval("(t-quad 1 2 3 4)")?, "[1 2 3 4]");
    assert_eq!(
        sim.eval("(t-quad)").unwrap_err().to_string(),
        "(wrong-number-of-arguments #<module function> 0)"
    );
    Ok(())
}

#[test]
fn test_cell_params_default_to_nil() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-cells",
        Spreader::new("", |_env: Env, a: Cell, b: Cell| -> Result<Vec<String>> {
            Ok(vec![a.type_of().display()?, b.type_of().display()?])
        })
        .min_arity(1),
    )?;
    assert_eq!(sim.eval("(t-cells 1)")?, "[\"integer\" \"symbol\"]");
    assert_eq!(sim.eval("(t-cells \"s\" 1.5)")?, "[\"string\" \"float\"]");
    assert_eq!(sim.eval("(t-cells 1 nil)")?, "[\"integer\" \"symbol\"]");
    Ok(())
}

#[test]
fn test_host_enforces_declared_arity() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-pair",
        Spreader::new("", |_env: Env, a: i64, b: i64| -> Result<i64> { Ok(a + b) }),
    )?;
    assert_eq!(sim.eval("(t-pair 40 2)")?, "42");
    assert_eq!(
        sim.eval("(t-pair 1)").unwrap_err().to_string(),
        "(wrong-number-of-arguments #<module function> 1)"
    );
    assert_eq!(
        sim.eval("(t-pair 1 2 3)").unwrap_err().to_string(),
        "(wrong-number-of-arguments #<module function> 3)"
    );
    Ok(())
}

#[test]
fn test_spreader_rejects_counts_outside_its_arity() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let pair = env.inject(Spreader::new("", |_env: Env, a: i64, b: i64| -> Result<i64> { Ok(a + b) }))?;
        let one = env.make_integer(1);

        let ret = sim.funcall_unchecked(env, pair, &[one, one]);
        assert_eq!(env.extract::<i64>(ret)?, 2);

        for args in [vec![one; 3], vec![one]] {
            let ret = sim.funcall_unchecked(env, pair, &args);
            assert!(ret.is_null());
            assert_eq!(sim.describe_pending(env).as_deref(), Some("(error \"Bad arity\")"));
            env.non_local_exit_clear();
        }
        Ok(())
    })
}

#[test]
fn test_argument_conversion_errors() -> Result<()> {
    let sim = Sim::new();
    define(&sim, "t-byte", Spreader::new("", |_env: Env, b: u8| -> Result<u8> { Ok(b) }))?;
    assert_eq!(sim.eval("(t-byte 200)")?, "200");
    assert_eq!(
        sim.eval("(t-byte 300)").unwrap_err().to_string(),
        "(error \"Integer out of range\")"
    );
    assert_eq!(
        sim.eval("(t-byte \"x\")").unwrap_err().to_string(),
        "(wrong-type-argument integerp \"x\")"
    );
    Ok(())
}

#[test]
fn test_variadic_rest() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-sum",
        Spreader::new("", |_env: Env, label: String, rest: Rest| -> Result<String> {
            let numbers = rest.extract::<i64>()?;
            Ok(format!("{}:{}:{}", label, rest.len(), numbers.iter().sum::<i64>()))
        }),
    )?;
    define(
        &sim,
        "t-count",
        Spreader::new("", |_env: Env, rest: Rest| -> Result<usize> { Ok(rest.len()) }),
    )?;

    assert_eq!(sim.eval("(t-sum \"none\")")?, "\"none:0:0\"");
    assert_eq!(sim.eval("(t-sum \"all\" 1 2 3 4 5 6 7 8 9 10)")?, "\"all:10:55\"");
    assert_eq!(sim.eval("(t-count)")?, "0");
    assert_eq!(sim.eval("(t-count 'a \"b\" 3)")?, "3");
    assert_eq!(
        sim.eval("(t-sum)").unwrap_err().to_string(),
        "(wrong-number-of-arguments #<module function> 0)"
    );
    Ok(())
}

#[test]
fn test_rest_gives_cells() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-kinds",
        Spreader::new("", |_env: Env, rest: Rest| -> Result<Vec<String>> {
            rest.iter().map(|cell| cell.type_of().display()).collect()
        }),
    )?;
    assert_eq!(sim.eval("(t-kinds 1 1.5 \"s\" 'x)")?, "[\"integer\" \"float\" \"string\" \"symbol\"]");
    Ok(())
}

#[test]
fn test_optional_parameters() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-greet",
        Spreader::new("", |_env: Env, name: String, greeting: Option<String>| -> Result<String> {
            Ok(format!("{}, {}", greeting.as_deref().unwrap_or("Hello"), name))
        })
        .min_arity(1),
    )?;
    assert_eq!(sim.eval("(t-greet \"bob\")")?, "\"Hello, bob\"");
    assert_eq!(sim.eval("(t-greet \"bob\" \"Hi\")")?, "\"Hi, bob\"");
    assert_eq!(sim.eval("(t-greet \"bob\" nil)")?, "\"Hello, bob\"");
    Ok(())
}

#[test]
fn test_min_arity_above_params_is_rejected() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let spreader = Spreader::new("", |_env: Env, a: i64| -> Result<i64> { Ok(a) }).min_arity(2);
        let arity = spreader.arity();
        assert_eq!((arity.min, arity.max, arity.variadic), (2, 1, false));
        let err = env.inject(spreader).unwrap_err();
        assert_eq!(err.message(), Some("Minimum arity 2 exceeds the 1 declared parameters"));
        assert!(!env.non_local_exit_check().is_pending());
        Ok(())
    })
}

#[test]
fn test_closure_representation() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let stateless = make_module_function(0, 0, "", |env: Env, _args: &[Value]| env.make_integer(1));
        assert_eq!(stateless.representation(), Representation::Inline);

        let greeting = String::from("hi");
        let capturing = make_module_function(0, 0, "", move |env: Env, _args: &[Value]| env.make_string(&greeting));
        assert_eq!(capturing.representation(), Representation::Boxed);

        let offset = 40u32;
        let small = make_inline_module_function(1, 1, "", move |env: Env, args: &[Value]| {
            env.run_catching(|| {
                let n: i64 = env.extract(args[0])?;
                Ok(env.make_integer(n + i64::from(offset)))
            })
        });
        assert_eq!(small.representation(), Representation::Inline);

        assert_eq!(env.inject(stateless)?.call(())?.extract::<i64>()?, 1);
        assert_eq!(env.inject(capturing)?.call(())?.extract::<String>()?, "hi");
        assert_eq!(env.inject(small)?.call((2i64,))?.extract::<i64>()?, 42);
        Ok(())
    })
}

#[test]
fn test_raw_function_panics_are_reported() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let f = env.inject(make_module_function(0, 0, "", |_env: Env, _args: &[Value]| -> Value {
            panic!("raw panic")
        }))?;
        assert!(f.call(()).is_err());
        let description = sim.describe_pending(env).unwrap_or_default();
        assert!(
            description == "(error \"Unrecognised exception\")" || description.starts_with("(emod--exception"),
            "{}",
            description
        );
        env.non_local_exit_clear();
        Ok(())
    })
}

#[test]
fn test_unit_and_bool_returns() -> Result<()> {
    let sim = Sim::new();
    define(&sim, "t-unit", Spreader::new("", |_env: Env| -> Result<()> { Ok(()) }))?;
    define(&sim, "t-even", Spreader::new("", |_env: Env, n: i64| -> Result<bool> { Ok(n % 2 == 0) }))?;
    assert_eq!(sim.eval("(t-unit)")?, "nil");
    assert_eq!(sim.eval("(t-even 4)")?, "t");
    assert_eq!(sim.eval("(t-even 3)")?, "nil");
    Ok(())
}

#[test]
fn test_callbacks_can_call_back_into_host() -> Result<()> {
    let sim = Sim::new();
    define(
        &sim,
        "t-apply",
        Spreader::new("", |env: Env, name: String, x: i64| -> Result<i64> {
            env.call(&name, (x, x))?.extract()
        }),
    )?;
    define(
        &sim,
        "t-pair-sum",
        Spreader::new("", |_env: Env, a: i64, b: i64| -> Result<i64> { Ok(a + b) }),
    )?;
    assert_eq!(sim.eval("(t-apply \"t-pair-sum\" 21)")?, "42");
    assert_eq!(sim.eval("(t-apply \"*\" 7)")?, "49");
    assert_eq!(
        sim.eval("(t-apply \"no-such-function\" 1)").unwrap_err().to_string(),
        "(void-function no-such-function)"
    );
    Ok(())
}

#[test]
fn test_run_scoped() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let mut seen = 0;
        env.run_scoped(|inner| {
            seen = inner.inject(5i64)?.extract::<i64>()?;
            Ok(())
        })?;
        assert_eq!(seen, 5);

        let err = env.run_scoped(|_inner| Err(Error::runtime("inside"))).unwrap_err();
        assert_eq!(err.message(), Some("inside"));
        assert!(!env.non_local_exit_check().is_pending());

        let err = env
            .run_scoped(|inner| {
                inner.call("car", (1i64,))?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_non_local_exit());
        assert_eq!(
            sim.describe_pending(env).as_deref(),
            Some("(wrong-type-argument listp 1)")
        );
        env.non_local_exit_clear();
        Ok(())
    })
}

#[test]
fn test_intern_env_caches_symbols() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let mut symbols = InternEnv::new(env);
        let first = symbols.intern("cached-symbol");
        let second = symbols.intern("cached-symbol");
        assert_eq!(first, second);
        symbols.intern("other-symbol");
        assert_eq!(symbols.cached(), 2);
        assert!(symbols.eq(first, env.intern("cached-symbol")));
        Ok(())
    })
}
