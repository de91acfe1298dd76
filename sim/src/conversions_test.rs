use std::time::Duration;

use chrono::{DateTime, Utc};
use emod_core::{Result, Symbol, Vector, Version};

use crate::Sim;

#[test]
fn test_scalar_round_trips() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        assert_eq!(env.inject(42i64)?.extract::<i64>()?, 42);
        assert_eq!(env.inject(-7i32)?.extract::<i32>()?, -7);
        assert_eq!(env.inject(255u8)?.extract::<u8>()?, 255);
        assert_eq!(env.inject("héllo wörld")?.extract::<String>()?, "héllo wörld");
        assert_eq!(env.inject(String::new())?.extract::<String>()?, "");
        assert_eq!(env.inject(1.5f64)?.extract::<f64>()?, 1.5);
        assert_eq!(env.inject(0.25f32)?.extract::<f32>()?, 0.25);
        assert!(env.inject(true)?.extract::<bool>()?);
        assert!(!env.inject(false)?.extract::<bool>()?);
        assert!(!env.inject(())?.is_not_nil());
        Ok(())
    })
}

#[test]
fn test_narrow_integer_out_of_range() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let err = env.inject(300i64)?.extract::<u8>().unwrap_err();
        assert_eq!(err.message(), Some("Integer out of range"));
        let err = env.inject(-1i64)?.extract::<u32>().unwrap_err();
        assert_eq!(err.message(), Some("Integer out of range"));
        assert!(!env.non_local_exit_check().is_pending());
        Ok(())
    })
}

#[test]
fn test_wide_unsigned_round_trips() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        assert_eq!(env.inject(u64::MAX)?.extract::<u64>()?, u64::MAX);
        assert_eq!(env.inject(u64::MAX)?.repr()?, "18446744073709551615");

        let above_i64 = i64::MAX as u64 + 15;
        let cell = env.inject(above_i64)?;
        assert_eq!(cell.extract::<u64>()?, above_i64);
        assert_eq!(cell.extract::<u128>()?, above_i64 as u128);

        assert_eq!(env.inject(u128::MAX)?.extract::<u128>()?, u128::MAX);
        assert_eq!(env.inject(i128::MIN)?.extract::<i128>()?, i128::MIN);
        assert_eq!(env.inject(i128::MIN + 1)?.extract::<i128>()?, i128::MIN + 1);
        assert_eq!(env.inject(usize::MAX)?.extract::<usize>()?, usize::MAX);
        Ok(())
    })
}

#[test]
fn test_wide_values_rejected_by_narrow_targets() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let above_i64 = env.inject(i64::MAX as u64 + 15)?;
        assert!(above_i64.extract::<i64>().is_err());
        assert_eq!(
            sim.describe_pending(env).as_deref(),
            Some("(overflow-error 9223372036854775822)")
        );
        env.non_local_exit_clear();

        let err = env.inject(-1i64)?.extract::<u64>().unwrap_err();
        assert_eq!(err.message(), Some("Integer out of range"));

        let ten_times_max = env.call("read", ("184467440737095516150",))?;
        assert_eq!(ten_times_max.extract::<u128>()?, u64::MAX as u128 * 10);
        assert!(ten_times_max.extract::<u64>().is_err());
        env.non_local_exit_clear();

        let err = env.inject(u128::MAX)?.extract::<i128>().unwrap_err();
        assert_eq!(err.message(), Some("Integer out of range"));
        Ok(())
    })
}

#[test]
fn test_malformed_read_leaves_signal() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let err = env.call("read", (")",)).unwrap_err();
        assert!(err.is_non_local_exit());
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(invalid-read-syntax \")\")"));
        env.non_local_exit_clear();

        assert!(env.call("read", ("(1 2",)).is_err());
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(end-of-file)"));
        env.non_local_exit_clear();
        Ok(())
    })
}

#[test]
fn test_string_conversion_of_non_string() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let err = env.inject(12i64)?.extract::<String>().unwrap_err();
        assert!(err.is_non_local_exit());
        assert_eq!(
            sim.describe_pending(env).as_deref(),
            Some("(wrong-type-argument stringp 12)")
        );
        env.non_local_exit_clear();
        Ok(())
    })
}

#[test]
fn test_option_maps_nil() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let none = env.inject(None::<i64>)?;
        assert!(!none.is_not_nil());
        assert_eq!(none.extract::<Option<i64>>()?, None);
        assert_eq!(env.inject(Some(3i64))?.extract::<Option<i64>>()?, Some(3));
        Ok(())
    })
}

#[test]
fn test_vectors() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let cell = env.inject(vec![1i64, 2, 3])?;
        assert_eq!(cell.repr()?, "[1 2 3]");
        assert_eq!(cell.extract::<Vec<i64>>()?, vec![1, 2, 3]);

        let vector = cell.extract::<Vector>()?;
        assert_eq!(vector.len()?, 3);
        vector.set(1, "two")?;
        assert_eq!(cell.repr()?, "[1 \"two\" 3]");
        assert_eq!(vector.get(1)?.display()?, "two");

        assert!(vector.get(3).is_err());
        assert_eq!(sim.describe_pending(env).as_deref(), Some("(args-out-of-range [1 \"two\" 3] 3)"));
        env.non_local_exit_clear();
        Ok(())
    })
}

#[test]
fn test_symbols_and_display() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let sym = env.inject(Symbol("some-symbol"))?;
        assert!(sym.eq(env.intern("some-symbol")));
        assert_eq!(sym.type_of().display()?, "symbol");
        assert_eq!(env.inject("quoted \"text\"")?.repr()?, "\"quoted \\\"text\\\"\"");
        assert_eq!(env.inject("quoted \"text\"")?.display()?, "quoted \"text\"");
        assert_eq!(env.inject(2.0f64)?.display()?, "2.0");
        Ok(())
    })
}

#[test]
fn test_time_conversions() -> Result<()> {
    let sim = Sim::new();
    sim.with_env(|env| -> Result<()> {
        let duration = Duration::from_millis(1500);
        let cell = env.inject(duration)?;
        assert_eq!(cell.repr()?, "(1500000000 . 1000000000)");
        assert_eq!(cell.extract::<Duration>()?, duration);

        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 250).expect("valid timestamp");
        assert_eq!(env.inject(at)?.extract::<DateTime<Utc>>()?, at);

        assert_eq!(env.inject(5i64)?.extract::<Duration>()?, Duration::from_secs(5));
        assert_eq!(env.inject(0.5f64)?.extract::<Duration>()?, Duration::from_millis(500));
        Ok(())
    })
}

#[test]
fn test_old_host_falls_back() -> Result<()> {
    let sim = Sim::with_version(Version::V25);
    sim.with_env(|env| -> Result<()> {
        assert_eq!(env.version(), Some(Version::V25));
        assert_eq!(env.inject(5u64)?.extract::<u64>()?, 5);
        assert_eq!(env.inject(-9i128)?.extract::<i128>()?, -9);

        let err = env.inject(u64::MAX).unwrap_err();
        assert_eq!(err.message(), Some("Emacs major version 27 required"));
        let err = env.inject(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.message(), Some("Emacs major version 27 required"));
        assert!(env.should_quit().is_err());
        assert!(!env.non_local_exit_check().is_pending());
        Ok(())
    })
}
