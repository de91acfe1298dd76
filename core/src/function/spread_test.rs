use super::Arity;
use crate::ffi::VARIADIC_ARITY;

#[test]
fn test_fixed_arity_slots() {
    let arity = Arity {
        min: 1,
        max: 4,
        variadic: false,
    };
    assert_eq!(arity.slot(0), None);
    assert_eq!(arity.slot(1), Some(0));
    assert_eq!(arity.slot(4), Some(3));
    assert_eq!(arity.slot(5), None);
    assert_eq!(arity.host_max(), 4);
}

#[test]
fn test_variadic_arity_shares_last_slot() {
    let arity = Arity {
        min: 1,
        max: 2,
        variadic: true,
    };
    assert!(!arity.accepts(0));
    assert_eq!(arity.slot(2), Some(1));
    assert_eq!(arity.slot(9), Some(1));
    assert_eq!(arity.host_max(), VARIADIC_ARITY);
}

#[test]
fn test_thunk_arity() {
    let arity = Arity {
        min: 0,
        max: 0,
        variadic: false,
    };
    assert_eq!(arity.slot(0), Some(0));
    assert!(!arity.accepts(1));
}
