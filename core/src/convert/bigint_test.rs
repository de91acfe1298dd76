use super::{U64_LIMBS, U128_LIMBS, join_limbs, limbs_for, split_limbs};
use crate::ffi::{LIMB_BITS, Limb};

#[test]
fn test_limb_counts() {
    assert_eq!(limbs_for(LIMB_BITS), 1);
    assert_eq!(limbs_for(LIMB_BITS + 1), 2);
    assert_eq!(U64_LIMBS, (64 / LIMB_BITS) as usize);
    assert_eq!(U128_LIMBS, 2 * U64_LIMBS);
}

#[test]
fn test_split_single_limb() {
    let limbs = split_limbs::<U64_LIMBS>(u64::MAX as u128);
    assert!(limbs.iter().all(|&l| l == Limb::MAX));
}

#[test]
fn test_split_keeps_most_significant_last() {
    let value: u128 = (7u128 << 64) | 3;
    let limbs = split_limbs::<U128_LIMBS>(value);
    assert_eq!(limbs[0], 3);
    assert_ne!(limbs[U128_LIMBS / 2], 0);
    assert_eq!(join_limbs(&limbs, u128::BITS), Some(value));
}

#[test]
fn test_join_rejects_overflow() {
    let max = split_limbs::<U128_LIMBS>(u128::MAX);
    assert_eq!(join_limbs(&max, u128::BITS), Some(u128::MAX));
    assert_eq!(join_limbs(&max, u64::BITS), None);

    let mut too_many = max.to_vec();
    too_many.push(1);
    assert_eq!(join_limbs(&too_many, u128::BITS), None);
}

#[test]
fn test_join_empty_is_zero() {
    assert_eq!(join_limbs(&[], u64::BITS), Some(0));
}
