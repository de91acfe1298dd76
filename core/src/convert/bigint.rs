use std::ffi::c_int;

use super::out_of_range;
use crate::env::{Env, Value};
use crate::error::Result;
use crate::ffi::{LIMB_BITS, Limb, Version};

/// Number of limbs needed to hold an unsigned integer `bits` wide.
pub const fn limbs_for(bits: u32) -> usize {
    bits.div_ceil(LIMB_BITS) as usize
}

pub const U64_LIMBS: usize = limbs_for(u64::BITS);
pub const U128_LIMBS: usize = limbs_for(u128::BITS);

/// Splits `magnitude` into `N` limbs, least significant first. The
/// magnitude must fit in `N` limbs.
pub fn split_limbs<const N: usize>(magnitude: u128) -> [Limb; N] {
    let mut limbs = [0 as Limb; N];
    if N == 1 {
        limbs[0] = magnitude as Limb;
        return limbs;
    }
    let mut rest = magnitude;
    for limb in limbs.iter_mut() {
        *limb = rest as Limb;
        rest = rest.checked_shr(LIMB_BITS).unwrap_or(0);
    }
    limbs
}

/// Reassembles limbs (least significant first) into a magnitude, or `None`
/// if it does not fit in `bits` bits.
pub fn join_limbs(limbs: &[Limb], bits: u32) -> Option<u128> {
    let mut acc: u128 = 0;
    for &limb in limbs.iter().rev() {
        if acc.leading_zeros() < LIMB_BITS {
            return None;
        }
        acc = (acc << LIMB_BITS) | limb as u128;
    }
    if bits < u128::BITS && acc >> bits != 0 {
        return None;
    }
    Some(acc)
}

pub(super) fn make<const N: usize>(env: Env, negative: bool, magnitude: u128) -> Result<Value> {
    env.check_compatible(Version::V27)?;
    let limbs = split_limbs::<N>(magnitude);
    let used = limbs.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1);
    let sign: c_int = match (used, negative) {
        (0, _) => 0,
        (_, true) => -1,
        (_, false) => 1,
    };
    env.make_big_integer(sign, &limbs[..used])
}

/// Sign and magnitude of an integer that must fit in `N` limbs and `bits`
/// bits.
pub(super) fn extract<const N: usize>(env: Env, value: Value, bits: u32) -> Result<(bool, u128)> {
    let mut sign: c_int = 0;
    let mut count = N as isize;
    let mut limbs = [0 as Limb; N];
    if !env.extract_big_integer(value, &mut sign, &mut count, Some(&mut limbs))? {
        env.maybe_non_local_exit()?;
        return Err(out_of_range());
    }
    if sign == 0 {
        return Ok((false, 0));
    }
    let used = usize::try_from(count).unwrap_or(0).min(N);
    let magnitude = join_limbs(&limbs[..used], bits).ok_or_else(out_of_range)?;
    Ok((sign < 0, magnitude))
}
