use super::KEY_SPACE;

/// Width of the permuted domain. `2^42` is the smallest power of two that
/// covers [`KEY_SPACE`], which keeps cycle walking to ~1.25 rounds on average.
const BITS: u32 = 42;
const MASK: u64 = (1 << BITS) - 1;

const ROUND_KEY: u64 = 0x2F1_A4C3_9B5D;
const M1: u64 = 0xBF58_476D_1CE4_E5B9;
const M2: u64 = 0x94D0_49BB_1331_11EB;
const M1_INV: u64 = mod_inverse(M1);
const M2_INV: u64 = mod_inverse(M2);
const S1: u32 = 21;
const S2: u32 = 18;
const S3: u32 = 23;

/// Inverse of an odd `a` modulo `2^64`. Each Newton step doubles the number of
/// correct low bits, starting from 3 (`a * a == 1 mod 8` for odd `a`).
const fn mod_inverse(a: u64) -> u64 {
    let mut inv = a;
    let mut i = 0;
    while i < 5 {
        inv = inv.wrapping_mul(2_u64.wrapping_sub(a.wrapping_mul(inv)));
        i += 1;
    }
    inv
}

/// Inverts `x ^= x >> shift` over `BITS`-wide values.
const fn unxorshift(y: u64, shift: u32) -> u64 {
    let mut x = y;
    let mut s = shift;
    while s < BITS {
        x ^= y >> s;
        s += shift;
    }
    x
}

/// Finalizer-style permutation of `[0, 2^BITS)`. Every round (xor with a
/// constant, xor-shift right, multiply by an odd constant mod `2^BITS`) is
/// invertible on its own.
const fn permute(mut x: u64) -> u64 {
    x ^= ROUND_KEY;
    x ^= x >> S1;
    x = x.wrapping_mul(M1) & MASK;
    x ^= x >> S2;
    x = x.wrapping_mul(M2) & MASK;
    x ^= x >> S3;
    x
}

const fn unpermute(mut x: u64) -> u64 {
    x = unxorshift(x, S3);
    x = x.wrapping_mul(M2_INV) & MASK;
    x = unxorshift(x, S2);
    x = x.wrapping_mul(M1_INV) & MASK;
    x = unxorshift(x, S1);
    x ^ ROUND_KEY
}

/// Maps `[0, KEY_SPACE)` onto itself bijectively.
///
/// The permutation spans `2^42` values, so results that land past the key
/// space are fed back through it until they fall inside (cycle walking). The
/// walk always terminates because the starting value is itself in range and
/// lies on the same cycle.
///
/// The caller guarantees `counter < KEY_SPACE`.
#[inline]
pub(crate) const fn scramble(counter: u64) -> u64 {
    let mut x = permute(counter);
    while x >= KEY_SPACE {
        x = permute(x);
    }
    x
}

/// Inverse of [`scramble`]. The caller guarantees `value < KEY_SPACE`.
#[inline]
pub(crate) const fn unscramble(value: u64) -> u64 {
    let mut x = unpermute(value);
    while x >= KEY_SPACE {
        x = unpermute(x);
    }
    x
}
