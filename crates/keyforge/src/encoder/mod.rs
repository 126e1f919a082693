//! Fixed-length base62 key encoding.
//!
//! A reserved counter value is turned into a key in two steps:
//!
//! 1. The value is scrambled by a bijective permutation of `[0, KEY_SPACE)`,
//!    so consecutive counters produce unrelated-looking keys.
//! 2. The scrambled value is written as [`KEY_LEN`] base62 digits over
//!    `[0-9A-Za-z]`, most significant digit first.
//!
//! Both steps are invertible, so [`decode`] recovers the counter. Distinct
//! counters in `[0, KEY_SPACE)` always map to distinct keys. Counters at or
//! beyond [`KEY_SPACE`] are rejected rather than wrapped, since wrapping would
//! hand out a key that was already issued.
//!
//! The scrambling only defeats casual guessing of the next key. It is not a
//! cipher and keys must not be treated as secrets.

mod base62;
mod error;
mod mix;

pub use error::*;

use crate::{Error, Result};

/// Number of characters in every key.
pub const KEY_LEN: usize = 7;

/// Number of distinct keys, `62^KEY_LEN`. Valid counters are
/// `0..KEY_SPACE`.
pub const KEY_SPACE: u64 = 3_521_614_606_208;

const _: () = assert!(KEY_SPACE == 62_u64.pow(KEY_LEN as u32));

/// Fixed-size output buffer for [`encode_to_buf`].
pub type KeyBuf = [u8; KEY_LEN];

/// Encodes `counter` into a newly allocated key.
///
/// # Errors
///
/// Returns [`Error::EncodingDomain`] if `counter >= KEY_SPACE`.
///
/// # Example
///
/// ```
/// let key = keyforge::encode(42).unwrap();
/// assert_eq!(key.len(), keyforge::KEY_LEN);
/// assert_eq!(keyforge::decode(&key).unwrap(), 42);
/// ```
pub fn encode(counter: u64) -> Result<String> {
    let mut buf = KeyBuf::default();
    encode_to_buf(counter, &mut buf)?;
    // Every byte comes from the ASCII alphabet.
    Ok(buf.iter().map(|&b| char::from(b)).collect())
}

/// Zero-allocation form of [`encode`].
///
/// # Errors
///
/// Returns [`Error::EncodingDomain`] if `counter >= KEY_SPACE`; `buf` is left
/// untouched in that case.
pub fn encode_to_buf(counter: u64, buf: &mut KeyBuf) -> Result<()> {
    if counter >= KEY_SPACE {
        return Err(Error::EncodingDomain { counter });
    }
    base62::write_digits(mix::scramble(counter), buf);
    Ok(())
}

/// Recovers the counter a key was minted from.
///
/// # Errors
///
/// Returns [`Error::Decode`] if `key` is not exactly [`KEY_LEN`] characters of
/// `[0-9A-Za-z]`.
pub fn decode(key: &str) -> Result<u64> {
    let scrambled = base62::read_digits(key)?;
    Ok(mix::unscramble(scrambled))
}

/// Returns `true` if `s` has the shape of a key.
pub fn is_key(s: &str) -> bool {
    base62::read_digits(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn known_keys_are_stable() {
        assert_eq!(encode(0).unwrap(), "cVl0YLy");
        assert_eq!(encode(1).unwrap(), "gW0qPTe");
        assert_eq!(encode(2).unwrap(), "I8JCiV0");
        assert_eq!(encode(100).unwrap(), "lXxvV5h");
        assert_eq!(encode(KEY_SPACE - 1).unwrap(), "49tUmT1");
    }

    #[test]
    fn encode_is_deterministic() {
        for counter in [0, 7, 12_345, KEY_SPACE / 2, KEY_SPACE - 1] {
            assert_eq!(encode(counter).unwrap(), encode(counter).unwrap());
        }
    }

    #[test]
    fn keys_have_fixed_length_and_alphabet() {
        for counter in (0..KEY_SPACE).step_by(104_729_000_003) {
            let key = encode(counter).unwrap();
            assert_eq!(key.len(), KEY_LEN);
            assert!(key.bytes().all(|b| b.is_ascii_alphanumeric()), "{key}");
        }
    }

    #[test]
    fn consecutive_counters_yield_distinct_keys() {
        const N: u64 = 200_000;
        let keys: HashSet<String> = (0..N).map(|c| encode(c).unwrap()).collect();
        assert_eq!(keys.len(), N as usize);
    }

    #[test]
    fn counters_near_the_top_of_the_space_yield_distinct_keys() {
        const N: u64 = 50_000;
        let keys: HashSet<String> = (KEY_SPACE - N..KEY_SPACE)
            .map(|c| encode(c).unwrap())
            .collect();
        assert_eq!(keys.len(), N as usize);
    }

    #[test]
    fn consecutive_keys_do_not_share_a_prefix() {
        let a = encode(1_000).unwrap();
        let b = encode(1_001).unwrap();
        assert_ne!(a[..4], b[..4]);
    }

    #[test]
    fn decode_inverts_encode() {
        for counter in [0, 1, 99, 100, 65_535, 1 << 40, KEY_SPACE - 1] {
            let key = encode(counter).unwrap();
            assert_eq!(decode(&key).unwrap(), counter, "key={key}");
        }
    }

    #[test]
    fn encode_rejects_counters_outside_the_space() {
        for counter in [KEY_SPACE, KEY_SPACE + 1, u64::MAX] {
            let err = encode(counter).unwrap_err();
            assert!(
                matches!(err, Error::EncodingDomain { counter: c } if c == counter),
                "{err:?}"
            );
        }
    }

    #[test]
    fn encode_to_buf_leaves_buffer_untouched_on_error() {
        let mut buf = *b"unused!";
        assert!(encode_to_buf(KEY_SPACE, &mut buf).is_err());
        assert_eq!(&buf, b"unused!");
    }

    #[test]
    fn decode_reports_malformed_keys() {
        assert!(matches!(
            decode("short").unwrap_err(),
            Error::Decode(DecodeError::InvalidLen { len: 5 })
        ));
        assert!(matches!(
            decode("abc_def").unwrap_err(),
            Error::Decode(DecodeError::InvalidAscii {
                byte: b'_',
                index: 3
            })
        ));
        assert!(!is_key("abc_def"));
        assert!(is_key("abcdEFG"));
    }
}
