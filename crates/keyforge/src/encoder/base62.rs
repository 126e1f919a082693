use super::{DecodeError, KEY_LEN};

pub(crate) const ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: u64 = 62;
const NO_VALUE: u8 = 255;

/// Lookup table for base62 decoding
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    while i < 62 {
        lut[ALPHABET[i as usize] as usize] = i;
        i += 1;
    }
    lut
};

/// Writes `value` as exactly [`KEY_LEN`] base62 digits, most significant
/// first.
///
/// The caller guarantees `value < 62^KEY_LEN`; higher digits would be dropped.
#[inline]
pub(crate) fn write_digits(mut value: u64, buf: &mut [u8; KEY_LEN]) {
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(value % BASE) as usize];
        value /= BASE;
    }
}

/// Parses exactly [`KEY_LEN`] base62 digits. The result is always below
/// `62^KEY_LEN`.
pub(crate) fn read_digits(encoded: &str) -> Result<u64, DecodeError> {
    if encoded.len() != KEY_LEN {
        return Err(DecodeError::InvalidLen { len: encoded.len() });
    }

    let mut acc = 0_u64;
    for (index, byte) in encoded.bytes().enumerate() {
        let val = LOOKUP[byte as usize];
        if val == NO_VALUE {
            return Err(DecodeError::InvalidAscii { byte, index });
        }
        acc = acc * BASE + u64::from(val);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(value: u64) -> String {
        let mut buf = [0_u8; KEY_LEN];
        write_digits(value, &mut buf);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn writes_fixed_width_with_leading_zeros() {
        assert_eq!(digits(0), "0000000");
        assert_eq!(digits(61), "000000z");
        assert_eq!(digits(62), "0000010");
        assert_eq!(digits(62_u64.pow(7) - 1), "zzzzzzz");
    }

    #[test]
    fn reads_back_written_digits() {
        for &v in &[0, 1, 61, 62, 3_843, 1_000_000_007, 62_u64.pow(7) - 1] {
            assert_eq!(read_digits(&digits(v)).unwrap(), v);
        }
    }

    #[test]
    fn read_is_case_sensitive() {
        let upper = read_digits("000000A").unwrap();
        let lower = read_digits("000000a").unwrap();
        assert_eq!(upper, 10);
        assert_eq!(lower, 36);
    }

    #[test]
    fn read_rejects_wrong_length() {
        assert_eq!(
            read_digits("abc").unwrap_err(),
            DecodeError::InvalidLen { len: 3 }
        );
        assert_eq!(
            read_digits("00000000").unwrap_err(),
            DecodeError::InvalidLen { len: 8 }
        );
    }

    #[test]
    fn read_rejects_bytes_outside_alphabet() {
        assert_eq!(
            read_digits("abc-def").unwrap_err(),
            DecodeError::InvalidAscii {
                byte: b'-',
                index: 3
            }
        );
    }
}
