use super::KEY_LEN;

/// Reasons a string cannot be decoded back into a counter value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The key does not have exactly [`KEY_LEN`] bytes.
    #[error("invalid length: {len} (expected {expected})", expected = KEY_LEN)]
    InvalidLen { len: usize },

    /// A byte outside `[0-9A-Za-z]` was found at `index`.
    #[error("invalid ascii byte {byte:#04x} at index {index}")]
    InvalidAscii { byte: u8, index: usize },
}
