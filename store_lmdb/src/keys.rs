//! Binary key layouts.
//!
//! Ids are stored big-endian so LMDB's lexicographic order matches numeric
//! order. User ids are terminated by a `0x00` byte, which never occurs in a
//! valid id, so one user's prefix can't match another's.

use plotline_types::UserId;

use crate::LmdbError;

pub(crate) fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// `prefix ++ id_be`.
pub(crate) fn composite(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub(crate) fn user_prefix(user: &UserId) -> Vec<u8> {
    let raw = user.as_str().as_bytes();
    let mut key = Vec::with_capacity(raw.len() + 1);
    key.extend_from_slice(raw);
    key.push(0);
    key
}

/// Decode the id stored in the trailing eight bytes of a key or value.
pub(crate) fn id_suffix(bytes: &[u8]) -> Result<u64, LmdbError> {
    if bytes.len() < 8 {
        return Err(LmdbError::Corruption(format!(
            "expected at least 8 bytes, found {}",
            bytes.len()
        )));
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[bytes.len() - 8..]);
    Ok(u64::from_be_bytes(arr))
}

/// Turn `prefix` into the smallest key greater than every key it prefixes.
///
/// Returns `false` when no such key exists (the prefix is all `0xFF`), in
/// which case the range has no upper bound.
pub(crate) fn increment_prefix(prefix: &mut Vec<u8>) -> bool {
    while let Some(last) = prefix.pop() {
        if last < u8::MAX {
            prefix.push(last + 1);
            return true;
        }
    }
    false
}
