//! Identifier utilities
//!
//! Client-created entities carry a short base-36 token until the record
//! store assigns a canonical UUID. The two formats never overlap, so a
//! record's persistence status is unambiguous from its identifier alone.

use rand::Rng;
use uuid::Uuid;

const TOKEN_LEN: usize = 9;
const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a 9-character base-36 local token.
///
/// Collision-tolerant only: uniqueness is guaranteed once the record is
/// persisted and re-keyed by the store, not before.
pub fn local_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// True when `s` is a canonical hyphenated UUID (a server-assigned id).
///
/// Local tokens are 9 characters and never parse as UUIDs; the length
/// check also rejects the simple and URN forms `Uuid::parse_str` would
/// otherwise accept.
pub fn is_canonical_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::parse_str(s).is_ok()
}
