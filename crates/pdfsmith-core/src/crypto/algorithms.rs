//! Standard Security Handler key derivation for revisions 2, 3 and 4
//!
//! Covers password padding, the file key (Algorithm 2), the per-object key
//! (Algorithm 1), the `/O` and `/U` entries (Algorithms 3 to 5) and both
//! authentication paths (Algorithms 6 and 7).

use super::rc4::rc4;
use md5::{Digest, Md5};

const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Revision-dependent inputs shared by every derivation step
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyParams<'a> {
    pub revision: u32,
    /// File key length in bytes (5 to 16)
    pub key_length: usize,
    pub owner_hash: &'a [u8],
    pub permissions: i32,
    pub file_id: &'a [u8],
    pub encrypt_metadata: bool,
}

/// Truncate or pad a password to exactly 32 bytes
pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Passwords are PDFDocEncoded; anything outside Latin-1 falls back to UTF-8
pub(crate) fn password_bytes(password: &str) -> Vec<u8> {
    if password.chars().all(|c| (c as u32) <= 0xFF) {
        password.chars().map(|c| c as u8).collect()
    } else {
        password.as_bytes().to_vec()
    }
}

/// Algorithm 2: derive the file key from the user password
pub(crate) fn compute_file_key(password: &[u8], params: &KeyParams<'_>) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(params.owner_hash);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF; 4]);
    }
    let mut hash = hasher.finalize().to_vec();

    let n = key_length(params);
    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

fn key_length(params: &KeyParams<'_>) -> usize {
    if params.revision == 2 {
        5
    } else {
        params.key_length.clamp(5, 16)
    }
}

/// RC4 key used to produce and unwrap `/O` (Algorithm 3, steps a to d)
fn owner_rc4_key(owner_password: &[u8], revision: u32, n: usize) -> Vec<u8> {
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Algorithm 3: the `/O` entry
pub(crate) fn compute_owner_hash(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_length: usize,
) -> Vec<u8> {
    let n = if revision == 2 { 5 } else { key_length.clamp(5, 16) };
    let key = owner_rc4_key(owner_password, revision, n);

    let mut hash = rc4(&key, &pad_password(user_password));
    if revision >= 3 {
        for round in 1..=19u8 {
            hash = rc4(&xor_key(&key, round), &hash);
        }
    }
    hash
}

/// Algorithms 4 and 5: the `/U` entry for a given file key
pub(crate) fn compute_user_hash(file_key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision == 2 {
        return rc4(file_key, &PADDING);
    }

    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = rc4(file_key, &hasher.finalize());
    for round in 1..=19u8 {
        hash = rc4(&xor_key(file_key, round), &hash);
    }
    // Arbitrary filler up to 32 bytes; only the first 16 are compared
    hash.extend_from_slice(&PADDING[..16]);
    hash
}

/// Algorithm 6: returns the file key when `password` is the user password
pub(crate) fn authenticate_user(
    password: &[u8],
    user_hash: &[u8],
    params: &KeyParams<'_>,
) -> Option<Vec<u8>> {
    let key = compute_file_key(password, params);
    let expected = compute_user_hash(&key, params.file_id, params.revision);
    let compared = if params.revision == 2 { 32 } else { 16 };
    if user_hash.len() < compared {
        return None;
    }
    constant_time_eq(&expected[..compared], &user_hash[..compared]).then_some(key)
}

/// Algorithm 7: unwrap the user password from `/O`, then authenticate with it
pub(crate) fn authenticate_owner(
    password: &[u8],
    user_hash: &[u8],
    params: &KeyParams<'_>,
) -> Option<Vec<u8>> {
    let key = owner_rc4_key(password, params.revision, key_length(params));

    let user_password = if params.revision == 2 {
        rc4(&key, params.owner_hash)
    } else {
        let mut value = params.owner_hash.to_vec();
        for round in (0..=19u8).rev() {
            value = rc4(&xor_key(&key, round), &value);
        }
        value
    };
    authenticate_user(&user_password, user_hash, params)
}

/// Algorithm 1: key for a single indirect object
pub(crate) fn object_key(file_key: &[u8], id: (u32, u16), aes: bool) -> Vec<u8> {
    let (number, generation) = id;
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&number.to_le_bytes()[..3]);
    hasher.update(generation.to_le_bytes());
    if aes {
        hasher.update(b"sAlT");
    }
    let mut hash = hasher.finalize().to_vec();
    hash.truncate((file_key.len() + 5).min(16));
    hash
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
