//! AES-128-CBC with PKCS#7 padding, the `AESV2` crypt filter method

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand_core::{OsRng, RngCore};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK: usize = 16;

/// Encrypt with a fresh random IV, returned as the first block of the output
pub(crate) fn encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    let mut iv = [0u8; BLOCK];
    OsRng.fill_bytes(&mut iv);
    encrypt_with_iv(key, &iv, data)
}

pub(crate) fn encrypt_with_iv(
    key: &[u8],
    iv: &[u8; BLOCK],
    data: &[u8],
) -> Result<Vec<u8>, &'static str> {
    let pad = BLOCK - data.len() % BLOCK;
    let mut buffer = data.to_vec();
    buffer.extend(std::iter::repeat(pad as u8).take(pad));

    let len = buffer.len();
    Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| "AES-128 key must be 16 bytes")?
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| "AES encryption failed")?;

    let mut output = iv.to_vec();
    output.extend(buffer);
    Ok(output)
}

/// Decrypt data laid out as IV followed by ciphertext
pub(crate) fn decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 2 * BLOCK || data.len() % BLOCK != 0 {
        return Err("AES ciphertext has an invalid length");
    }

    let (iv, ciphertext) = data.split_at(BLOCK);
    let mut buffer = ciphertext.to_vec();
    let plain = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| "AES-128 key must be 16 bytes")?
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| "AES decryption failed")?;

    let pad = *plain.last().ok_or("AES plaintext is empty")? as usize;
    if pad == 0 || pad > BLOCK || plain[plain.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err("invalid PKCS#7 padding");
    }
    Ok(plain[..plain.len() - pad].to_vec())
}
