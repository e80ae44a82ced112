//! Authenticated encryption for key material carried inside tokens.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use crate::{CryptoError, key::KEY_SIZE};

/// Size of the random nonce prepended to every sealed payload.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Encrypts `plaintext` under `key` with XChaCha20-Poly1305.
///
/// A fresh random nonce is drawn for every call and written in front of the
/// ciphertext, so sealing the same plaintext twice gives different output.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce).map_err(CryptoError::Rng)?;

    let cipher = XChaCha20Poly1305::new(key.into());
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypts a payload produced by [`seal`].
///
/// Fails if the payload was sealed under a different key or altered in any
/// way.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Malformed(sealed.len()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    XChaCha20Poly1305::new(key.into())
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Open)
}
