//! Deterministic cryptographic building blocks shared by every other module.
//!
//! Nothing here interprets the DvP data model — these are pure wrappers over
//! base64, SHA-256, Ed25519, X25519, HKDF-SHA256 and AES-256-GCM with the
//! exact parameters the protocol fixes.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret as X25519Secret};

/// Fixed HKDF info string for key-wrapping key derivation.
pub const HKDF_WRAP_INFO: &[u8] = b"cop-key-wrap";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid base64")]
    Base64,
    #[error("malformed JSON")]
    Json,
    #[error("invalid key length, expected {expected} bytes, got {got}")]
    KeyLength { expected: usize, got: usize },
    #[error("AEAD encryption failed")]
    Encrypt,
    #[error("AEAD decryption failed — wrong key, tampered ciphertext, or wrong AAD")]
    Decrypt,
}

/// URL-safe base64 with padding, matching the reference implementation's
/// `base64.urlsafe_b64encode` (padding is never stripped).
pub fn b64_encode(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

pub fn b64_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE.decode(s).map_err(|_| CryptoError::Base64)
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

pub fn generate_signing_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn generate_encryption_keypair() -> X25519Secret {
    X25519Secret::random_from_rng(OsRng)
}

pub fn ed25519_sign(private: &SigningKey, message: &[u8]) -> [u8; 64] {
    private.sign(message).to_bytes()
}

/// Returns `false` on any verification failure — callers decide what that means.
pub fn ed25519_verify(public: &VerifyingKey, message: &[u8], signature: &[u8; 64]) -> bool {
    match Signature::from_slice(signature) {
        Ok(sig) => public.verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}

pub fn x25519_shared_secret(private: &X25519Secret, public: &X25519Public) -> [u8; 32] {
    private.diffie_hellman(public).to_bytes()
}

/// HKDF-SHA256 with `salt = None` and the fixed `cop-key-wrap` info string, L=32.
pub fn hkdf_derive(shared_secret: &[u8; 32], info: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .expect("32-byte HKDF output is always a valid length");
    out
}

/// AES-256-GCM encrypt. Returns `(ciphertext, tag)` split apart, each 16 bytes
/// of tag and the rest ciphertext, matching the envelope's wire layout.
pub fn aes256gcm_encrypt(
    key: &[u8; 32],
    nonce: &[u8; 12],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; 16]), CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut out = cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload { msg: plaintext, aad },
        )
        .map_err(|_| CryptoError::Encrypt)?;
    let tag_bytes = out.split_off(out.len() - 16);
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&tag_bytes);
    Ok((out, tag))
}

pub fn aes256gcm_decrypt(
    key: &[u8; 32],
    nonce: &[u8; 12],
    ciphertext: &[u8],
    tag: &[u8; 16],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut ct_with_tag = Vec::with_capacity(ciphertext.len() + 16);
    ct_with_tag.extend_from_slice(ciphertext);
    ct_with_tag.extend_from_slice(tag);
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: &ct_with_tag, aad })
        .map_err(|_| CryptoError::Decrypt)
}
