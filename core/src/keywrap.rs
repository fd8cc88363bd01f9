//! Ephemeral-static X25519 + AES-256-GCM hybrid wrap/unwrap of a 32-byte
//! symmetric key for a named recipient.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519Public, StaticSecret as X25519Secret};

use crate::error::CoreError;
use crate::primitives::{self, HKDF_WRAP_INFO};

/// An opaque, self-describing blob protecting a 32-byte symmetric key for
/// one recipient. The field names and base64 encoding are part of the wire
/// contract — other implementations must reproduce them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedKey {
    pub ephemeral_public: String,
    pub nonce: String,
    pub ciphertext: String,
}

pub fn wrap_key(recipient_public: &X25519Public, sym_key: &[u8; 32]) -> WrappedKey {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519Public::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(recipient_public);
    let kw = primitives::hkdf_derive(shared.as_bytes(), HKDF_WRAP_INFO);

    let nonce = primitives::random_bytes::<12>();
    let (ciphertext, tag) = primitives::aes256gcm_encrypt(&kw, &nonce, sym_key, &[])
        .expect("encrypting a fixed 32-byte symmetric key cannot fail");

    let mut ct_with_tag = ciphertext;
    ct_with_tag.extend_from_slice(&tag);

    WrappedKey {
        ephemeral_public: primitives::b64_encode(ephemeral_public.as_bytes()),
        nonce: primitives::b64_encode(&nonce),
        ciphertext: primitives::b64_encode(&ct_with_tag),
    }
}

pub fn unwrap_key(recipient_private: &X25519Secret, wrapped: &WrappedKey) -> Result<[u8; 32], CoreError> {
    let ephemeral_public_bytes = primitives::b64_decode(&wrapped.ephemeral_public).map_err(|_| CoreError::Unwrap)?;
    let nonce_bytes = primitives::b64_decode(&wrapped.nonce).map_err(|_| CoreError::Unwrap)?;
    let ct_with_tag = primitives::b64_decode(&wrapped.ciphertext).map_err(|_| CoreError::Unwrap)?;

    if ephemeral_public_bytes.len() != 32 || nonce_bytes.len() != 12 || ct_with_tag.len() < 16 {
        return Err(CoreError::Unwrap);
    }

    let mut ephemeral_public_arr = [0u8; 32];
    ephemeral_public_arr.copy_from_slice(&ephemeral_public_bytes);
    let ephemeral_public = X25519Public::from(ephemeral_public_arr);

    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&nonce_bytes);

    let split = ct_with_tag.len() - 16;
    let ciphertext = &ct_with_tag[..split];
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&ct_with_tag[split..]);

    let shared = recipient_private.diffie_hellman(&ephemeral_public);
    let kw = primitives::hkdf_derive(shared.as_bytes(), HKDF_WRAP_INFO);

    let plaintext =
        primitives::aes256gcm_decrypt(&kw, &nonce, ciphertext, &tag, &[]).map_err(|_| CoreError::Unwrap)?;
    plaintext.try_into().map_err(|_| CoreError::Unwrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn sym_key() -> [u8; 32] {
        let mut k = [0u8; 32];
        OsRng.fill_bytes(&mut k);
        k
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let recipient_priv = X25519Secret::random_from_rng(OsRng);
        let recipient_pub = X25519Public::from(&recipient_priv);
        let key = sym_key();

        let wrapped = wrap_key(&recipient_pub, &key);
        let recovered = unwrap_key(&recipient_priv, &wrapped).unwrap();
        assert_eq!(recovered, key);
    }

    #[test]
    fn unwrap_with_wrong_key_fails() {
        let recipient_priv = X25519Secret::random_from_rng(OsRng);
        let recipient_pub = X25519Public::from(&recipient_priv);
        let wrong_priv = X25519Secret::random_from_rng(OsRng);
        let key = sym_key();

        let wrapped = wrap_key(&recipient_pub, &key);
        assert!(unwrap_key(&wrong_priv, &wrapped).is_err());
    }

    #[test]
    fn malformed_blob_fails() {
        let recipient_priv = X25519Secret::random_from_rng(OsRng);
        let wrapped = WrappedKey {
            ephemeral_public: "not-base64!!".to_string(),
            nonce: primitives::b64_encode(&[0u8; 12]),
            ciphertext: primitives::b64_encode(&[0u8; 48]),
        };
        assert!(unwrap_key(&recipient_priv, &wrapped).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let recipient_priv = X25519Secret::random_from_rng(OsRng);
        let recipient_pub = X25519Public::from(&recipient_priv);
        let key = sym_key();
        let mut wrapped = wrap_key(&recipient_pub, &key);

        let mut ct = primitives::b64_decode(&wrapped.ciphertext).unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        wrapped.ciphertext = primitives::b64_encode(&ct);

        assert!(unwrap_key(&recipient_priv, &wrapped).is_err());
    }
}
