//! `ProtectedTransaction` / `LayeredEnvelope` — builds and consumes the main
//! authenticated envelope. Encrypts canonical document bytes, wraps
//! the data key for seller and buyer, signs the transaction hash, and later
//! verifies and decrypts.

use std::collections::BTreeMap;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical;
use crate::error::CoreError;
use crate::identity::CompanyIdentity;
use crate::keywrap::{self, WrappedKey};
use crate::primitives;
use crate::share::ShareRecord;

/// Fixed algorithm tags, plus the section/fields pair that only appears on
/// layers — absent on the wire, not `null`, when there is no layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub hash_alg: String,
    pub cipher: String,
    pub wrap: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl Meta {
    fn base() -> Self {
        Meta {
            hash_alg: "sha256".to_string(),
            cipher: "AES-256-GCM".to_string(),
            wrap: "X25519+AESGCM".to_string(),
            section: None,
            fields: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedTransaction {
    pub tx_id: String,
    pub ciphertext: String,
    pub tag: String,
    pub nonce: String,
    pub ek_map: BTreeMap<String, WrappedKey>,
    #[serde(rename = "hash_T")]
    pub hash_t: String,
    pub sig_seller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig_buyer: Option<String>,
    pub created_at: String,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<BTreeMap<String, LayeredEnvelope>>,
}

/// Shape-identical to `ProtectedTransaction` minus `sig_buyer` and nested
/// `layers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayeredEnvelope {
    pub tx_id: String,
    pub ciphertext: String,
    pub tag: String,
    pub nonce: String,
    pub ek_map: BTreeMap<String, WrappedKey>,
    #[serde(rename = "hash_T")]
    pub hash_t: String,
    pub sig_seller: String,
    pub created_at: String,
    pub meta: Meta,
}

/// Common accessors shared by `ProtectedTransaction` and `LayeredEnvelope` so
/// key-selection and decryption are written once — the main envelope and a
/// layer's envelope share the same decrypt logic against either shape.
pub trait EnvelopeLike {
    fn tx_id(&self) -> &str;
    fn ciphertext_b64(&self) -> &str;
    fn tag_b64(&self) -> &str;
    fn nonce_b64(&self) -> &str;
    fn hash_t_b64(&self) -> &str;
    fn ek_map(&self) -> &BTreeMap<String, WrappedKey>;
}

impl EnvelopeLike for ProtectedTransaction {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }
    fn ciphertext_b64(&self) -> &str {
        &self.ciphertext
    }
    fn tag_b64(&self) -> &str {
        &self.tag
    }
    fn nonce_b64(&self) -> &str {
        &self.nonce
    }
    fn hash_t_b64(&self) -> &str {
        &self.hash_t
    }
    fn ek_map(&self) -> &BTreeMap<String, WrappedKey> {
        &self.ek_map
    }
}

impl EnvelopeLike for LayeredEnvelope {
    fn tx_id(&self) -> &str {
        &self.tx_id
    }
    fn ciphertext_b64(&self) -> &str {
        &self.ciphertext
    }
    fn tag_b64(&self) -> &str {
        &self.tag
    }
    fn nonce_b64(&self) -> &str {
        &self.nonce
    }
    fn hash_t_b64(&self) -> &str {
        &self.hash_t
    }
    fn ek_map(&self) -> &BTreeMap<String, WrappedKey> {
        &self.ek_map
    }
}

/// Fields shared by the top-level envelope and every layer envelope; built
/// once and assembled into whichever shape the caller needs.
pub(crate) struct EnvelopeCore {
    pub ciphertext: String,
    pub tag: String,
    pub nonce: String,
    pub ek_map: BTreeMap<String, WrappedKey>,
    pub hash_t: String,
    pub sig_seller: String,
    pub created_at: String,
}

pub(crate) fn build_envelope_core(
    payload: &[u8],
    seller: &CompanyIdentity,
    buyer: &CompanyIdentity,
) -> EnvelopeCore {
    let hash_t_bytes = primitives::sha256(payload);
    let sym_key = primitives::random_bytes::<32>();
    let nonce = primitives::random_bytes::<12>();
    let (ciphertext, tag) = primitives::aes256gcm_encrypt(&sym_key, &nonce, payload, &hash_t_bytes)
        .expect("encrypting freshly generated key material cannot fail");

    let mut ek_map = BTreeMap::new();
    ek_map.insert(
        seller.name.clone(),
        keywrap::wrap_key(&seller.encryption_public, &sym_key),
    );
    ek_map.insert(
        buyer.name.clone(),
        keywrap::wrap_key(&buyer.encryption_public, &sym_key),
    );

    let sig_seller = primitives::ed25519_sign(&seller.signing_private, &hash_t_bytes);

    EnvelopeCore {
        ciphertext: primitives::b64_encode(&ciphertext),
        tag: primitives::b64_encode(&tag),
        nonce: primitives::b64_encode(&nonce),
        ek_map,
        hash_t: primitives::b64_encode(&hash_t_bytes),
        sig_seller: primitives::b64_encode(&sig_seller),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Use `document["id"]` only when it is already a string; anything else
/// generates a fresh 128-bit hex id.
pub(crate) fn derive_tx_id(document: &Value) -> String {
    if let Some(Value::String(s)) = document.get("id") {
        return s.clone();
    }
    hex::encode(primitives::random_bytes::<16>())
}

/// Encrypt and sign `document`, producing the main envelope. Cannot fail:
/// the canonical encoder is total and a freshly generated key/nonce pair
/// always encrypts successfully.
pub fn protect(document: &Value, seller: &CompanyIdentity, buyer: &CompanyIdentity) -> ProtectedTransaction {
    let payload = canonical::canonicalize(document);
    let tx_id = derive_tx_id(document);
    let core = build_envelope_core(&payload, seller, buyer);

    ProtectedTransaction {
        tx_id,
        ciphertext: core.ciphertext,
        tag: core.tag,
        nonce: core.nonce,
        ek_map: core.ek_map,
        hash_t: core.hash_t,
        sig_seller: core.sig_seller,
        sig_buyer: None,
        created_at: core.created_at,
        meta: Meta::base(),
        layers: None,
    }
}

/// Counter-sign `hash_T` after verifying the seller's signature. Does not
/// mutate `protected` — returns a new, separately-owned signed copy.
pub fn buyer_sign(
    protected: &ProtectedTransaction,
    buyer: &CompanyIdentity,
    seller_public_signing: &VerifyingKey,
) -> Result<ProtectedTransaction, CoreError> {
    let hash_t: [u8; 32] = primitives::b64_decode(&protected.hash_t)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(CoreError::SellerSignatureInvalid)?;
    let sig_seller: [u8; 64] = primitives::b64_decode(&protected.sig_seller)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(CoreError::SellerSignatureInvalid)?;

    if !primitives::ed25519_verify(seller_public_signing, &hash_t, &sig_seller) {
        return Err(CoreError::SellerSignatureInvalid);
    }

    let sig_buyer = primitives::ed25519_sign(&buyer.signing_private, &hash_t);
    let mut signed = protected.clone();
    signed.sig_buyer = Some(primitives::b64_encode(&sig_buyer));
    Ok(signed)
}

/// Select the wrapped key a caller should use: the share record's `ek_to`
/// when one is supplied, otherwise the envelope's own `ek_map` entry.
pub(crate) fn select_wrapped_key<'a, E: EnvelopeLike>(
    envelope: &'a E,
    company_name: &str,
    share_record: Option<&'a ShareRecord>,
    expected_section: Option<&str>,
) -> Result<&'a WrappedKey, CoreError> {
    match share_record {
        Some(share) => {
            if share.tx_id != envelope.tx_id() {
                return Err(CoreError::WrongShareTx);
            }
            match (expected_section, share.section.as_deref()) {
                (Some(expected), Some(actual)) if actual == expected => {}
                (None, None) => {}
                _ => return Err(CoreError::WrongShareSection),
            }
            Ok(&share.ek_to)
        }
        None => envelope
            .ek_map()
            .get(company_name)
            .ok_or_else(|| CoreError::NoKeyForCompany { name: company_name.to_string() }),
    }
}

/// Unwrap `wrapped`, decrypt the envelope's ciphertext under `hash_T` as
/// AAD, and parse the plaintext as JSON.
pub(crate) fn decrypt_envelope<E: EnvelopeLike>(
    envelope: &E,
    wrapped: &WrappedKey,
    company: &CompanyIdentity,
) -> Result<Value, CoreError> {
    let sym_key = keywrap::unwrap_key(&company.encryption_private, wrapped)?;

    let hash_t: [u8; 32] = primitives::b64_decode(envelope.hash_t_b64())
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(CoreError::DecryptFailed)?;
    let nonce: [u8; 12] = primitives::b64_decode(envelope.nonce_b64())
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(CoreError::DecryptFailed)?;
    let tag: [u8; 16] = primitives::b64_decode(envelope.tag_b64())
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or(CoreError::DecryptFailed)?;
    let ciphertext = primitives::b64_decode(envelope.ciphertext_b64()).map_err(|_| CoreError::DecryptFailed)?;

    let plaintext = primitives::aes256gcm_decrypt(&sym_key, &nonce, &ciphertext, &tag, &hash_t)
        .map_err(|_| CoreError::DecryptFailed)?;

    serde_json::from_slice(&plaintext).map_err(|_| CoreError::DecryptFailed)
}

/// Decrypt the transaction for `company_name`, optionally via a `ShareRecord`
/// delegation.
pub fn unprotect(
    protected: &ProtectedTransaction,
    company: &CompanyIdentity,
    company_name: &str,
    share_record: Option<&ShareRecord>,
) -> Result<Value, CoreError> {
    let wrapped = select_wrapped_key(protected, company_name, share_record, None)?;
    decrypt_envelope(protected, wrapped, company)
}
