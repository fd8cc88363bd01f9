//! `ShareRecord` — a one-time delegation of decrypt access to a third party
//! for a single transaction (or a single layer of one), signed by the
//! delegating company.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use x25519_dalek::PublicKey as X25519Public;

use crate::canonical;
use crate::envelope::ProtectedTransaction;
use crate::error::CoreError;
use crate::identity::CompanyIdentity;
use crate::keywrap::{self, WrappedKey};
use crate::primitives;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: String,
    pub tx_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub from_company: String,
    pub to_company: String,
    pub ek_to: WrappedKey,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_hash: Option<String>,
    pub sig_share: String,
}

/// Everything but `sig_share` — what the issuer signs over and a verifier
/// recomputes.
fn signable_value(record: &ShareRecord) -> Value {
    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(record.id.clone()));
    map.insert("tx_id".to_string(), Value::String(record.tx_id.clone()));
    if let Some(section) = &record.section {
        map.insert("section".to_string(), Value::String(section.clone()));
    }
    map.insert("from_company".to_string(), Value::String(record.from_company.clone()));
    map.insert("to_company".to_string(), Value::String(record.to_company.clone()));
    map.insert(
        "ek_to".to_string(),
        serde_json::to_value(&record.ek_to).expect("WrappedKey always serializes"),
    );
    map.insert("timestamp".to_string(), Value::String(record.timestamp.clone()));
    if let Some(layer_hash) = &record.layer_hash {
        map.insert("layer_hash".to_string(), Value::String(layer_hash.clone()));
    }
    Value::Object(map)
}

pub(crate) fn sign_record(record: &mut ShareRecord, signer: &CompanyIdentity) {
    let bytes = canonical::canonicalize(&signable_value(record));
    let hash = primitives::sha256(&bytes);
    let sig = primitives::ed25519_sign(&signer.signing_private, &hash);
    record.sig_share = primitives::b64_encode(&sig);
}

/// Re-wrap the transaction's data key for `to_company` and sign the record
/// as `from_company`. `from_company` must hold a wrapped key in
/// `protected.ek_map`.
pub fn create_share_record(
    protected: &ProtectedTransaction,
    from: &CompanyIdentity,
    to_company: &str,
    to_encryption_public: &X25519Public,
) -> Result<ShareRecord, CoreError> {
    let wrapped = protected
        .ek_map
        .get(&from.name)
        .ok_or_else(|| CoreError::NoKeyForCompany { name: from.name.clone() })?;
    let sym_key = keywrap::unwrap_key(&from.encryption_private, wrapped)?;
    let ek_to = keywrap::wrap_key(to_encryption_public, &sym_key);

    let mut record = ShareRecord {
        id: hex::encode(primitives::random_bytes::<16>()),
        tx_id: protected.tx_id.clone(),
        section: None,
        from_company: from.name.clone(),
        to_company: to_company.to_string(),
        ek_to,
        timestamp: chrono::Utc::now().to_rfc3339(),
        layer_hash: None,
        sig_share: String::new(),
    };
    sign_record(&mut record, from);
    Ok(record)
}

/// Verify `record.sig_share` against `from_public_signing`. Never raises;
/// any malformed field just yields `false`.
pub fn verify_share_record(record: &ShareRecord, from_public_signing: &VerifyingKey) -> bool {
    let sig: [u8; 64] = match primitives::b64_decode(&record.sig_share).ok().and_then(|b| b.try_into().ok()) {
        Some(s) => s,
        None => return false,
    };
    let bytes = canonical::canonicalize(&signable_value(record));
    let hash = primitives::sha256(&bytes);
    primitives::ed25519_verify(from_public_signing, &hash, &sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::protect;
    use crate::identity::generate_company_identity;
    use serde_json::json;

    #[test]
    fn share_record_verifies_for_issuer() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-1", "amount": 10});
        let protected = protect(&document, &seller, &buyer);

        let record = create_share_record(&protected, &seller, "auditor", &auditor.encryption_public).unwrap();
        assert!(verify_share_record(&record, &seller.signing_public));
    }

    #[test]
    fn share_record_fails_for_wrong_signer() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-2"});
        let protected = protect(&document, &seller, &buyer);

        let record = create_share_record(&protected, &seller, "auditor", &auditor.encryption_public).unwrap();
        assert!(!verify_share_record(&record, &buyer.signing_public));
    }

    #[test]
    fn create_share_record_rejects_unknown_issuer() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let stranger = generate_company_identity("stranger");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-3"});
        let protected = protect(&document, &seller, &buyer);

        let result = create_share_record(&protected, &stranger, "auditor", &auditor.encryption_public);
        assert!(matches!(result, Err(CoreError::NoKeyForCompany { .. })));
    }

    #[test]
    fn tampered_record_fails_verification() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-4"});
        let protected = protect(&document, &seller, &buyer);

        let mut record = create_share_record(&protected, &seller, "auditor", &auditor.encryption_public).unwrap();
        record.to_company = "someone-else".to_string();
        assert!(!verify_share_record(&record, &seller.signing_public));
    }
}
