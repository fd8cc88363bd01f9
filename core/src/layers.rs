//! Selective disclosure by field: a transaction can carry one encrypted
//! sub-envelope per named section, each independently decryptable and
//! independently shareable.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use x25519_dalek::PublicKey as X25519Public;

use crate::canonical;
use crate::envelope::{self, EnvelopeLike, LayeredEnvelope, Meta, ProtectedTransaction};
use crate::error::CoreError;
use crate::identity::CompanyIdentity;
use crate::keywrap;
use crate::primitives;
use crate::share::ShareRecord;

/// Pull `fields` out of `document` into their own object. `document` must be
/// a JSON object and must contain every requested field.
fn slice_document(document: &Value, section: &str, fields: &[String]) -> Result<Value, CoreError> {
    let object = document.as_object().ok_or(CoreError::CanonicalizationFailed)?;
    let missing: Vec<String> = fields.iter().filter(|f| !object.contains_key(*f)).cloned().collect();
    if !missing.is_empty() {
        return Err(CoreError::MissingFields { section: section.to_string(), fields: missing });
    }
    let mut slice = Map::new();
    for field in fields {
        slice.insert(field.clone(), object[field].clone());
    }
    Ok(Value::Object(slice))
}

/// Build the main envelope plus one `LayeredEnvelope` per entry in
/// `layers_spec` (section name -> field list), all sharing the main
/// envelope's `tx_id`.
pub fn protect_with_layers(
    document: &Value,
    seller: &CompanyIdentity,
    buyer: &CompanyIdentity,
    layers_spec: &BTreeMap<String, Vec<String>>,
) -> Result<ProtectedTransaction, CoreError> {
    let mut protected = envelope::protect(document, seller, buyer);

    let mut layers = BTreeMap::new();
    for (section, fields) in layers_spec {
        let slice = slice_document(document, section, fields)?;
        let payload = canonical::canonicalize(&slice);
        let core = envelope::build_envelope_core(&payload, seller, buyer);

        layers.insert(
            section.clone(),
            LayeredEnvelope {
                tx_id: protected.tx_id.clone(),
                ciphertext: core.ciphertext,
                tag: core.tag,
                nonce: core.nonce,
                ek_map: core.ek_map,
                hash_t: core.hash_t,
                sig_seller: core.sig_seller,
                created_at: core.created_at,
                meta: Meta {
                    hash_alg: "sha256".to_string(),
                    cipher: "AES-256-GCM".to_string(),
                    wrap: "X25519+AESGCM".to_string(),
                    section: Some(section.clone()),
                    fields: Some(fields.clone()),
                },
            },
        );
    }
    protected.layers = Some(layers);
    Ok(protected)
}

/// Decrypt the named layer for `company_name`, optionally via a
/// `ShareRecord` scoped to that section.
pub fn unprotect_layer(
    protected: &ProtectedTransaction,
    company: &CompanyIdentity,
    company_name: &str,
    section: &str,
    share_record: Option<&ShareRecord>,
) -> Result<Value, CoreError> {
    let layer = protected
        .layers
        .as_ref()
        .and_then(|layers| layers.get(section))
        .ok_or_else(|| CoreError::NoSuchLayer { section: section.to_string() })?;

    let wrapped = envelope::select_wrapped_key(layer, company_name, share_record, Some(section))?;
    envelope::decrypt_envelope(layer, wrapped, company)
}

/// Issue one `ShareRecord` per requested section, each bound to that
/// layer's own `hash_T` so a verifier can confirm the share matches the
/// layer it claims to unlock.
pub fn create_layer_share_records(
    protected: &ProtectedTransaction,
    sections: &[String],
    from: &CompanyIdentity,
    to_company: &str,
    to_encryption_public: &X25519Public,
) -> Result<Vec<ShareRecord>, CoreError> {
    let layers = protected.layers.as_ref();
    let mut records = Vec::with_capacity(sections.len());

    for section in sections {
        let layer = layers
            .and_then(|layers| layers.get(section))
            .ok_or_else(|| CoreError::NoSuchLayer { section: section.clone() })?;

        let wrapped = layer
            .ek_map()
            .get(&from.name)
            .ok_or_else(|| CoreError::NoKeyForCompany { name: from.name.clone() })?;
        let sym_key = keywrap::unwrap_key(&from.encryption_private, wrapped)?;
        let ek_to = keywrap::wrap_key(to_encryption_public, &sym_key);

        let mut record = ShareRecord {
            id: hex::encode(primitives::random_bytes::<16>()),
            tx_id: protected.tx_id.clone(),
            section: Some(section.clone()),
            from_company: from.name.clone(),
            to_company: to_company.to_string(),
            ek_to,
            timestamp: chrono::Utc::now().to_rfc3339(),
            layer_hash: Some(layer.hash_t.clone()),
            sig_share: String::new(),
        };
        crate::share::sign_record(&mut record, from);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generate_company_identity;
    use crate::share::{create_share_record, verify_share_record};
    use serde_json::json;

    fn layers_spec() -> BTreeMap<String, Vec<String>> {
        let mut spec = BTreeMap::new();
        spec.insert("pricing".to_string(), vec!["amount".to_string(), "currency".to_string()]);
        spec.insert("logistics".to_string(), vec!["destination".to_string()]);
        spec
    }

    #[test]
    fn layered_sections_decrypt_to_their_own_slice() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let document = json!({
            "id": "tx-1",
            "amount": 500,
            "currency": "USD",
            "destination": "Rotterdam",
            "secret_note": "never disclosed",
        });

        let protected = protect_with_layers(&document, &seller, &buyer, &layers_spec()).unwrap();
        let pricing = unprotect_layer(&protected, &seller, "seller", "pricing", None).unwrap();
        assert_eq!(pricing, json!({"amount": 500, "currency": "USD"}));

        let logistics = unprotect_layer(&protected, &buyer, "buyer", "logistics", None).unwrap();
        assert_eq!(logistics, json!({"destination": "Rotterdam"}));
    }

    #[test]
    fn missing_field_is_reported_by_section() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let document = json!({"id": "tx-2", "amount": 1, "destination": "Rotterdam"});

        let err = protect_with_layers(&document, &seller, &buyer, &layers_spec()).unwrap_err();
        match err {
            CoreError::MissingFields { section, fields } => {
                assert_eq!(section, "pricing");
                assert!(fields.contains(&"currency".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_section_fails() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let document = json!({"id": "tx-3", "amount": 1, "currency": "USD", "destination": "x"});
        let protected = protect_with_layers(&document, &seller, &buyer, &layers_spec()).unwrap();

        assert!(matches!(
            unprotect_layer(&protected, &seller, "seller", "nonexistent", None),
            Err(CoreError::NoSuchLayer { .. })
        ));
    }

    #[test]
    fn layer_share_record_grants_third_party_access_to_one_section_only() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-4", "amount": 1, "currency": "USD", "destination": "x"});
        let protected = protect_with_layers(&document, &seller, &buyer, &layers_spec()).unwrap();

        let records =
            create_layer_share_records(&protected, &["pricing".to_string()], &seller, "auditor", &auditor.encryption_public)
                .unwrap();
        let record = &records[0];
        assert!(verify_share_record(record, &seller.signing_public));

        let disclosed = unprotect_layer(&protected, &auditor, "auditor", "pricing", Some(record)).unwrap();
        assert_eq!(disclosed, json!({"amount": 1, "currency": "USD"}));

        assert!(matches!(
            unprotect_layer(&protected, &auditor, "auditor", "logistics", Some(record)),
            Err(CoreError::WrongShareSection)
        ));
    }

    #[test]
    fn full_transaction_share_record_cannot_unlock_a_layer() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-5", "amount": 1, "currency": "USD", "destination": "x"});
        let protected = protect_with_layers(&document, &seller, &buyer, &layers_spec()).unwrap();

        let record = create_share_record(&protected, &seller, "auditor", &auditor.encryption_public).unwrap();
        assert!(matches!(
            unprotect_layer(&protected, &auditor, "auditor", "pricing", Some(&record)),
            Err(CoreError::WrongShareSection)
        ));
    }
}
