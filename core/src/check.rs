//! Read-only audit of a transaction: verifies both parties' signatures and
//! any share records presented alongside it, folding every anomaly into a
//! report rather than raising.

use std::collections::HashMap;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::envelope::ProtectedTransaction;
use crate::primitives;
use crate::share::{self, ShareRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareCheck {
    pub id: String,
    pub from_company: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_hash_ok: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub seller_sig_ok: bool,
    pub buyer_sig_ok: Option<bool>,
    pub shares: Vec<ShareCheck>,
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    primitives::b64_decode(s).ok().and_then(|b| b.try_into().ok())
}

/// Verify `protected`'s seller/buyer signatures and every entry in
/// `share_records`, keyed by issuer name in `share_public_keys`. A share
/// from a company with no known public key is reported invalid, never
/// skipped.
pub fn check(
    protected: &ProtectedTransaction,
    seller_public_signing: &VerifyingKey,
    buyer_public_signing: Option<&VerifyingKey>,
    share_records: &[ShareRecord],
    share_public_keys: &HashMap<String, VerifyingKey>,
) -> CheckReport {
    let hash_t = decode_fixed::<32>(&protected.hash_t);

    let seller_sig_ok = match (hash_t, decode_fixed::<64>(&protected.sig_seller)) {
        (Some(h), Some(s)) => primitives::ed25519_verify(seller_public_signing, &h, &s),
        _ => false,
    };

    let buyer_sig_ok = protected.sig_buyer.as_ref().map(|sig_b64| {
        let buyer_pub = match buyer_public_signing {
            Some(k) => k,
            None => return false,
        };
        match (hash_t, decode_fixed::<64>(sig_b64)) {
            (Some(h), Some(s)) => primitives::ed25519_verify(buyer_pub, &h, &s),
            _ => false,
        }
    });

    let shares = share_records
        .iter()
        .map(|record| {
            let layer_hash_ok = record.section.as_ref().map(|section| {
                let expected = protected
                    .layers
                    .as_ref()
                    .and_then(|layers| layers.get(section))
                    .map(|layer| layer.hash_t.as_str());
                matches!((expected, record.layer_hash.as_deref()), (Some(e), Some(g)) if e == g)
            });

            let valid = share_public_keys
                .get(&record.from_company)
                .is_some_and(|key| share::verify_share_record(record, key));

            ShareCheck {
                id: record.id.clone(),
                from_company: record.from_company.clone(),
                valid,
                section: record.section.clone(),
                layer_hash_ok,
            }
        })
        .collect();

    CheckReport { seller_sig_ok, buyer_sig_ok, shares }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{buyer_sign, protect};
    use crate::identity::generate_company_identity;
    use crate::layers::{create_layer_share_records, protect_with_layers};
    use crate::share::create_share_record;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn fully_signed_transaction_checks_clean() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let document = json!({"id": "tx-1", "amount": 1});
        let protected = protect(&document, &seller, &buyer);
        let signed = buyer_sign(&protected, &buyer, &seller.signing_public).unwrap();

        let report = check(&signed, &seller.signing_public, Some(&buyer.signing_public), &[], &HashMap::new());
        assert!(report.seller_sig_ok);
        assert_eq!(report.buyer_sig_ok, Some(true));
        assert!(report.shares.is_empty());
    }

    #[test]
    fn unsigned_by_buyer_reports_none() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let document = json!({"id": "tx-2"});
        let protected = protect(&document, &seller, &buyer);

        let report = check(&protected, &seller.signing_public, Some(&buyer.signing_public), &[], &HashMap::new());
        assert!(report.seller_sig_ok);
        assert_eq!(report.buyer_sig_ok, None);
    }

    #[test]
    fn forged_seller_signature_is_caught() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let attacker = generate_company_identity("attacker");
        let document = json!({"id": "tx-3"});
        let mut protected = protect(&document, &seller, &buyer);
        protected.sig_seller = primitives::b64_encode(&primitives::ed25519_sign(&attacker.signing_private, &[0u8; 32]));

        let report = check(&protected, &seller.signing_public, None, &[], &HashMap::new());
        assert!(!report.seller_sig_ok);
    }

    #[test]
    fn share_from_company_with_unknown_key_is_invalid() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let document = json!({"id": "tx-4"});
        let protected = protect(&document, &seller, &buyer);
        let record = create_share_record(&protected, &seller, "auditor", &auditor.encryption_public).unwrap();

        let report = check(&protected, &seller.signing_public, None, std::slice::from_ref(&record), &HashMap::new());
        assert_eq!(report.shares.len(), 1);
        assert!(!report.shares[0].valid);
    }

    #[test]
    fn layer_share_reports_hash_match() {
        let seller = generate_company_identity("seller");
        let buyer = generate_company_identity("buyer");
        let auditor = generate_company_identity("auditor");
        let mut spec = BTreeMap::new();
        spec.insert("pricing".to_string(), vec!["amount".to_string()]);
        let document = json!({"id": "tx-5", "amount": 1});
        let protected = protect_with_layers(&document, &seller, &buyer, &spec).unwrap();
        let records =
            create_layer_share_records(&protected, &["pricing".to_string()], &seller, "auditor", &auditor.encryption_public)
                .unwrap();

        let mut keys = HashMap::new();
        keys.insert("seller".to_string(), seller.signing_public);
        let report = check(&protected, &seller.signing_public, None, &records, &keys);
        assert!(report.shares[0].valid);
        assert_eq!(report.shares[0].layer_hash_ok, Some(true));
    }
}
