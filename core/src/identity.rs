//! `CompanyIdentity` — the signing and encryption credentials a principal
//! holds. Created once offline, loaded into memory for an operation,
//! zeroized on drop.

use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use pkcs8::der::pem::LineEnding;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret as X25519Secret};

use crate::pem::{self, PemError};
use crate::primitives;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid signing key PEM: {0}")]
    SigningKey(String),
    #[error("invalid encryption key PEM: {0}")]
    EncryptionKey(#[from] PemError),
}

/// A company's full keypair set. Opaque in memory; PEM is only used at the
/// serialization boundary. `SigningKey` and `StaticSecret` zeroize their
/// backing bytes on drop via their own `zeroize` support — best-effort
/// defense in depth, not a correctness invariant.
pub struct CompanyIdentity {
    pub name: String,
    pub signing_private: SigningKey,
    pub signing_public: VerifyingKey,
    pub encryption_private: X25519Secret,
    pub encryption_public: X25519Public,
}

/// The publishable half of a `CompanyIdentity` — what a counterparty needs
/// to verify signatures and wrap keys for this company.
#[derive(Debug, Clone)]
pub struct CompanyPublicIdentity {
    pub name: String,
    pub signing_public: VerifyingKey,
    pub encryption_public: X25519Public,
}

/// PEM-in-JSON interchange form, used when identities cross a process
/// boundary (key files, HTTP registries). Never constructed ad hoc by the
/// core — always via `CompanyIdentity::to_document`/`from_document`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyIdentityDocument {
    pub name: String,
    pub signing_private: String,
    pub signing_public: String,
    pub encryption_private: String,
    pub encryption_public: String,
}

/// The publishable half, PEM-in-JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyPublicIdentityDocument {
    pub name: String,
    pub signing_public: String,
    pub encryption_public: String,
}

pub fn generate_company_identity(name: impl Into<String>) -> CompanyIdentity {
    let signing_private = primitives::generate_signing_keypair();
    let signing_public = signing_private.verifying_key();
    let encryption_private = primitives::generate_encryption_keypair();
    let encryption_public = X25519Public::from(&encryption_private);
    CompanyIdentity {
        name: name.into(),
        signing_private,
        signing_public,
        encryption_private,
        encryption_public,
    }
}

impl CompanyIdentity {
    pub fn public(&self) -> CompanyPublicIdentity {
        CompanyPublicIdentity {
            name: self.name.clone(),
            signing_public: self.signing_public,
            encryption_public: self.encryption_public,
        }
    }

    pub fn to_document(&self) -> CompanyIdentityDocument {
        CompanyIdentityDocument {
            name: self.name.clone(),
            signing_private: self
                .signing_private
                .to_pkcs8_pem(LineEnding::LF)
                .expect("ed25519 PKCS8 PEM encoding is infallible")
                .to_string(),
            signing_public: self
                .signing_public
                .to_public_key_pem(LineEnding::LF)
                .expect("ed25519 SPKI PEM encoding is infallible"),
            encryption_private: pem::x25519_private_to_pem(&self.encryption_private),
            encryption_public: pem::x25519_public_to_pem(&self.encryption_public),
        }
    }

    pub fn from_document(doc: &CompanyIdentityDocument) -> Result<CompanyIdentity, IdentityError> {
        let signing_private = SigningKey::from_pkcs8_pem(&doc.signing_private)
            .map_err(|e| IdentityError::SigningKey(e.to_string()))?;
        let signing_public = VerifyingKey::from_public_key_pem(&doc.signing_public)
            .map_err(|e| IdentityError::SigningKey(e.to_string()))?;
        let encryption_private = pem::x25519_private_from_pem(&doc.encryption_private)?;
        let encryption_public = pem::x25519_public_from_pem(&doc.encryption_public)?;
        Ok(CompanyIdentity {
            name: doc.name.clone(),
            signing_private,
            signing_public,
            encryption_private,
            encryption_public,
        })
    }
}

impl CompanyPublicIdentity {
    pub fn to_document(&self) -> CompanyPublicIdentityDocument {
        CompanyPublicIdentityDocument {
            name: self.name.clone(),
            signing_public: self
                .signing_public
                .to_public_key_pem(LineEnding::LF)
                .expect("ed25519 SPKI PEM encoding is infallible"),
            encryption_public: pem::x25519_public_to_pem(&self.encryption_public),
        }
    }

    pub fn from_document(doc: &CompanyPublicIdentityDocument) -> Result<Self, IdentityError> {
        let signing_public = VerifyingKey::from_public_key_pem(&doc.signing_public)
            .map_err(|e| IdentityError::SigningKey(e.to_string()))?;
        let encryption_public = pem::x25519_public_from_pem(&doc.encryption_public)?;
        Ok(CompanyPublicIdentity {
            name: doc.name.clone(),
            signing_public,
            encryption_public,
        })
    }
}
