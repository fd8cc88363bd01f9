//! The error taxonomy the core exposes. Every fallible operation other
//! than [`crate::check::check`] returns `Result<_, CoreError>`; `check`
//! never raises and folds anomalies into its report instead.

use thiserror::Error;

use crate::identity::IdentityError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("document is not representable in the canonical JSON model")]
    CanonicalizationFailed,

    #[error("layer {section:?} is missing fields from the document: {fields:?}")]
    MissingFields { section: String, fields: Vec<String> },

    #[error("no wrapped key for company {name:?}")]
    NoKeyForCompany { name: String },

    #[error("no protected layer named {section:?}")]
    NoSuchLayer { section: String },

    #[error("share record references a different transaction")]
    WrongShareTx,

    #[error("share record references a different section")]
    WrongShareSection,

    #[error("seller signature verification failed; refusing to counter-sign")]
    SellerSignatureInvalid,

    #[error("wrapped-key blob is malformed or its AEAD tag failed to verify")]
    Unwrap,

    #[error("envelope AEAD tag failed to verify")]
    DecryptFailed,

    #[error("identity material is invalid: {0}")]
    Identity(#[from] IdentityError),
}
