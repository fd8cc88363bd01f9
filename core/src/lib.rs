//! Cryptographic envelope and selective-disclosure engine for bilateral
//! delivery-versus-payment transactions.
//!
//! A seller encrypts a transaction document once (`protect`), the buyer
//! counter-signs it (`buyer_sign`), and either party can later recover the
//! plaintext (`unprotect`). Either party can delegate read access for the
//! whole transaction or a named layer to a third party via a `ShareRecord`,
//! and anyone holding the relevant public keys can audit all of the above
//! without needing any private key (`check`).

pub mod canonical;
pub mod check;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod keywrap;
pub mod layers;
pub mod pem;
pub mod primitives;
pub mod share;

pub use check::{check, CheckReport, ShareCheck};
pub use envelope::{buyer_sign, protect, unprotect, EnvelopeLike, LayeredEnvelope, Meta, ProtectedTransaction};
pub use error::CoreError;
pub use identity::{
    generate_company_identity, CompanyIdentity, CompanyIdentityDocument, CompanyPublicIdentity,
    CompanyPublicIdentityDocument, IdentityError,
};
pub use keywrap::{unwrap_key, wrap_key, WrappedKey};
pub use layers::{create_layer_share_records, protect_with_layers, unprotect_layer};
pub use share::{create_share_record, verify_share_record, ShareRecord};
