//! Local certificate authority
//!
//! Loads a signing certificate and key from PEM, issues leaf certificates
//! bound to a common name, DNS names and IP addresses, and exports the
//! resulting certificate, chain and key back to PEM.

mod armor;
pub mod error;
pub mod identity;
pub mod key;
pub mod self_signed;
pub mod template;

pub use error::{CertError, Result};
pub use identity::{SigningIdentity, LEAF_KEY_BITS};
pub use key::PrivateKey;
pub use self_signed::{generate_root_ca, ROOT_KEY_BITS};

/// Re-exported so callers can name certificate types without depending on rustls
pub use rustls::pki_types::CertificateDer;
