//! Self-signed root CA generation for development setups
//!
//! Produces the `ca.crt`/`ca.key` pair the issuing service loads at start-up.

use tracing::info;

use crate::error::{CertError, Result};
use crate::identity::SigningIdentity;
use crate::key::PrivateKey;
use crate::template;

/// Size of the RSA key generated for a new root CA.
pub const ROOT_KEY_BITS: usize = 2048;

/// Generate a self-signed root CA.
///
/// # Features
/// - RSA 2048-bit key
/// - Valid for 100 years
/// - CA basic constraint with certificate and CRL signing key usages
/// - Same organisational subject fields as the certificates it issues
///
/// # Example
/// ```no_run
/// use devcerts_cert::generate_root_ca;
///
/// let ca = generate_root_ca("devcerts CA").unwrap();
/// let mut cert_pem = Vec::new();
/// ca.write_cert(&mut cert_pem).unwrap();
/// ```
pub fn generate_root_ca(common_name: &str) -> Result<SigningIdentity> {
    let params = template::root(common_name)?;

    let key = PrivateKey::generate_rsa(ROOT_KEY_BITS)?;
    let key_pair = key.signing_key_pair()?;

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::Crypto(format!("Root certificate generation failed: {}", e)))?;

    info!("Generated root CA '{}'", common_name);

    Ok(SigningIdentity::from_parts(
        key,
        cert.der().clone(),
        Vec::new(),
    ))
}
