//! Signing identity: a certificate, its private key and the chain above it

use rustls::pki_types::CertificateDer;
use std::io::Write;
use tracing::{debug, info};
use x509_cert::der::asn1::BitString;
use x509_cert::der::{Decode, Encode};
use x509_cert::name::Name;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::ParsedExtension;
use x509_parser::parse_x509_certificate;

use crate::armor;
use crate::error::{CertError, Result};
use crate::key::PrivateKey;
use crate::template;

/// Size of the RSA key generated for every issued certificate.
pub const LEAF_KEY_BITS: usize = 2048;

/// A certificate, the private key bound to it, and every certificate in its
/// chain of trust.
///
/// `chain[0]` is the root. Each entry signed the next one, and the last
/// entry signed `certificate`. The chain is empty for a self-signed
/// identity. Identities are never mutated after construction; issuing
/// builds a new, independently owned chain.
#[derive(Debug, Clone)]
pub struct SigningIdentity {
    key: PrivateKey,
    certificate: CertificateDer<'static>,
    chain: Vec<CertificateDer<'static>>,
}

impl SigningIdentity {
    pub(crate) fn from_parts(
        key: PrivateKey,
        certificate: CertificateDer<'static>,
        chain: Vec<CertificateDer<'static>>,
    ) -> Self {
        Self {
            key,
            certificate,
            chain,
        }
    }

    /// Load an identity from a PEM certificate and a PEM private key.
    ///
    /// The certificate is taken as the start of the chain of trust, so the
    /// resulting chain is empty. Key and certificate are not checked against
    /// each other here; a mismatch surfaces when the identity signs.
    pub fn load(cert_pem: impl AsRef<[u8]>, key_pem: impl AsRef<[u8]>) -> Result<Self> {
        let block = armor::decode(cert_pem.as_ref(), "Certificate")?;
        if block.tag() != armor::CERTIFICATE {
            return Err(CertError::format(
                "Provided certificate PEM is not a 'CERTIFICATE'",
            ));
        }

        let der = block.into_contents();
        parse_x509_certificate(&der)
            .map_err(|e| CertError::Format(format!("Invalid certificate: {}", e)))?;

        let key = PrivateKey::from_pem(key_pem.as_ref())?;
        debug!("Loaded signing identity with {} key", key.algorithm());

        Ok(Self::from_parts(key, CertificateDer::from(der), Vec::new()))
    }

    /// Issue a new non-CA certificate signed by this identity.
    ///
    /// The new identity gets a fresh RSA key and a chain made of this
    /// identity's chain followed by this identity's certificate.
    pub fn issue<D, I>(
        &self,
        common_name: &str,
        dns_names: &[D],
        ip_addresses: &[I],
    ) -> Result<SigningIdentity>
    where
        D: AsRef<str>,
        I: AsRef<str>,
    {
        let (_, parent) = parse_x509_certificate(&self.certificate)
            .map_err(|e| CertError::Crypto(format!("Invalid issuer certificate: {}", e)))?;
        let parent_key_id = subject_key_identifier(&parent);

        let mut params = template::leaf(common_name, dns_names, ip_addresses)?;
        params.use_authority_key_identifier_extension = parent_key_id.is_some();

        let key = PrivateKey::generate_rsa(LEAF_KEY_BITS)?;
        let subject_key = key.signing_key_pair()?;

        let issuer_key = self.key.signing_key_pair()?;
        let issuer = template::issuer(parent_key_id)
            .self_signed(&issuer_key)
            .map_err(|e| CertError::Crypto(format!("Unusable issuer key: {}", e)))?;

        let draft = params
            .signed_by(&subject_key, &issuer, &issuer_key)
            .map_err(|e| CertError::Crypto(format!("Certificate signing failed: {}", e)))?;
        let certificate = resign_with_issuer(draft.der(), parent.subject().as_raw(), &self.key)?;

        let serial = {
            let (_, parsed) = parse_x509_certificate(&certificate).map_err(|e| {
                CertError::Crypto(format!("Signed certificate does not parse: {}", e))
            })?;

            if parsed.issuer().as_raw() != parent.subject().as_raw() {
                return Err(CertError::crypto(
                    "Issuer name does not match the issuer certificate subject",
                ));
            }

            // The loaded key is only checked against its certificate here.
            parsed
                .verify_signature(Some(parent.public_key()))
                .map_err(|_| {
                    CertError::crypto("Issuer private key does not match the issuer certificate")
                })?;

            parsed.raw_serial_as_string()
        };

        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.extend(self.chain.iter().cloned());
        chain.push(self.certificate.clone());

        info!(
            "Issued certificate for '{}' (serial {}, chain depth {})",
            common_name,
            serial,
            chain.len()
        );

        Ok(Self::from_parts(key, certificate, chain))
    }

    /// DER encoding of this identity's own certificate
    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.certificate
    }

    /// Ancestor certificates, root first
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    /// Write this identity's certificate as a `CERTIFICATE` PEM block.
    pub fn write_cert<W: Write>(&self, writer: W) -> Result<()> {
        armor::write_block(writer, armor::CERTIFICATE, &self.certificate)
    }

    /// Write every chain entry except the root, closest to this identity
    /// first. Writes nothing when there are no intermediates.
    pub fn write_intermediates<W: Write>(&self, mut writer: W) -> Result<()> {
        for cert in self.chain.iter().skip(1).rev() {
            armor::write_block(&mut writer, armor::CERTIFICATE, cert)?;
        }
        Ok(())
    }

    /// Write the root of the chain. Writes nothing for a self-signed identity.
    pub fn write_root<W: Write>(&self, writer: W) -> Result<()> {
        match self.chain.first() {
            Some(root) => armor::write_block(writer, armor::CERTIFICATE, root),
            None => Ok(()),
        }
    }

    /// Write the private key as PKCS#1 (RSA) or SEC1 (EC).
    pub fn write_key<W: Write>(&self, writer: W) -> Result<()> {
        let (label, der) = self.key.to_pem_block()?;
        armor::write_block(writer, label, &der)
    }
}

fn subject_key_identifier(cert: &X509Certificate<'_>) -> Option<Vec<u8>> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
            _ => None,
        })
}

/// Put `issuer_name` into `certificate` byte for byte and sign it again
/// with `key`. Repeated attribute types and multi-valued RDNs in the
/// issuer's subject survive unchanged.
fn resign_with_issuer(
    certificate: &[u8],
    issuer_name: &[u8],
    key: &PrivateKey,
) -> Result<CertificateDer<'static>> {
    let mut cert = x509_cert::Certificate::from_der(certificate)
        .map_err(|e| CertError::Crypto(format!("Signed certificate does not parse: {}", e)))?;

    cert.tbs_certificate.issuer = Name::from_der(issuer_name)
        .map_err(|e| CertError::Crypto(format!("Invalid issuer name: {}", e)))?;

    let tbs = cert.tbs_certificate.to_der().map_err(CertError::crypto)?;
    let signature = key.sign(&tbs)?;
    cert.signature = BitString::from_bytes(&signature).map_err(CertError::crypto)?;

    let der = cert.to_der().map_err(CertError::crypto)?;
    Ok(CertificateDer::from(der))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_certificate_label_is_rejected() {
        let key = armor::encode(armor::PRIVATE_KEY, b"key");
        let err = SigningIdentity::load(key.as_bytes(), key.as_bytes()).unwrap_err();

        assert!(
            matches!(err, CertError::Format(ref m) if m == "Provided certificate PEM is not a 'CERTIFICATE'")
        );
    }

    #[test]
    fn test_non_pem_certificate_is_rejected() {
        let err = SigningIdentity::load(b"hello", b"world").unwrap_err();
        assert!(matches!(err, CertError::Format(ref m) if m == "Certificate is not in PEM format"));
    }

    #[test]
    fn test_certificate_payload_must_be_x509() {
        let cert = armor::encode(armor::CERTIFICATE, b"not der");
        let err = SigningIdentity::load(cert.as_bytes(), b"").unwrap_err();
        assert!(matches!(err, CertError::Format(_)));
    }
}
