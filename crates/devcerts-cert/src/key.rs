//! Private keys held by a signing identity
//!
//! Each supported algorithm is its own variant so that parsing, export and
//! signer construction are exhaustive matches.

use rcgen::KeyPair;
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, EcdsaSigningAlgorithm, Ed25519KeyPair, RsaKeyPair};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::RsaPrivateKey;
use std::fmt;

use crate::armor;
use crate::error::{CertError, Result};

/// id-Ed25519 (RFC 8410)
const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// id-ecPublicKey (RFC 5480)
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// secp521r1
const P521_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// A private key of one of the supported algorithms
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
    EcP256(p256::SecretKey),
    EcP384(p384::SecretKey),
    /// Raw PKCS#8 document. Usable for signing, not exportable.
    Ed25519(Vec<u8>),
}

impl PrivateKey {
    /// Generate a new RSA key of the given size.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| CertError::Crypto(format!("RSA key generation failed: {}", e)))?;
        Ok(PrivateKey::Rsa(key))
    }

    /// Parse a decoded PEM block, choosing the decoder by the block label.
    pub fn from_pem_block(label: &str, der: &[u8]) -> Result<Self> {
        match label {
            armor::PRIVATE_KEY => Self::from_pkcs8_der(der),
            armor::RSA_PRIVATE_KEY => RsaPrivateKey::from_pkcs1_der(der)
                .map(PrivateKey::Rsa)
                .map_err(|e| CertError::Format(format!("Invalid PKCS#1 RSA key: {}", e))),
            armor::EC_PRIVATE_KEY => Self::from_sec1_der(der),
            _ => Err(CertError::format("Provided key PEM is not a private key")),
        }
    }

    /// Parse a PEM-encoded private key.
    pub fn from_pem(input: &[u8]) -> Result<Self> {
        let block = armor::decode(input, "Key")?;
        Self::from_pem_block(block.tag(), block.contents())
    }

    fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::Rsa(key));
        }
        if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::EcP256(key));
        }
        if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
            return Ok(PrivateKey::EcP384(key));
        }

        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| CertError::Format(format!("Invalid PKCS#8 key: {}", e)))?;
        if info.algorithm.oid == ED25519_OID {
            return Ok(PrivateKey::Ed25519(der.to_vec()));
        }
        if info.algorithm.oid == EC_PUBLIC_KEY_OID {
            return Err(unsupported_curve(info.algorithm.parameters_oid().ok()));
        }

        Err(CertError::Format(format!(
            "Unsupported PKCS#8 key algorithm {}",
            info.algorithm.oid
        )))
    }

    fn from_sec1_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
            return Ok(PrivateKey::EcP256(key));
        }
        if let Ok(key) = p384::SecretKey::from_sec1_der(der) {
            return Ok(PrivateKey::EcP384(key));
        }

        // Well-formed keys on other curves are unsupported, not malformed
        let key = sec1::EcPrivateKey::try_from(der)
            .map_err(|e| CertError::Format(format!("Invalid SEC1 EC key: {}", e)))?;
        Err(unsupported_curve(
            key.parameters.and_then(|params| params.named_curve()),
        ))
    }

    /// Short algorithm name, for logs and error messages.
    pub fn algorithm(&self) -> &'static str {
        match self {
            PrivateKey::Rsa(_) => "RSA",
            PrivateKey::EcP256(_) => "ECDSA P-256",
            PrivateKey::EcP384(_) => "ECDSA P-384",
            PrivateKey::Ed25519(_) => "Ed25519",
        }
    }

    /// PEM label and DER payload for export: PKCS#1 for RSA, SEC1 for EC.
    pub fn to_pem_block(&self) -> Result<(&'static str, Vec<u8>)> {
        match self {
            PrivateKey::Rsa(key) => {
                let der = key.to_pkcs1_der().map_err(CertError::crypto)?;
                Ok((armor::RSA_PRIVATE_KEY, der.as_bytes().to_vec()))
            }
            PrivateKey::EcP256(key) => {
                let der = key.to_sec1_der().map_err(CertError::crypto)?;
                Ok((armor::EC_PRIVATE_KEY, der.to_vec()))
            }
            PrivateKey::EcP384(key) => {
                let der = key.to_sec1_der().map_err(CertError::crypto)?;
                Ok((armor::EC_PRIVATE_KEY, der.to_vec()))
            }
            PrivateKey::Ed25519(_) => Err(CertError::UnsupportedKeyType(
                self.algorithm().to_string(),
            )),
        }
    }

    /// PKCS#8 DER encoding of the key.
    fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let doc = match self {
            PrivateKey::Rsa(key) => key.to_pkcs8_der(),
            PrivateKey::EcP256(key) => key.to_pkcs8_der(),
            PrivateKey::EcP384(key) => key.to_pkcs8_der(),
            PrivateKey::Ed25519(der) => return Ok(der.clone()),
        };
        doc.map(|doc| doc.as_bytes().to_vec())
            .map_err(CertError::crypto)
    }

    /// Key pair usable by the certificate builder, both as signer and as
    /// the subject public key.
    pub(crate) fn signing_key_pair(&self) -> Result<KeyPair> {
        let der = self.to_pkcs8_der()?;
        KeyPair::try_from(der.as_slice()).map_err(|e| {
            CertError::Crypto(format!(
                "{} key cannot be used for signing: {}",
                self.algorithm(),
                e
            ))
        })
    }

    /// Sign `message` with the algorithm the certificate builder picks for
    /// this key: RSA PKCS#1 v1.5 with SHA-256, ECDSA with SHA-256 (P-256) or
    /// SHA-384 (P-384), or Ed25519.
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let rng = SystemRandom::new();
        let der = self.to_pkcs8_der()?;

        match self {
            PrivateKey::Rsa(_) => {
                let key_pair = RsaKeyPair::from_pkcs8(&der).map_err(CertError::crypto)?;
                let mut sig = vec![0; key_pair.public().modulus_len()];
                key_pair
                    .sign(&signature::RSA_PKCS1_SHA256, &rng, message, &mut sig)
                    .map_err(CertError::crypto)?;
                Ok(sig)
            }
            PrivateKey::EcP256(_) => ecdsa_sign(
                &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
                &der,
                message,
                &rng,
            ),
            PrivateKey::EcP384(_) => ecdsa_sign(
                &signature::ECDSA_P384_SHA384_ASN1_SIGNING,
                &der,
                message,
                &rng,
            ),
            PrivateKey::Ed25519(_) => {
                let key_pair =
                    Ed25519KeyPair::from_pkcs8_maybe_unchecked(&der).map_err(CertError::crypto)?;
                Ok(key_pair.sign(message).as_ref().to_vec())
            }
        }
    }
}

fn ecdsa_sign(
    algorithm: &'static EcdsaSigningAlgorithm,
    pkcs8: &[u8],
    message: &[u8],
    rng: &SystemRandom,
) -> Result<Vec<u8>> {
    let key_pair = EcdsaKeyPair::from_pkcs8(algorithm, pkcs8, rng).map_err(CertError::crypto)?;
    let sig = key_pair.sign(rng, message).map_err(CertError::crypto)?;
    Ok(sig.as_ref().to_vec())
}

fn unsupported_curve(curve: Option<ObjectIdentifier>) -> CertError {
    let name = match curve {
        Some(oid) if oid == P521_OID => "ECDSA P-521".to_string(),
        Some(oid) => format!("ECDSA curve {}", oid),
        None => "ECDSA with explicit curve parameters".to_string(),
    };
    CertError::UnsupportedKeyType(name)
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&self.algorithm()).finish()
    }
}
