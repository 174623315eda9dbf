//! PEM armor helpers
//!
//! Output matches what OpenSSL writes: 64-column base64 with LF line endings.

use pem::{EncodeConfig, LineEnding, Pem};
use std::io::Write;

use crate::error::{CertError, Result};

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";

/// Decode the first PEM block found in `input`.
///
/// `what` names the input in the error message ("Certificate", "Key").
pub(crate) fn decode(input: &[u8], what: &str) -> Result<Pem> {
    pem::parse(input)
        .map_err(|_| CertError::format(format!("{} is not in PEM format", what)))
}

/// Encode `der` as a single PEM block.
pub(crate) fn encode(label: &str, der: &[u8]) -> String {
    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    pem::encode_config(&Pem::new(label, der), config)
}

/// Write `der` to `writer` as a single PEM block.
pub(crate) fn write_block<W: Write>(mut writer: W, label: &str, der: &[u8]) -> Result<()> {
    writer.write_all(encode(label, der).as_bytes())?;
    Ok(())
}
