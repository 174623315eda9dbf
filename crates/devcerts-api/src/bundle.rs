//! Packaging of an issued identity into the files handed to the caller
//!
//! Every bundle holds the same three files:
//! - `cert.crt`: the certificate followed by its intermediates, closest first
//! - `cert.key`: the private key
//! - `ca.crt`: the root of the chain

use devcerts_cert::{CertError, SigningIdentity};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CERT_FILE: &str = "cert.crt";
pub const KEY_FILE: &str = "cert.key";
pub const ROOT_FILE: &str = "ca.crt";

/// Bundle packaging errors
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Certificate export failed: {0}")]
    Cert(#[from] CertError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the bundle as a zip archive and return the underlying writer.
pub fn write_zip<W: Write + Seek>(identity: &SigningIdentity, writer: W) -> Result<W, BundleError> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(CERT_FILE, options)?;
    identity.write_cert(&mut zip)?;
    identity.write_intermediates(&mut zip)?;

    zip.start_file(KEY_FILE, options)?;
    identity.write_key(&mut zip)?;

    zip.start_file(ROOT_FILE, options)?;
    identity.write_root(&mut zip)?;

    Ok(zip.finish()?)
}

/// Write the bundle files into `dir`, creating it if needed.
///
/// Returns the paths written, in bundle order.
pub fn write_dir(identity: &SigningIdentity, dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    fs::create_dir_all(dir)?;

    let cert_path = dir.join(CERT_FILE);
    let mut cert_file = BufWriter::new(File::create(&cert_path)?);
    identity.write_cert(&mut cert_file)?;
    identity.write_intermediates(&mut cert_file)?;
    cert_file.flush()?;

    let key_path = dir.join(KEY_FILE);
    let mut key_file = BufWriter::new(File::create(&key_path)?);
    identity.write_key(&mut key_file)?;
    key_file.flush()?;

    let root_path = dir.join(ROOT_FILE);
    let mut root_file = BufWriter::new(File::create(&root_path)?);
    identity.write_root(&mut root_file)?;
    root_file.flush()?;

    debug!("Wrote certificate bundle to {:?}", dir);

    Ok(vec![cert_path, key_path, root_path])
}
