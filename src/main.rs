//! devcerts CLI - Local certificate authority for development
//!
//! Serves the certificate request page or issues bundles straight to disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devcerts_api::{bundle, ApiServer, ApiServerConfig};
use devcerts_cert::{generate_root_ca, SigningIdentity};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// devcerts - Issue development certificates from a local CA
#[derive(Parser, Debug)]
#[command(name = "devcerts")]
#[command(about = "devcerts - Issue development certificates from a local CA")]
#[command(version)]
#[command(long_version = concat!(env!("CARGO_PKG_VERSION"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Location of the signing CA
#[derive(clap::Args, Debug)]
struct CaArgs {
    /// CA certificate (PEM)
    #[arg(long, env = "DEVCERTS_CA_CERT", default_value = "ca.crt")]
    ca_cert: PathBuf,

    /// CA private key (PEM)
    #[arg(long, env = "DEVCERTS_CA_KEY", default_value = "ca.key")]
    ca_key: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the certificate request page
    #[command(long_about = r#"
Serve the web page and the /create-certificate endpoint. Every
certificate is signed by the CA given with --ca-cert and --ca-key.

EXAMPLES:
  # Serve on the default port
  devcerts serve --ca-cert ca.crt --ca-key ca.key

  # Serve on all interfaces, port 8080
  devcerts serve --bind 0.0.0.0 --port 8080

ENVIRONMENT VARIABLES:
  DEVCERTS_CA_CERT  CA certificate path
  DEVCERTS_CA_KEY   CA private key path
  DEVCERTS_BIND     Address to bind
  PORT              Port to listen on
    "#)]
    Serve {
        #[command(flatten)]
        ca: CaArgs,

        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "80")]
        port: u16,

        /// Address to bind
        #[arg(long, env = "DEVCERTS_BIND", default_value = "127.0.0.1")]
        bind: IpAddr,

        /// Allow cross-origin requests from localhost pages
        #[arg(long)]
        cors: bool,
    },

    /// Issue a certificate bundle into a directory
    Issue {
        #[command(flatten)]
        ca: CaArgs,

        /// Subject common name
        #[arg(long)]
        common_name: String,

        /// DNS name to include (repeatable)
        #[arg(long = "dns")]
        dns_names: Vec<String>,

        /// IP address to include (repeatable)
        #[arg(long = "ip")]
        ip_addresses: Vec<String>,

        /// Output directory for cert.crt, cert.key and ca.crt
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Create a new self-signed root CA
    InitCa {
        /// Root common name
        #[arg(long, default_value = "devcerts CA")]
        common_name: String,

        /// Where to write the CA certificate
        #[arg(long, default_value = "ca.crt")]
        cert_out: PathBuf,

        /// Where to write the CA private key
        #[arg(long, default_value = "ca.key")]
        key_out: PathBuf,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Load the signing CA from its PEM files
fn load_authority(ca: &CaArgs) -> Result<SigningIdentity> {
    let cert_pem = fs::read(&ca.ca_cert)
        .with_context(|| format!("Failed to read CA certificate {:?}", ca.ca_cert))?;
    let key_pem = fs::read(&ca.ca_key)
        .with_context(|| format!("Failed to read CA key {:?}", ca.ca_key))?;

    let authority = SigningIdentity::load(&cert_pem, &key_pem)
        .with_context(|| format!("Failed to load CA from {:?} and {:?}", ca.ca_cert, ca.ca_key))?;

    info!("Loaded CA certificate from {:?}", ca.ca_cert);
    Ok(authority)
}

fn issue_to_dir(
    authority: &SigningIdentity,
    common_name: &str,
    dns_names: &[String],
    ip_addresses: &[String],
    out: &Path,
) -> Result<Vec<PathBuf>> {
    let identity = authority
        .issue(common_name, dns_names, ip_addresses)
        .with_context(|| format!("Failed to issue certificate for '{}'", common_name))?;

    bundle::write_dir(&identity, out)
        .with_context(|| format!("Failed to write certificate bundle to {:?}", out))
}

/// Open a file for writing, refusing to clobber it unless forced
fn create_output(path: &Path, force: bool) -> Result<BufWriter<fs::File>> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).with_context(|| {
        if path.exists() && !force {
            format!("{:?} already exists (use --force to overwrite)", path)
        } else {
            format!("Failed to create {:?}", path)
        }
    })?;

    Ok(BufWriter::new(file))
}

fn write_output<F>(path: &Path, force: bool, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> devcerts_cert::Result<()>,
{
    let mut file = create_output(path, force)?;
    write(&mut file).with_context(|| format!("Failed to write {:?}", path))?;
    file.flush()
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

fn init_ca(common_name: &str, cert_out: &Path, key_out: &Path, force: bool) -> Result<()> {
    if !force {
        for path in [cert_out, key_out] {
            if path.exists() {
                anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
            }
        }
    }

    let root = generate_root_ca(common_name).context("Failed to generate root CA")?;

    write_output(cert_out, force, |file| root.write_cert(file))?;

    // Never leave a certificate behind without its key
    if let Err(e) = write_output(key_out, force, |file| root.write_key(file)) {
        let _ = fs::remove_file(cert_out);
        return Err(e);
    }

    info!(
        "Created root CA '{}' at {:?} (key {:?})",
        common_name, cert_out, key_out
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            ca,
            port,
            bind,
            cors,
        } => {
            let authority = load_authority(&ca)?;

            let config = ApiServerConfig {
                bind_addr: SocketAddr::new(bind, port),
                enable_cors: cors,
            };

            info!("devcerts starting...");
            ApiServer::new(config, authority).start().await?;
        }
        Commands::Issue {
            ca,
            common_name,
            dns_names,
            ip_addresses,
            out,
        } => {
            let authority = load_authority(&ca)?;
            let written = issue_to_dir(&authority, &common_name, &dns_names, &ip_addresses, &out)?;

            for path in written {
                info!("Wrote {:?}", path);
            }
        }
        Commands::InitCa {
            common_name,
            cert_out,
            key_out,
            force,
        } => {
            init_ca(&common_name, &cert_out, &key_out, force)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["devcerts", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { ca, bind, cors, .. } => {
                assert_eq!(ca.ca_cert, PathBuf::from("ca.crt"));
                assert_eq!(ca.ca_key, PathBuf::from("ca.key"));
                assert_eq!(bind, IpAddr::from([127, 0, 0, 1]));
                assert!(!cors);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_issue_collects_repeated_names() {
        let cli = Cli::try_parse_from([
            "devcerts",
            "issue",
            "--common-name",
            "test.com",
            "--dns",
            "a.test",
            "--dns",
            "b.test",
            "--ip",
            "::1",
        ])
        .unwrap();

        match cli.command {
            Commands::Issue {
                dns_names,
                ip_addresses,
                ..
            } => {
                assert_eq!(dns_names, vec!["a.test", "b.test"]);
                assert_eq!(ip_addresses, vec!["::1"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_init_ca_then_issue() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CaArgs {
            ca_cert: dir.path().join("ca.crt"),
            ca_key: dir.path().join("ca.key"),
        };

        init_ca("Test CA", &ca.ca_cert, &ca.ca_key, false).unwrap();
        let authority = load_authority(&ca).unwrap();

        let out = dir.path().join("out");
        let written = issue_to_dir(
            &authority,
            "test.com",
            &["test.com".to_string()],
            &["127.0.0.1".to_string()],
            &out,
        )
        .unwrap();
        assert_eq!(written.len(), 3);

        let root = fs::read_to_string(out.join(bundle::ROOT_FILE)).unwrap();
        assert_eq!(root, fs::read_to_string(&ca.ca_cert).unwrap());
    }

    #[test]
    fn test_init_ca_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cert_out = dir.path().join("ca.crt");
        let key_out = dir.path().join("ca.key");
        fs::write(&cert_out, "existing").unwrap();

        let err = init_ca("Test CA", &cert_out, &key_out, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&cert_out).unwrap(), "existing");
        assert!(!key_out.exists());

        init_ca("Test CA", &cert_out, &key_out, true).unwrap();
        assert!(fs::read_to_string(&cert_out)
            .unwrap()
            .starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_init_ca_removes_certificate_when_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cert_out = dir.path().join("ca.crt");
        let key_out = dir.path().join("missing-dir").join("ca.key");

        assert!(init_ca("Test CA", &cert_out, &key_out, false).is_err());
        assert!(!cert_out.exists());
        assert!(!key_out.exists());
    }

    #[test]
    fn test_load_authority_rejects_binary_file_as_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CaArgs {
            ca_cert: dir.path().join("ca.crt"),
            ca_key: dir.path().join("ca.key"),
        };
        fs::write(&ca.ca_cert, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        fs::write(&ca.ca_key, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = load_authority(&ca).unwrap_err();
        let cert_err = err
            .downcast_ref::<devcerts_cert::CertError>()
            .expect("error should come from loading, not reading");
        assert!(matches!(cert_err, devcerts_cert::CertError::Format(_)));
    }

    #[test]
    fn test_load_authority_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CaArgs {
            ca_cert: dir.path().join("missing.crt"),
            ca_key: dir.path().join("missing.key"),
        };

        let err = load_authority(&ca).unwrap_err();
        assert!(err.to_string().contains("Failed to read CA certificate"));
    }
}
