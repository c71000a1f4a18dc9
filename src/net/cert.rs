//! Certificate provisioning for `https` listeners.
//!
//! # Responsibilities
//! - Reuse an existing certificate/key pair when one is present
//! - Generate a self-signed ECDSA P-256 certificate covering every common name
//! - Persist PEM files, the private key readable by its owner only
//!
//! # Design Decisions
//! - Explicit paths are both-or-neither; a half-present pair is an error
//! - Generated pairs live at deterministic temp-dir paths keyed by the
//!   sorted common names, so restarts with the same hosts reuse them
//! - `localhost` is always covered

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose,
    SanType, SerialNumber, PKCS_ECDSA_P256_SHA256,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Name always added to the common-name set.
pub const LOCALHOST: &str = "localhost";

const VALIDITY_DAYS: i64 = 365;
const FILE_PREFIX: &str = "webgrapple-temp";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate and key must be given together (got {given}, missing {missing})")]
    Incomplete { given: &'static str, missing: &'static str },

    #[error("{present} exists but {missing} does not")]
    Mismatched { present: PathBuf, missing: PathBuf },

    #[error("could not generate serial number: {0}")]
    Serial(#[from] rand::Error),

    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CertificateError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Paths to a usable PEM certificate and PKCS#8 PEM private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Make sure a certificate covering `common_names` exists.
///
/// With explicit paths the pair is reused if both files exist and generated
/// there if neither does. Without paths the pair lives in the system temp
/// directory.
pub fn ensure(
    common_names: &[String],
    cert_path: Option<&Path>,
    key_path: Option<&Path>,
) -> Result<CertificateMaterial, CertificateError> {
    ensure_in(&std::env::temp_dir(), common_names, cert_path, key_path)
}

/// [`ensure`] with an explicit directory for generated pairs.
pub fn ensure_in(
    temp_dir: &Path,
    common_names: &[String],
    cert_path: Option<&Path>,
    key_path: Option<&Path>,
) -> Result<CertificateMaterial, CertificateError> {
    let names = normalize(common_names);

    let material = match (cert_path, key_path) {
        (Some(cert), Some(key)) => {
            let material = CertificateMaterial {
                cert_path: cert.to_path_buf(),
                key_path: key.to_path_buf(),
            };
            match (cert.is_file(), key.is_file()) {
                (true, true) => {
                    tracing::info!(cert = %cert.display(), key = %key.display(), "Using supplied certificate");
                    return Ok(material);
                }
                (true, false) => {
                    return Err(CertificateError::Mismatched {
                        present: material.cert_path,
                        missing: material.key_path,
                    })
                }
                (false, true) => {
                    return Err(CertificateError::Mismatched {
                        present: material.key_path,
                        missing: material.cert_path,
                    })
                }
                (false, false) => material,
            }
        }
        (Some(_), None) => {
            return Err(CertificateError::Incomplete {
                given: "certificate",
                missing: "key",
            })
        }
        (None, Some(_)) => {
            return Err(CertificateError::Incomplete {
                given: "key",
                missing: "certificate",
            })
        }
        (None, None) => {
            let material = temp_material(temp_dir, &names);
            if material.cert_path.is_file() && material.key_path.is_file() {
                tracing::info!(
                    cert = %material.cert_path.display(),
                    "Reusing previously generated certificate"
                );
                return Ok(material);
            }
            material
        }
    };

    generate(&names, &material)?;
    tracing::info!(
        cert = %material.cert_path.display(),
        key = %material.key_path.display(),
        common_names = ?names,
        "Generated self-signed certificate"
    );
    Ok(material)
}

/// Lowercase, deduplicate, sort and add `localhost`.
fn normalize(common_names: &[String]) -> Vec<String> {
    common_names
        .iter()
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
        .chain(std::iter::once(LOCALHOST.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn temp_material(dir: &Path, names: &[String]) -> CertificateMaterial {
    let key: String = names
        .join("-")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    CertificateMaterial {
        cert_path: dir.join(format!("cert-{FILE_PREFIX}-{key}.pem")),
        key_path: dir.join(format!("key-{FILE_PREFIX}-{key}.pem")),
    }
}

fn generate(names: &[String], material: &CertificateMaterial) -> Result<(), CertificateError> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, "webgrapple");
    dn.push(DnType::CommonName, names.first().map(String::as_str).unwrap_or(LOCALHOST));
    params.distinguished_name = dn;

    for name in names {
        match name.parse::<IpAddr>() {
            Ok(ip) => params.subject_alt_names.push(SanType::IpAddress(ip)),
            Err(_) => params
                .subject_alt_names
                .push(SanType::DnsName(name.clone().try_into()?)),
        }
    }

    let now = OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + Duration::days(VALIDITY_DAYS);

    let mut serial = [0u8; 16];
    OsRng.try_fill_bytes(&mut serial)?;
    serial[0] &= 0x7f;
    params.serial_number = Some(SerialNumber::from_slice(&serial));

    params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
    let cert = params.self_signed(&key_pair)?;

    write_file(&material.cert_path, cert.pem().as_bytes(), false)?;
    write_file(&material.key_path, key_pair.serialize_pem().as_bytes(), true)?;
    Ok(())
}

fn write_file(path: &Path, contents: &[u8], private: bool) -> Result<(), CertificateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(CertificateError::io(path))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(CertificateError::io(path))?;

    // `mode` only applies on creation.
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(CertificateError::io(path))?;
    }
    #[cfg(not(unix))]
    let _ = private;

    file.write_all(contents).map_err(CertificateError::io(path))?;
    file.sync_all().map_err(CertificateError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sans(cert_path: &Path) -> (Vec<String>, Vec<IpAddr>) {
        let pem = fs::read_to_string(cert_path).unwrap();
        let params = CertificateParams::from_ca_cert_pem(&pem).unwrap();
        let mut dns = Vec::new();
        let mut ips = Vec::new();
        for san in params.subject_alt_names {
            match san {
                SanType::DnsName(name) => dns.push(name.as_str().to_string()),
                SanType::IpAddress(ip) => ips.push(ip),
                other => panic!("unexpected SAN {other:?}"),
            }
        }
        dns.sort();
        (dns, ips)
    }

    #[test]
    fn generates_into_temp_dir_and_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_in(dir.path(), &names(&["www.example.com"]), None, None).unwrap();
        assert_eq!(
            first.cert_path,
            dir.path().join("cert-webgrapple-temp-localhost-www.example.com.pem")
        );
        let cert_mtime = fs::metadata(&first.cert_path).unwrap().modified().unwrap();
        let key_before = fs::read(&first.key_path).unwrap();

        let second = ensure_in(dir.path(), &names(&["WWW.example.com", "localhost"]), None, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::metadata(&second.cert_path).unwrap().modified().unwrap(), cert_mtime);
        assert_eq!(fs::read(&second.key_path).unwrap(), key_before);
    }

    #[test]
    fn sans_follow_name_classification() {
        let dir = tempfile::tempdir().unwrap();
        let material =
            ensure_in(dir.path(), &names(&["127.0.0.1", "unknown.invalid", "::1"]), None, None).unwrap();

        let (dns, mut ips) = sans(&material.cert_path);
        ips.sort();
        assert_eq!(dns, vec!["localhost", "unknown.invalid"]);
        assert_eq!(
            ips,
            vec!["127.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse::<IpAddr>().unwrap()]
        );
    }

    #[test]
    fn key_is_pkcs8_and_private() {
        let dir = tempfile::tempdir().unwrap();
        let material = ensure_in(dir.path(), &[], None, None).unwrap();

        let pem = fs::read(&material.key_path).unwrap();
        let mut reader = pem.as_slice();
        let key = rustls_pemfile::private_key(&mut reader).unwrap().unwrap();
        assert!(matches!(key, rustls::pki_types::PrivateKeyDer::Pkcs8(_)));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&material.key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn explicit_paths_are_both_or_neither() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");

        assert!(matches!(
            ensure_in(dir.path(), &[], Some(&cert), None),
            Err(CertificateError::Incomplete { .. })
        ));

        fs::write(&cert, "not really a certificate").unwrap();
        assert!(matches!(
            ensure_in(dir.path(), &[], Some(&cert), Some(&key)),
            Err(CertificateError::Mismatched { missing, .. }) if missing == key
        ));
    }

    #[test]
    fn explicit_paths_are_generated_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("tls").join("cert.pem");
        let key = dir.path().join("tls").join("key.pem");

        let material = ensure_in(dir.path(), &names(&["dev.local"]), Some(&cert), Some(&key)).unwrap();
        assert_eq!(material.cert_path, cert);
        let pem = fs::read(&cert).unwrap();

        ensure_in(dir.path(), &names(&["other.local"]), Some(&cert), Some(&key)).unwrap();
        assert_eq!(fs::read(&cert).unwrap(), pem);
    }
}
