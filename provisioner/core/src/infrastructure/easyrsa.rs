// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! EasyRSA Credential Issuer
//!
//! Runs `easyrsa --batch --pki-dir=<pki> --days=<n> build-client-full <id> nopass`
//! as an argument vector (no shell) and reads the resulting material from the
//! PKI. If the PKI already holds a certificate and key for the identity (an
//! earlier attempt got that far before its worker died) they are reused rather
//! than issued again, since EasyRSA refuses duplicate requests.

use async_trait::async_trait;
use rustls_pemfile::Item;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::domain::config::IssuerConfig;
use crate::domain::identity::Identity;
use crate::domain::issuer::{CredentialBundle, CredentialIssuer, IssuerError};

/// Longest stderr excerpt kept in a failure message.
const STDERR_EXCERPT: usize = 512;

#[derive(Debug, Clone)]
pub struct EasyRsaIssuer {
    easyrsa_path: PathBuf,
    pki_dir: PathBuf,
    ca_cert: PathBuf,
    days: u32,
    tls_crypt_key: Option<PathBuf>,
}

impl EasyRsaIssuer {
    pub fn new(config: &IssuerConfig) -> Self {
        Self {
            easyrsa_path: config.easyrsa_path.clone(),
            pki_dir: config.pki_dir.clone(),
            ca_cert: config.ca_cert_path(),
            days: config.days,
            tls_crypt_key: config.tls_crypt_key.clone(),
        }
    }

    fn issued_cert(&self, identity: &Identity) -> PathBuf {
        self.pki_dir.join("issued").join(format!("{identity}.crt"))
    }

    fn private_key(&self, identity: &Identity) -> PathBuf {
        self.pki_dir.join("private").join(format!("{identity}.key"))
    }

    async fn build_client(&self, identity: &Identity) -> Result<(), IssuerError> {
        let mut command = Command::new(&self.easyrsa_path);
        command
            .arg("--batch")
            .arg(format!("--pki-dir={}", self.pki_dir.display()))
            .arg(format!("--days={}", self.days))
            .arg("build-client-full")
            .arg(identity.as_str())
            .arg("nopass")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.easyrsa_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        tracing::info!(identity = %identity, tool = %self.easyrsa_path.display(), "Issuing client certificate");
        let output = command.output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => IssuerError::ToolNotFound(self.easyrsa_path.display().to_string()),
            _ => IssuerError::Io {
                path: self.easyrsa_path.display().to_string(),
                message: e.to_string(),
            },
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IssuerError::ToolFailed {
                status: output.status.to_string(),
                stderr: excerpt(stderr.trim()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialIssuer for EasyRsaIssuer {
    async fn issue(&self, identity: &Identity) -> Result<CredentialBundle, IssuerError> {
        let cert_path = self.issued_cert(identity);
        let key_path = self.private_key(identity);

        let already_issued = file_exists(&cert_path).await && file_exists(&key_path).await;
        if already_issued {
            tracing::info!(identity = %identity, "Reusing certificate already present in the PKI");
        } else {
            self.build_client(identity).await?;
        }

        let ca_cert = pem_blocks(&read_text(&self.ca_cert).await?, Material::Certificates, &self.ca_cert)?;
        let client_cert = pem_blocks(&read_text(&cert_path).await?, Material::Certificates, &cert_path)?;
        let client_key = pem_blocks(&read_text(&key_path).await?, Material::PrivateKey, &key_path)?;
        let tls_crypt = match &self.tls_crypt_key {
            Some(path) => Some(static_key_block(&read_text(path).await?, path)?),
            None => None,
        };

        Ok(CredentialBundle {
            ca_cert,
            client_cert,
            client_key,
            tls_crypt,
        })
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_text(path: &Path) -> Result<String, IssuerError> {
    tokio::fs::read_to_string(path).await.map_err(|e| IssuerError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// What a PKI file must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Material {
    /// One or more X.509 certificates (a CA file may carry a chain).
    Certificates,
    /// Exactly one PKCS#1, PKCS#8 or SEC1 private key.
    PrivateKey,
}

/// Validate the PEM sections of `text` and return them, text dump excluded.
///
/// EasyRSA prefixes issued certificates with an `openssl x509 -text` dump
/// that does not belong in a profile. Sections are decoded with
/// `rustls-pemfile` (matching BEGIN/END labels, base64 body) and certificates
/// must parse as X.509, so truncated or corrupt material fails the job.
fn pem_blocks(text: &str, expected: Material, path: &Path) -> Result<String, IssuerError> {
    let invalid = |reason: String| IssuerError::InvalidMaterial(format!("{}: {reason}", path.display()));

    let mut blocks: Vec<&str> = Vec::new();
    let mut rest = text.as_bytes();
    loop {
        let before = rest;
        let Some((item, after)) =
            rustls_pemfile::read_one_from_slice(rest).map_err(|e| invalid(format!("malformed PEM: {e:?}")))?
        else {
            break;
        };
        rest = after;

        match (expected, &item) {
            (Material::Certificates, Item::X509Certificate(der)) => {
                let (trailing, _) = x509_parser::parse_x509_certificate(der.as_ref())
                    .map_err(|e| invalid(format!("unreadable certificate: {e}")))?;
                if !trailing.is_empty() {
                    return Err(invalid("trailing bytes after certificate".to_string()));
                }
            }
            (Material::PrivateKey, Item::Pkcs1Key(_) | Item::Pkcs8Key(_) | Item::Sec1Key(_)) => {
                if !blocks.is_empty() {
                    return Err(invalid("more than one private key".to_string()));
                }
            }
            (Material::Certificates, _) => return Err(invalid("expected only certificates".to_string())),
            (Material::PrivateKey, _) => return Err(invalid("expected only a private key".to_string())),
        }

        // The parser consumed any dump text before the section, so the
        // section text starts at the last BEGIN marker of the consumed bytes.
        let consumed = &text[text.len() - before.len()..text.len() - after.len()];
        let begin = consumed
            .rfind("-----BEGIN ")
            .ok_or_else(|| invalid("section without BEGIN marker".to_string()))?;
        blocks.push(consumed[begin..].trim_end());
    }

    if blocks.is_empty() {
        return Err(invalid("contains no PEM block".to_string()));
    }
    Ok(blocks.join("\n"))
}

const STATIC_KEY_BEGIN: &str = "-----BEGIN OpenVPN Static key V1-----";
const STATIC_KEY_END: &str = "-----END OpenVPN Static key V1-----";

/// The OpenVPN static key block of a `tls-crypt` key file. Its body is hex,
/// so it is checked here rather than by a PEM decoder.
fn static_key_block(text: &str, path: &Path) -> Result<String, IssuerError> {
    let invalid = |reason: &str| IssuerError::InvalidMaterial(format!("{}: {reason}", path.display()));

    let start = text.find(STATIC_KEY_BEGIN).ok_or_else(|| invalid("no OpenVPN static key block"))?;
    let body_start = start + STATIC_KEY_BEGIN.len();
    let body_len = text[body_start..]
        .find(STATIC_KEY_END)
        .ok_or_else(|| invalid("unterminated OpenVPN static key block"))?;
    let body = &text[body_start..body_start + body_len];

    let hex: String = body.split_whitespace().collect();
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("static key body is not hex"));
    }
    Ok(text[start..body_start + body_len + STATIC_KEY_END.len()].to_string())
}

fn excerpt(stderr: &str) -> String {
    if stderr.len() <= STDERR_EXCERPT {
        return stderr.to_string();
    }
    let mut cut = stderr.len() - STDERR_EXCERPT;
    while !stderr.is_char_boundary(cut) {
        cut += 1;
    }
    format!("...{}", &stderr[cut..])
}
