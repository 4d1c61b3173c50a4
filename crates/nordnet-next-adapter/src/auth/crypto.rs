/*
[INPUT]:  Username, password and RSA public key material (PEM)
[OUTPUT]: Base64 RSA-PKCS#1 v1.5 ciphertext of the login credential
[POS]:    Auth layer - credential encryption for the login request
[UPDATE]: When changing key formats or the credential layout
*/

use std::fs;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::http::{NordnetError, Result};

/// PKCS#1 v1.5 padding overhead in bytes
const PKCS1_PADDING_LEN: usize = 11;

/// Encrypts login credentials with a parsed RSA public key
#[derive(Debug, Clone)]
pub struct LoginEncryptor {
    public_key: RsaPublicKey,
}

impl LoginEncryptor {
    /// Parse an RSA public key in SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM form
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|spki_err| {
                RsaPublicKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                    NordnetError::KeyFormat(format!(
                        "not an SPKI key ({spki_err}) nor a PKCS#1 key ({pkcs1_err})"
                    ))
                })
            })?;
        Ok(Self { public_key })
    }

    /// Read and parse a PEM key file
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path).map_err(|e| {
            NordnetError::KeyFormat(format!("failed to read key file {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    /// Modulus size in bits
    pub fn key_bits(&self) -> usize {
        self.public_key.size() * 8
    }

    /// Encrypt `username` and `password` together with the current epoch-millisecond timestamp
    pub fn encrypt(&self, username: &str, password: &str) -> Result<String> {
        self.encrypt_at(username, password, Utc::now().timestamp_millis())
    }

    pub(crate) fn encrypt_at(&self, username: &str, password: &str, timestamp_ms: i64) -> Result<String> {
        let plaintext = credential_plaintext(username, password, timestamp_ms);

        let max_len = self.public_key.size().saturating_sub(PKCS1_PADDING_LEN);
        if plaintext.len() > max_len {
            return Err(NordnetError::Encryption(format!(
                "credential is {} bytes, key allows at most {max_len}",
                plaintext.len()
            )));
        }

        let ciphertext = self
            .public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext.as_bytes())
            .map_err(|e| NordnetError::Encryption(e.to_string()))?;

        Ok(STANDARD.encode(ciphertext))
    }
}

/// One-shot credential encryption; the key is validated before anything is encrypted.
pub fn encrypt_login(username: &str, password: &str, public_key_pem: &str) -> Result<String> {
    LoginEncryptor::from_pem(public_key_pem)?.encrypt(username, password)
}

/// `base64(username):base64(password):base64(timestamp_ms)`
pub fn credential_plaintext(username: &str, password: &str, timestamp_ms: i64) -> String {
    [
        STANDARD.encode(username),
        STANDARD.encode(password),
        STANDARD.encode(timestamp_ms.to_string()),
    ]
    .join(":")
}
