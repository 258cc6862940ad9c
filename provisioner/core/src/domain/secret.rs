// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provision Secret Derivation
//!
//! Secrets are capability tokens: `hex(HMAC-SHA256(key, identity || key))`.
//! Nothing is stored; every authorized request recomputes the digest from the
//! process-wide [`SecretKey`] and compares it in constant time.
//!
//! The key is injected through [`SecretDeriver::new`] so that every gateway
//! replica can be configured (and tested) with an explicit key. Replicas that
//! disagree on the key reject each other's secrets; [`SecretKey::fingerprint`]
//! is logged at startup to make that visible.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Derive and verify per-identity secrets without a user database

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::identity::Identity;

type HmacSha256 = Hmac<Sha256>;

/// Digest input used when the caller's identity did not parse.
const REJECTED_IDENTITY: &str = "00000000000000000000000000000000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretKeyError {
    #[error("secret key must not be empty")]
    Empty,
}

/// Process-wide derivation key. Never printed.
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretKeyError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SecretKeyError::Empty);
        }
        Ok(Self(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short, non-reversible key fingerprint (first 8 bytes of SHA-256, hex).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// A derived secret as handed to the caller (lowercase hex).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Derives and verifies identity secrets with an injected key.
#[derive(Debug, Clone)]
pub struct SecretDeriver {
    key: SecretKey,
}

impl SecretDeriver {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    pub fn key_fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// Deterministic secret for `identity`.
    pub fn derive(&self, identity: &Identity) -> Secret {
        Secret(hex::encode(self.digest(identity.as_str())))
    }

    /// Constant-time check of a caller-supplied secret.
    ///
    /// Returns `false` for any mismatch, including wrong length or non-hex
    /// input; callers must not branch on why.
    pub fn verify(&self, identity: &Identity, supplied: &str) -> bool {
        let expected = hex::encode(self.digest(identity.as_str()));
        expected.as_bytes().ct_eq(supplied.as_bytes()).into()
    }

    /// Does the work of [`verify`](Self::verify) for a request whose
    /// identity failed to parse, so both rejections take the same time.
    /// Always `false`.
    pub fn verify_rejected(&self, supplied: &str) -> bool {
        let expected = hex::encode(self.digest(REJECTED_IDENTITY));
        std::hint::black_box(expected.as_bytes().ct_eq(supplied.as_bytes()));
        false
    }

    fn digest(&self, identity: &str) -> [u8; 32] {
        // HMAC accepts keys of any length; `SecretKey` rules out the empty key.
        let mut mac = match HmacSha256::new_from_slice(&self.key.0) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
        };
        mac.update(identity.as_bytes());
        mac.update(&self.key.0);
        mac.finalize().into_bytes().into()
    }
}
