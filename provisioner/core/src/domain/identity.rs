// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provision Identity Domain Type
//!
//! An [`Identity`] names a provisioning subject (a router or VPN client). The
//! same string becomes the certificate common name, the profile file name and
//! the argument handed to the CA tooling, so it is validated once at the
//! boundary and carried as a newtype from then on.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Rejects malformed identities before any side effect occurs

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum identity length in characters.
pub const MAX_IDENTITY_LEN: usize = 32;

/// File extension used for rendered client profiles.
pub const PROFILE_EXTENSION: &str = "ovpn";

/// Identity validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity must not be empty")]
    Empty,

    #[error("identity is {len} characters long, maximum is {max}", max = MAX_IDENTITY_LEN)]
    TooLong { len: usize },

    #[error("identity contains illegal character {ch:?} at position {position}; only A-Z, a-z and 0-9 are allowed")]
    IllegalCharacter { ch: char, position: usize },
}

/// A validated provision identity.
///
/// # Guarantees
/// - 1 to 32 characters
/// - Only ASCII letters and digits, so no separators, dots, whitespace or
///   shell metacharacters can reach a file path or a subprocess argument
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Validate a raw identity string.
    ///
    /// # Examples
    /// ```
    /// use provisioner_core::domain::identity::Identity;
    ///
    /// assert!(Identity::parse("client1").is_ok());
    /// assert!(Identity::parse("../etc/passwd").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }

        let len = raw.chars().count();
        if len > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong { len });
        }

        if let Some((position, ch)) = raw
            .chars()
            .enumerate()
            .find(|(_, ch)| !ch.is_ascii_alphanumeric())
        {
            tracing::debug!(position, "Rejected identity with illegal character");
            return Err(IdentityError::IllegalCharacter { ch, position });
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the rendered profile for this identity (`<identity>.ovpn`).
    pub fn profile_file_name(&self) -> String {
        format!("{}.{}", self.0, PROFILE_EXTENSION)
    }

    /// Recover an identity from a profile file name, if the name is one.
    pub fn from_profile_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", PROFILE_EXTENSION))?;
        Self::parse(stem).ok()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Identity {
    type Error = IdentityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Stored records are re-validated on the way in.
impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Identity::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_alphanumeric() {
        let longest = "x".repeat(MAX_IDENTITY_LEN);
        for raw in ["a", "client1", "RouterA", "0", longest.as_str()] {
            let identity = Identity::parse(raw).unwrap();
            assert_eq!(identity.as_str(), raw);
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Identity::parse(""), Err(IdentityError::Empty));
    }

    #[test]
    fn test_rejects_too_long() {
        let raw = "a".repeat(MAX_IDENTITY_LEN + 1);
        assert_eq!(
            Identity::parse(&raw),
            Err(IdentityError::TooLong { len: MAX_IDENTITY_LEN + 1 })
        );
    }

    #[test]
    fn test_rejects_separators_and_metacharacters() {
        for raw in [
            "bad name!",
            "../etc",
            "a/b",
            "a\\b",
            "client.1",
            "client-1",
            "client_1",
            "a;rm -rf",
            "$(id)",
            "a\0b",
            " client",
        ] {
            assert!(
                matches!(Identity::parse(raw), Err(IdentityError::IllegalCharacter { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_non_ascii_letters() {
        let err = Identity::parse("clïent").unwrap_err();
        assert_eq!(err, IdentityError::IllegalCharacter { ch: 'ï', position: 2 });
    }

    #[test]
    fn test_length_counts_characters() {
        // multibyte input fails on the character class, not on byte length
        let raw = "é".repeat(20);
        assert!(matches!(
            Identity::parse(&raw),
            Err(IdentityError::IllegalCharacter { position: 0, .. })
        ));
    }

    #[test]
    fn test_profile_file_name_roundtrip() {
        let identity = Identity::parse("client1").unwrap();
        assert_eq!(identity.profile_file_name(), "client1.ovpn");
        assert_eq!(Identity::from_profile_file_name("client1.ovpn"), Some(identity));
        assert_eq!(Identity::from_profile_file_name("client1.conf"), None);
        assert_eq!(Identity::from_profile_file_name("bad name.ovpn"), None);
    }

    #[test]
    fn test_deserialize_revalidates() {
        let ok: Identity = serde_json::from_str("\"routerA\"").unwrap();
        assert_eq!(ok.as_str(), "routerA");
        assert!(serde_json::from_str::<Identity>("\"../x\"").is_err());
    }
}
