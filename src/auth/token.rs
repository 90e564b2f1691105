//! Access tokens for lifters and admins.
//!
//! A token reads `spotter_<lookup>_<secret>`. The lookup is stored in clear
//! and indexed so a request resolves to a single row; the whole token is
//! stored only as an argon2id PHC hash.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::{Error, Result};

const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const TOKEN_PREFIX: &str = "spotter";
const LOOKUP_LENGTH: usize = 8;
const SECRET_BYTES: usize = 12;
const SECRET_LENGTH: usize = SECRET_BYTES * 2;

/// A freshly minted token. `raw` is shown to the user once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub lookup: String,
    pub hash: String,
}

/// The two halves of a well-formed raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    pub lookup: &'a str,
    pub secret: &'a str,
}

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn issue(&self) -> Result<IssuedToken> {
        let lookup = random_lookup();
        let raw = format!("{TOKEN_PREFIX}_{lookup}_{}", random_secret());
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))?
            .to_string();

        Ok(IssuedToken { raw, lookup, hash })
    }

    /// `Ok(false)` when the token does not match; `Err` only for a corrupt hash.
    pub fn matches(&self, raw: &str, stored_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| Error::Config(format!("stored token hash is malformed: {e}")))?;

        match self.argon2.verify_password(raw.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }
}

fn random_lookup() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..LOOKUP_LENGTH].to_string()
}

fn random_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

pub fn parse_token(raw: &str) -> Result<TokenParts<'_>> {
    let rest = raw
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;
    let well_formed = lookup.len() == LOOKUP_LENGTH
        && secret.len() == SECRET_LENGTH
        && secret.bytes().all(|b| b.is_ascii_hexdigit());
    if !well_formed {
        return Err(Error::InvalidTokenFormat);
    }

    Ok(TokenParts { lookup, secret })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_parses_back_to_its_lookup() {
        let issued = TokenGenerator::new().issue().unwrap();

        assert!(issued.raw.starts_with("spotter_"));
        let parts = parse_token(&issued.raw).unwrap();
        assert_eq!(parts.lookup, issued.lookup);
        assert_eq!(parts.secret.len(), 24);
    }

    #[test]
    fn test_hash_matches_only_its_token() {
        let generator = TokenGenerator::new();
        let issued = generator.issue().unwrap();
        let other = generator.issue().unwrap();

        assert!(issued.hash.starts_with("$argon2id$"));
        assert!(generator.matches(&issued.raw, &issued.hash).unwrap());
        assert!(!generator.matches(&other.raw, &issued.hash).unwrap());
    }

    #[test]
    fn test_corrupt_hash_is_an_error() {
        let generator = TokenGenerator::new();
        assert!(generator.matches("spotter_x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_parse_token_rejects_malformed() {
        for raw in [
            "other_1a2b3c4d_0123456789abcdef01234567",
            "spotter_1a2b3c4d",
            "spotter_1a2b3c4d_0123456789abcdef01234567_x",
            "spotter1a2b3c4d_0123456789abcdef01234567",
            "spotter_1a2b3c4d_0123456789abcdef0123456z",
            "spotter_1a2b3c_0123456789abcdef01234567",
        ] {
            assert!(parse_token(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_parse_token_valid() {
        let parts = parse_token("spotter_1a2b3c4d_0123456789abcdef01234567").unwrap();
        assert_eq!(
            parts,
            TokenParts {
                lookup: "1a2b3c4d",
                secret: "0123456789abcdef01234567",
            }
        );
    }
}
