use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::{TokenGenerator, parse_token};
use crate::engine::{Actor, Engine};

#[derive(Debug, PartialEq, Eq)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

/// Extracts a token string from a Basic auth header.
/// Expects format: Basic base64(x-token:actual_token)
pub fn extract_basic_auth_token(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;

    if username != "x-token" {
        return None;
    }

    Some(password.to_string())
}

/// Extracts token from Authorization header (Bearer or Basic).
/// Returns None if no auth header is present.
/// Returns Err if the auth scheme is unsupported.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Result<Option<String>, TokenValidationError> {
    match auth_header {
        Some(header) => {
            if let Some(token) = header.strip_prefix("Bearer ") {
                Ok(Some(token.trim().to_string()))
            } else if header.starts_with("Basic ") {
                extract_basic_auth_token(header)
                    .ok_or(TokenValidationError::InvalidToken)
                    .map(Some)
            } else {
                Err(TokenValidationError::InvalidScheme)
            }
        }
        None => Ok(None),
    }
}

/// Resolves a raw token to the actor it was issued to.
///
/// The lookup runs in a short read transaction that is released before the
/// argon2 check. A failure to record `last_used_at` is logged and ignored.
pub fn validate_token(engine: &Engine, raw_token: &str) -> Result<Actor, TokenValidationError> {
    let parts = parse_token(raw_token).map_err(|_| TokenValidationError::InvalidToken)?;

    let token = {
        let tx = engine
            .store()
            .read()
            .map_err(|_| TokenValidationError::InternalError)?;
        tx.get_token_by_lookup(parts.lookup)
            .map_err(|_| TokenValidationError::InternalError)?
            .ok_or(TokenValidationError::InvalidToken)?
    };

    if !TokenGenerator::new()
        .matches(raw_token, &token.token_hash)
        .map_err(|_| TokenValidationError::InternalError)?
    {
        return Err(TokenValidationError::InvalidToken);
    }

    let now = engine.now();
    if token.expires_at.is_some_and(|expires_at| expires_at < now) {
        return Err(TokenValidationError::TokenExpired);
    }

    let touched = engine.store().begin().and_then(|tx| {
        tx.update_token_last_used(&token.id, now)?;
        tx.commit()
    });
    if let Err(e) = touched {
        tracing::warn!("Failed to update token last_used_at: {e}");
    }

    Ok(Actor::new(token.user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let token = extract_token_from_header(Some("Bearer spotter_abc_def")).unwrap();
        assert_eq!(token.as_deref(), Some("spotter_abc_def"));
    }

    #[test]
    fn test_basic_header_requires_x_token_user() {
        let encoded = STANDARD.encode("x-token:spotter_abc_def");
        let token = extract_token_from_header(Some(&format!("Basic {encoded}"))).unwrap();
        assert_eq!(token.as_deref(), Some("spotter_abc_def"));

        let wrong_user = STANDARD.encode("lena:spotter_abc_def");
        assert_eq!(
            extract_token_from_header(Some(&format!("Basic {wrong_user}"))),
            Err(TokenValidationError::InvalidToken)
        );
    }

    #[test]
    fn test_missing_and_unsupported_headers() {
        assert_eq!(extract_token_from_header(None), Ok(None));
        assert_eq!(
            extract_token_from_header(Some("Digest abc")),
            Err(TokenValidationError::InvalidScheme)
        );
    }
}
