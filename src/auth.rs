// Bearer token authentication for the privileged `/mcp` path.
// A missing AUTH_TOKEN rejects every request with 500.

use subtle::ConstantTimeEq;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No shared secret has been provisioned.
    #[error("Server not configured with AUTH_TOKEN")]
    Unconfigured,
    /// Wrong, malformed or missing credential.
    #[error("invalid token")]
    Unauthorized,
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unconfigured => GatewayError::Unconfigured,
            AuthError::Unauthorized => GatewayError::Unauthorized,
        }
    }
}

/// Check an `Authorization` header value against `Bearer <secret>`.
pub fn authenticate(header: Option<&str>, secret: Option<&str>) -> Result<(), AuthError> {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => {
            tracing::error!("Auth rejected: AUTH_TOKEN is not configured");
            return Err(AuthError::Unconfigured);
        }
    };

    let Some(header) = header else {
        tracing::warn!("Auth failed: missing Authorization header");
        return Err(AuthError::Unauthorized);
    };

    let expected = format!("Bearer {secret}");
    if bool::from(header.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("Auth failed: invalid token");
        Err(AuthError::Unauthorized)
    }
}
