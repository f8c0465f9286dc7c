//! Authentication middleware for JWT token validation
//!
//! Tokens are minted by the identity provider; this service only verifies
//! them and turns the claims into a [`classroom::Actor`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use classroom::{Actor, CoreError};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles
    pub roles: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Approval flag minted for tutors; informational only
    #[serde(default)]
    pub tutor_approved: bool,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// Token verification settings, built once at startup
#[derive(Clone)]
pub struct JwtConfig {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    /// Verify RS256 tokens against a PEM public key
    pub fn rs256(public_key_pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
        Ok(Self::with_key(decoding_key, Algorithm::RS256))
    }

    /// Verify HS256 tokens against a shared secret
    pub fn hs256(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    fn with_key(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        Self {
            decoding_key,
            validation,
        }
    }

    /// Create a JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PUBLIC_KEY`: RS256 public key (PEM format) or path to the key file
    /// - `JWT_SECRET`: HS256 shared secret, used when no public key is set
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(public_key) = env::var("JWT_PUBLIC_KEY") {
            // If the public key looks like a file path, read from file (try CWD, then project root)
            let public_key = if public_key.starts_with("-----BEGIN") {
                public_key
            } else {
                std::fs::read_to_string(&public_key)
                    .or_else(|_| {
                        let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
                        path.push(&public_key);
                        std::fs::read_to_string(path)
                    })
                    .map_err(|e| anyhow::anyhow!("Failed to read public key file: {}", e))?
                    .trim()
                    .to_string()
            };
            return Ok(Self::rs256(&public_key)?);
        }

        let secret = env::var("JWT_SECRET").map_err(|_| {
            anyhow::anyhow!("Either JWT_PUBLIC_KEY or JWT_SECRET environment variable must be set")
        })?;
        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        Ok(Self::hs256(secret.as_bytes()))
    }

    /// Decode and validate a token
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
    }
}

/// Authentication middleware
///
/// Inserts the caller's [`Actor`] into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.jwt.decode(bearer.token()).map_err(|e| {
        warn!("Failed to validate token: {}", e);
        ApiError::Unauthorized
    })?;

    if claims.token_type != TokenType::Access {
        debug!(sub = %claims.sub, "Refresh token presented as access token");
        return Err(ApiError::Unauthorized);
    }

    let actor = Actor::from_roles(claims.sub, claims.roles.as_slice(), claims.tutor_approved)
        .ok_or_else(|| CoreError::PermissionDenied("No recognised role in token".to_string()))?;

    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
