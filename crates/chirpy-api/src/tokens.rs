//! Access and refresh tokens.
//!
//! Both classes are HS256 JWTs signed with the same secret. The `iss` claim
//! carries the class, so a refresh token can never pass as an access token
//! (or the other way round) even though the signature checks out.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chirpy_db::models::RevokedToken;
use chirpy_db::{Database, StoreError};

const ACCESS_ISSUER: &str = "chirpy-access";
const REFRESH_ISSUER: &str = "chirpy-refresh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn issuer(self) -> &'static str {
        match self {
            Self::Access => ACCESS_ISSUER,
            Self::Refresh => REFRESH_ISSUER,
        }
    }

    pub fn from_issuer(issuer: &str) -> Option<Self> {
        match issuer {
            ACCESS_ISSUER => Some(Self::Access),
            REFRESH_ISSUER => Some(Self::Refresh),
            _ => None,
        }
    }

    pub fn lifetime(self) -> Duration {
        match self {
            Self::Access => Duration::hours(1),
            Self::Refresh => Duration::days(60),
        }
    }
}

/// Claims as they appear inside the JWT.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Claims of a token that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub kind: TokenKind,
    pub user_id: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing or malformed authorization header")]
    MissingBearer,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token was issued for a different purpose")]
    IssuerInvalid,
    #[error("token has been revoked")]
    Revoked,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, kind: TokenKind, user_id: u64) -> Result<String, TokenError> {
        self.issue_at(kind, user_id, Utc::now())
    }

    pub fn issue_at(
        &self,
        kind: TokenKind,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = WireClaims {
            iss: kind.issuer().to_string(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + kind.lifetime()).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        self.validate_at(token, expected, Utc::now())
    }

    /// Verify signature, then expiry against `now`, then token class.
    pub fn validate_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        // Expiry is checked below against the caller's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let raw = decode::<WireClaims>(token, &self.decoding, &validation)
            .map_err(classify)?
            .claims;

        if raw.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        let kind = match TokenKind::from_issuer(&raw.iss) {
            Some(kind) if kind == expected => kind,
            _ => return Err(TokenError::IssuerInvalid),
        };

        let user_id = raw.sub.parse().map_err(|_| TokenError::Malformed)?;
        let issued_at = DateTime::from_timestamp(raw.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::from_timestamp(raw.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(Claims {
            kind,
            user_id,
            issued_at,
            expires_at,
        })
    }

    pub fn validate_refresh(&self, db: &Database, token: &str) -> Result<Claims, TokenError> {
        self.validate_refresh_at(db, token, Utc::now())
    }

    /// Refresh tokens are checked against the revocation list before anything
    /// else about them is trusted.
    pub fn validate_refresh_at(
        &self,
        db: &Database,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        if db.is_revoked(token)? {
            return Err(TokenError::Revoked);
        }
        self.validate_at(token, TokenKind::Refresh, now)
    }

    /// Revoke a currently valid refresh token.
    pub fn revoke(&self, db: &Database, token: &str) -> Result<RevokedToken, TokenError> {
        self.validate_refresh(db, token)?;
        Ok(db.revoke_token(token)?)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, TokenError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::MissingBearer)
}
