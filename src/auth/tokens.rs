/// Token Service
///
/// Issues and verifies the signed access/refresh token pair. The two kinds
/// are signed with different secrets and carry a `token_type` discriminator;
/// a refresh token can never pass access verification or vice versa. Any
/// verification failure collapses to `None` so callers cannot distinguish
/// forged, malformed, and expired tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

use crate::auth::claims::{Claims, Identity, TokenKind};
use crate::configuration::AuthSettings;
use crate::error::AppError;
use crate::permissions::sanitize_permissions;

/// A freshly minted token pair plus each token's lifetime in seconds.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
}

pub struct TokenService {
    settings: AuthSettings,
}

impl TokenService {
    pub fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }

    /// Mint a fresh access + refresh pair for the given identity.
    ///
    /// Permissions are sanitized against the catalog here, so an
    /// unrecognized permission string never makes it into a signed token.
    ///
    /// # Errors
    /// Returns an error if signing fails (bad key material); this is fatal
    /// for the request, never silently degraded.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        let identity = Identity {
            permissions: sanitize_permissions(&identity.permissions),
            ..identity.clone()
        };

        let access_token = self.sign(&identity, TokenKind::Access)?;
        let refresh_token = self.sign(&identity, TokenKind::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_in: self.settings.access_token_expiry,
            refresh_expires_in: self.settings.refresh_token_expiry,
        })
    }

    fn sign(&self, identity: &Identity, kind: TokenKind) -> Result<String, AppError> {
        let (secret, expiry) = match kind {
            TokenKind::Access => (
                &self.settings.access_secret,
                self.settings.access_token_expiry,
            ),
            TokenKind::Refresh => (
                &self.settings.refresh_secret,
                self.settings.refresh_token_expiry,
            ),
        };

        let claims = Claims::new(
            identity,
            kind,
            expiry,
            self.settings.issuer.clone(),
            self.settings.audience.clone(),
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Verify an access token. `None` on any failure.
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token. `None` on any failure.
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        self.verify(token, TokenKind::Refresh)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let secret = match kind {
            TokenKind::Access => &self.settings.access_secret,
            TokenKind::Refresh => &self.settings.refresh_secret,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_audience(&[&self.settings.audience]);
        // Zero leeway: an expired access token must fail verification the
        // moment it expires, or the refresh path would never engage.
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .ok()?;

        if claims.token_type != kind {
            tracing::warn!(
                expected = %kind,
                "Token kind mismatch during verification"
            );
            return None;
        }

        Some(claims)
    }

    /// Decode claims without verifying the signature. For UX and diagnostics
    /// only; never part of an authorization decision.
    fn inspect(token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Whether the embedded expiry has passed. Undecodable tokens count as
    /// expired.
    pub fn is_expired(token: &str) -> bool {
        match Self::inspect(token) {
            Some(claims) => claims.is_expired(),
            None => true,
        }
    }

    /// Time until the embedded expiry, zero if already past, `None` if the
    /// token does not decode.
    pub fn remaining_lifetime(token: &str) -> Option<Duration> {
        let claims = Self::inspect(token)?;
        let now = chrono::Utc::now().timestamp();
        if claims.exp > now {
            Some(Duration::from_secs((claims.exp - now) as u64))
        } else {
            Some(Duration::ZERO)
        }
    }
}
