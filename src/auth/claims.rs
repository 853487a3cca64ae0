/// Token claims
///
/// Payload shared by access and refresh tokens: identity, role and
/// permissions plus the standard JWT claims (RFC 7519). The `token_type`
/// discriminator is what prevents one token kind from being accepted where
/// the other is required.

use serde::{Deserialize, Serialize};

/// Discriminator between the two token kinds of a session.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Identity snapshot used to mint a token pair. Built from the user store at
/// login, or from verified refresh-token claims at rotation; never looked up
/// again while a token lives.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
}

/// Claims carried by both token kinds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i64,
    /// User email
    pub email: String,
    /// Role name
    pub role: String,
    /// Fine-grained permission strings granted via the role
    pub permissions: Vec<String>,
    /// Which of the two token kinds this is
    pub token_type: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

impl Claims {
    pub fn new(
        identity: &Identity,
        kind: TokenKind,
        expiry_seconds: i64,
        issuer: String,
        audience: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: identity.user_id,
            email: identity.email.clone(),
            role: identity.role.clone(),
            permissions: identity.permissions.clone(),
            token_type: kind,
            iat: now,
            exp: now + expiry_seconds,
            iss: issuer,
            aud: audience,
        }
    }

    /// Check if the embedded expiry has passed. Diagnostics only; the
    /// authoritative check happens during signature verification.
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            email: self.email.clone(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
        }
    }
}
