/// CSRF Guard
///
/// Stateless anti-forgery tokens, independent of the session tokens: an
/// opaque id plus an issuance timestamp, HMAC-SHA256 signed and transported
/// as a single base64 string. Validation recomputes the MAC with a
/// constant-time comparison and enforces a maximum age. Nothing is ever
/// persisted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::configuration::CsrfSettings;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Request header carrying the CSRF token (case-insensitive on the wire).
pub const CSRF_HEADER: &str = "x-csrf-token";

pub struct CsrfGuard {
    secret: String,
    max_age_ms: u64,
}

impl CsrfGuard {
    pub fn new(settings: CsrfSettings) -> Self {
        Self {
            secret: settings.secret,
            max_age_ms: settings.max_age_ms,
        }
    }

    fn mac_for(&self, payload: &str) -> Result<Vec<u8>, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("CSRF key setup failed: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Generate a new anti-forgery token.
    pub fn generate(&self) -> Result<String, AppError> {
        let opaque_id = uuid::Uuid::new_v4().simple().to_string();
        let issued_at = chrono::Utc::now().timestamp_millis();

        let payload = format!("{}:{}", opaque_id, issued_at);
        let signature = URL_SAFE_NO_PAD.encode(self.mac_for(&payload)?);

        Ok(URL_SAFE_NO_PAD.encode(format!("{}:{}", payload, signature)))
    }

    /// Validate a token against the configured maximum age.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_with_max_age(token, self.max_age_ms)
    }

    /// Validate a token against an explicit maximum age in milliseconds.
    /// Any decode failure, missing field, stale timestamp, or signature
    /// mismatch yields `false`.
    pub fn validate_with_max_age(&self, token: &str, max_age_ms: u64) -> bool {
        let decoded = match URL_SAFE_NO_PAD.decode(token) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let decoded = match String::from_utf8(decoded) {
            Ok(s) => s,
            Err(_) => return false,
        };

        let mut parts = decoded.splitn(3, ':');
        let (opaque_id, issued_at, signature) =
            match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(ts), Some(sig)) => (id, ts, sig),
                _ => return false,
            };

        let issued_at_ms: i64 = match issued_at.parse() {
            Ok(ts) => ts,
            Err(_) => return false,
        };

        let age_ms = chrono::Utc::now().timestamp_millis() - issued_at_ms;
        if age_ms < 0 || age_ms >= max_age_ms as i64 {
            return false;
        }

        let signature_bytes = match URL_SAFE_NO_PAD.decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let payload = format!("{}:{}", opaque_id, issued_at_ms);
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(payload.as_bytes());
        // Constant-time comparison; no partial-match timing signal.
        mac.verify_slice(&signature_bytes).is_ok()
    }
}
