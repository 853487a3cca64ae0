/// Authentication Routes
///
/// Registration, login, logout, CSRF token issuance, password-reset
/// requests, and the current-user echo.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    hash_password, validate_password, verify_password, Claims, Identity,
};
use crate::cookies::{auth_cookies, expired_auth_cookies};
use crate::error::{AppError, AuthError, ValidationError};
use crate::permissions::{permissions_for_role, ROLE_TEAM_MEMBER};
use crate::startup::AppState;
use crate::users::{AuditEvent, NewUser};
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Session info returned alongside the auth cookies. The tokens themselves
/// travel only in HttpOnly cookies, never in the body.
#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[derive(Serialize)]
pub struct CurrentUserResponse {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// POST /auth/register
///
/// Register a new user. Password-policy violations are returned as a full
/// list so the client can show every problem at once.
///
/// # Errors
/// - 400: invalid email/name, or password policy violations
/// - 409: email already registered
pub async fn register(
    req: HttpRequest,
    form: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(&form.name)?;

    let check = validate_password(&form.password, &state.settings.password);
    if !check.valid {
        return Err(AppError::Validation(ValidationError::PasswordPolicy(
            check.errors,
        )));
    }

    let password_hash = hash_password(&form.password, state.settings.password.hash_cost)?;
    let user = state.users.insert(NewUser {
        email,
        name,
        password_hash,
        role: ROLE_TEAM_MEMBER.to_string(),
    })?;

    let identity = Identity {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        permissions: permissions_for_role(&user.role),
    };
    let pair = state.tokens.issue_pair(&identity)?;

    state.audit.record(
        AuditEvent::new("user_registered")
            .with_user(user.id)
            .with_ip(client_ip(&req)),
    );
    tracing::info!(user_id = user.id, "User registered successfully");

    let mut response = HttpResponse::Created();
    for cookie in auth_cookies(&pair, &state.settings.cookies) {
        response.cookie(cookie);
    }
    Ok(response.json(SessionResponse {
        user_id: user.id,
        email: identity.email,
        role: identity.role,
        permissions: identity.permissions,
        expires_in: pair.access_expires_in,
    }))
}

/// POST /auth/login
///
/// Authenticate with email and password; on success the token pair is set
/// as cookies and the login rate-limit counter for this client is cleared.
///
/// # Errors
/// - 400: malformed email
/// - 401: unknown email, wrong password, or inactive account. One message
///   for all three, so responses cannot be used to enumerate users
/// - 429: too many attempts from this client
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ip = client_ip(&req);

    // Rate limit before touching credentials at all.
    let outcome = state.limiter.consume_login(&ip);
    if !outcome.allowed {
        state
            .audit
            .record(AuditEvent::new("login_rate_limited").with_ip(ip));
        return Err(AppError::Auth(AuthError::RateLimited {
            retry_after_ms: outcome.ms_before_next,
        }));
    }

    let email = is_valid_email(&form.email)?;

    let user = state
        .users
        .find_by_email(&email)
        .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    if !user.is_active {
        tracing::warn!(user_id = user.id, "Login attempt on inactive account");
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    if !verify_password(&form.password, &user.password_hash) {
        state.audit.record(
            AuditEvent::new("login_failed")
                .with_user(user.id)
                .with_ip(ip),
        );
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let identity = Identity {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role.clone(),
        permissions: permissions_for_role(&user.role),
    };
    let pair = state.tokens.issue_pair(&identity)?;

    // A legitimate login clears earlier failed attempts from the budget.
    state.limiter.reset_login(&ip);
    state.audit.record(
        AuditEvent::new("login_succeeded")
            .with_user(user.id)
            .with_ip(ip),
    );
    tracing::info!(user_id = user.id, "User logged in successfully");

    let mut response = HttpResponse::Ok();
    for cookie in auth_cookies(&pair, &state.settings.cookies) {
        response.cookie(cookie);
    }
    Ok(response.json(SessionResponse {
        user_id: user.id,
        email: identity.email,
        role: identity.role,
        permissions: identity.permissions,
        expires_in: pair.access_expires_in,
    }))
}

/// POST /auth/logout
///
/// Clears every auth cookie, the legacy flag included. The tokens
/// themselves simply age out; there is no server-side session to destroy.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    state
        .audit
        .record(AuditEvent::new("logout").with_ip(client_ip(&req)));

    let mut response = HttpResponse::Ok();
    for cookie in expired_auth_cookies(&state.settings.cookies) {
        response.cookie(cookie);
    }
    response.json(serde_json::json!({ "message": "Logged out" }))
}

/// GET /auth/csrf
///
/// Issue an anti-forgery token for subsequent state-mutating requests.
pub async fn csrf_token(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let token = state.csrf.generate()?;
    Ok(HttpResponse::Ok().json(CsrfResponse { csrf_token: token }))
}

/// POST /auth/password-reset
///
/// Record a password-reset request. Always answers 202 for a well-formed
/// email whether or not the account exists; delivery is an external
/// collaborator's concern.
///
/// # Errors
/// - 400: malformed email
/// - 429: too many reset requests from this client
pub async fn request_password_reset(
    req: HttpRequest,
    form: web::Json<PasswordResetRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ip = client_ip(&req);

    let outcome = state.limiter.consume_password_reset(&ip);
    if !outcome.allowed {
        return Err(AppError::Auth(AuthError::RateLimited {
            retry_after_ms: outcome.ms_before_next,
        }));
    }

    let email = is_valid_email(&form.email)?;

    let event = match state.users.find_by_email(&email) {
        Some(user) => AuditEvent::new("password_reset_requested")
            .with_user(user.id)
            .with_ip(ip),
        None => AuditEvent::new("password_reset_requested")
            .with_detail("unknown email")
            .with_ip(ip),
    };
    state.audit.record(event);

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "message": "If the account exists, reset instructions have been sent"
    })))
}

/// GET /api/me
///
/// Echo of the verified claims. Runs behind the auth middleware, which
/// injects `Claims` into the request extensions.
pub async fn me(claims: web::ReqData<Claims>) -> HttpResponse {
    HttpResponse::Ok().json(CurrentUserResponse {
        user_id: claims.sub,
        email: claims.email.clone(),
        role: claims.role.clone(),
        permissions: claims.permissions.clone(),
    })
}
