/// Auth Middleware
///
/// The single enforcement point in front of every protected operation:
/// rate limit, CSRF check for mutating verbs, cookie authentication with
/// silent token rotation, then role/permission authorization. Handlers
/// behind it receive verified `Claims` from the request extensions and
/// never see an unauthenticated request.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::Method,
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::rc::Rc;

use crate::auth::{Claims, TokenPair, CSRF_HEADER};
use crate::cookies::{access_token_from, auth_cookies, refresh_token_from};
use crate::error::{AppError, AuthError};
use crate::permissions::{has_all, has_any};
use crate::startup::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    AnyOf,
    AllOf,
}

#[derive(Debug, Clone)]
pub struct PermissionRequirement {
    pub mode: PermissionMode,
    pub permissions: Vec<String>,
}

impl PermissionRequirement {
    fn satisfied_by(&self, claims: &Claims) -> bool {
        match self.mode {
            PermissionMode::AnyOf => has_any(claims, &self.permissions),
            PermissionMode::AllOf => has_all(claims, &self.permissions),
        }
    }
}

/// Outcome of the authentication step. Rotation is an explicit state, not a
/// fallback control path: either the access token verifies, or a valid
/// refresh token mints a new pair, or the request is unauthenticated.
enum Authentication {
    ValidAccess(Claims),
    Rotated { claims: Claims, pair: TokenPair },
    Unauthenticated,
}

/// Middleware guarding protected routes.
///
/// Permissions can be declared for all verbs (`require`) or per verb
/// (`require_for`); routes without a declared requirement only need a valid
/// session.
pub struct AuthMiddleware {
    state: web::Data<AppState>,
    default_requirement: Option<PermissionRequirement>,
    per_method: HashMap<Method, PermissionRequirement>,
}

impl AuthMiddleware {
    pub fn new(state: web::Data<AppState>) -> Self {
        Self {
            state,
            default_requirement: None,
            per_method: HashMap::new(),
        }
    }

    pub fn require(mut self, mode: PermissionMode, permissions: &[&str]) -> Self {
        self.default_requirement = Some(PermissionRequirement {
            mode,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    pub fn require_for(mut self, method: Method, mode: PermissionMode, permissions: &[&str]) -> Self {
        self.per_method.insert(
            method,
            PermissionRequirement {
                mode,
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        );
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            state: self.state.clone(),
            default_requirement: self.default_requirement.clone(),
            per_method: Rc::new(self.per_method.clone()),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    state: web::Data<AppState>,
    default_requirement: Option<PermissionRequirement>,
    per_method: Rc<HashMap<Method, PermissionRequirement>>,
}

impl<S> AuthMiddlewareService<S> {
    fn requirement_for(&self, method: &Method) -> Option<&PermissionRequirement> {
        self.per_method
            .get(method)
            .or(self.default_requirement.as_ref())
    }
}

fn is_mutating(method: &Method) -> bool {
    !matches!(method.as_str(), "GET" | "HEAD" | "OPTIONS" | "TRACE")
}

fn reject<B>(
    error: AppError,
    reason: &'static str,
) -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>> {
    use actix_web::ResponseError;
    let response = error.error_response();
    Box::pin(async move { Err(InternalError::from_response(reason, response).into()) })
}

fn authenticate(req: &ServiceRequest, state: &AppState) -> Authentication {
    // The access token settles it when it verifies; expiry and forgery look
    // identical here and both fall through to the refresh path.
    if let Some(token) = access_token_from(req.request()) {
        if let Some(claims) = state.tokens.verify_access(&token) {
            return Authentication::ValidAccess(claims);
        }
    }

    if let Some(token) = refresh_token_from(req.request()) {
        if let Some(refresh_claims) = state.tokens.verify_refresh(&token) {
            match state.tokens.issue_pair(&refresh_claims.identity()) {
                Ok(pair) => {
                    if let Some(claims) = state.tokens.verify_access(&pair.access_token) {
                        tracing::info!(
                            user_id = claims.sub,
                            "Access token rotated from refresh token"
                        );
                        return Authentication::Rotated { claims, pair };
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Token rotation failed");
                }
            }
        }
    }

    Authentication::Unauthenticated
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let state = self.state.clone();

        // 1. Rate limit, general api policy keyed by client IP.
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let outcome = state.limiter.consume_api(&client_ip);
        if !outcome.allowed {
            return reject(
                AppError::Auth(AuthError::RateLimited {
                    retry_after_ms: outcome.ms_before_next,
                }),
                "Rate limited",
            );
        }

        // 2. CSRF defense, state-mutating verbs only.
        if is_mutating(req.method()) {
            let valid = req
                .headers()
                .get(CSRF_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(|token| state.csrf.validate(token))
                .unwrap_or(false);
            if !valid {
                tracing::warn!(
                    path = req.path(),
                    ip = %client_ip,
                    "Mutating request without valid CSRF token"
                );
                return reject(AppError::Auth(AuthError::CsrfRejected), "CSRF rejected");
            }
        }

        // 3. Authenticate, rotating if only the refresh token is valid.
        let (claims, rotated) = match authenticate(&req, &state) {
            Authentication::ValidAccess(claims) => (claims, None),
            Authentication::Rotated { claims, pair } => (claims, Some(pair)),
            Authentication::Unauthenticated => {
                return reject(
                    AppError::Auth(AuthError::NotAuthenticated),
                    "Not authenticated",
                );
            }
        };

        // 4. Authorize against the declared requirement, if any.
        if let Some(requirement) = self.requirement_for(req.method()) {
            if !requirement.satisfied_by(&claims) {
                tracing::warn!(
                    user_id = claims.sub,
                    role = %claims.role,
                    required = ?requirement.permissions,
                    path = req.path(),
                    "Permission denied"
                );
                return reject(
                    AppError::Auth(AuthError::PermissionDenied),
                    "Permission denied",
                );
            }
        }

        tracing::debug!(
            user_id = claims.sub,
            email = %claims.email,
            role = %claims.role,
            "Request authenticated"
        );

        // 5. Run the handler; 6. attach rotated cookies to its response.
        req.extensions_mut().insert(claims);
        let service = self.service.clone();
        let cookie_settings = state.settings.cookies.clone();
        Box::pin(async move {
            let mut response = service.call(req).await?;
            if let Some(pair) = rotated {
                for cookie in auth_cookies(&pair, &cookie_settings) {
                    response
                        .response_mut()
                        .add_cookie(&cookie)
                        .map_err(actix_web::error::ErrorInternalServerError)?;
                }
            }
            Ok(response)
        })
    }
}
