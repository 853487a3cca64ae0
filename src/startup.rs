use actix_web::dev::Server;
use actix_web::http::Method;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CsrfGuard, TokenService};
use crate::configuration::Settings;
use crate::logger::LoggerMiddleware;
use crate::middleware::{AuthMiddleware, PermissionMode};
use crate::rate_limit::RateLimiter;
use crate::routes::{
    create_project, csrf_token, health_check, list_projects, login, logout, me, register,
    request_password_reset,
};
use crate::users::{AuditSink, UserStore};

/// Shared application state: the auth services plus the collaborator
/// interfaces. Built once; every worker clones the same `web::Data` handle,
/// so rate-limit counters are shared across workers.
pub struct AppState {
    pub settings: Settings,
    pub tokens: TokenService,
    pub csrf: CsrfGuard,
    pub limiter: RateLimiter,
    pub users: Arc<dyn UserStore>,
    pub audit: Arc<dyn AuditSink>,
}

pub fn run(
    listener: TcpListener,
    settings: Settings,
    users: Arc<dyn UserStore>,
    audit: Arc<dyn AuditSink>,
) -> Result<Server, std::io::Error> {
    let state = web::Data::new(AppState {
        tokens: TokenService::new(settings.auth.clone()),
        csrf: CsrfGuard::new(settings.csrf.clone()),
        limiter: RateLimiter::new(&settings.rate_limits),
        users,
        audit,
        settings,
    });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(state.clone())
            // Public routes (no session required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/logout", web::post().to(logout))
            .route("/auth/csrf", web::get().to(csrf_token))
            .route("/auth/password-reset", web::post().to(request_password_reset))
            // Protected routes behind the auth middleware
            .service(
                web::scope("/api")
                    .service(
                        web::resource("/me")
                            .wrap(AuthMiddleware::new(state.clone()))
                            .route(web::get().to(me)),
                    )
                    .service(
                        web::resource("/projects")
                            .wrap(
                                AuthMiddleware::new(state.clone())
                                    .require_for(
                                        Method::GET,
                                        PermissionMode::AnyOf,
                                        &["projects.view"],
                                    )
                                    .require_for(
                                        Method::POST,
                                        PermissionMode::AllOf,
                                        &["projects.create"],
                                    ),
                            )
                            .route(web::get().to(list_projects))
                            .route(web::post().to(create_project)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
