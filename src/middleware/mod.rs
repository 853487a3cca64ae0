/// Middleware module
///
/// Request guards for authentication, authorization and abuse control.

mod auth;

pub use auth::AuthMiddleware;
pub use auth::PermissionMode;
pub use auth::PermissionRequirement;
