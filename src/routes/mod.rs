mod auth;
mod health_check;
mod projects;

pub use auth::csrf_token;
pub use auth::login;
pub use auth::logout;
pub use auth::me;
pub use auth::register;
pub use auth::request_password_reset;
pub use health_check::health_check;
pub use projects::create_project;
pub use projects::list_projects;
