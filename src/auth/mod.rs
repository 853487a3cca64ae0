/// Authentication module
///
/// Token pair issuance/verification, password hashing and policy,
/// and CSRF token generation/validation.

mod claims;
mod csrf;
mod password;
mod tokens;

pub use claims::Claims;
pub use claims::Identity;
pub use claims::TokenKind;
pub use csrf::CsrfGuard;
pub use csrf::CSRF_HEADER;
pub use password::generate_random_password;
pub use password::hash_password;
pub use password::validate_password;
pub use password::verify_password;
pub use password::PasswordCheck;
pub use tokens::TokenPair;
pub use tokens::TokenService;
