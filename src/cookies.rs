/// Cookie Transport
///
/// Encodes the session token pair and a non-secret "is-authenticated" flag
/// into HTTP cookies with a fixed security posture. The cookie names are
/// part of the wire contract.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;

use crate::auth::TokenPair;
use crate::configuration::CookieSettings;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
/// Readable by client-side code so a UI can cheaply ask "is a session
/// present" without being able to read or forge the actual tokens.
pub const LOGGED_IN_COOKIE: &str = "logged_in";
/// Old flag name; only ever cleared, for clients that still carry it.
pub const LEGACY_LOGGED_IN_COOKIE: &str = "authenticated";

fn build_cookie(
    name: &'static str,
    value: String,
    max_age_seconds: i64,
    secure: bool,
    http_only: bool,
) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(http_only)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_seconds))
        .finish()
}

/// Cookies carrying a freshly issued token pair. Each token cookie lives
/// exactly as long as the token inside it.
pub fn auth_cookies(pair: &TokenPair, settings: &CookieSettings) -> Vec<Cookie<'static>> {
    vec![
        build_cookie(
            ACCESS_TOKEN_COOKIE,
            pair.access_token.clone(),
            pair.access_expires_in,
            settings.secure,
            true,
        ),
        build_cookie(
            REFRESH_TOKEN_COOKIE,
            pair.refresh_token.clone(),
            pair.refresh_expires_in,
            settings.secure,
            true,
        ),
        build_cookie(
            LOGGED_IN_COOKIE,
            "true".to_string(),
            pair.refresh_expires_in,
            settings.secure,
            false,
        ),
    ]
}

/// Overwrites every auth cookie (legacy flag included) with an empty value
/// and zero max-age.
pub fn expired_auth_cookies(settings: &CookieSettings) -> Vec<Cookie<'static>> {
    [
        ACCESS_TOKEN_COOKIE,
        REFRESH_TOKEN_COOKIE,
        LOGGED_IN_COOKIE,
        LEGACY_LOGGED_IN_COOKIE,
    ]
    .into_iter()
    .map(|name| {
        build_cookie(
            name,
            String::new(),
            0,
            settings.secure,
            name != LOGGED_IN_COOKIE && name != LEGACY_LOGGED_IN_COOKIE,
        )
    })
    .collect()
}

pub fn access_token_from(req: &HttpRequest) -> Option<String> {
    req.cookie(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string())
}

pub fn refresh_token_from(req: &HttpRequest) -> Option<String> {
    req.cookie(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pair() -> TokenPair {
        TokenPair {
            access_token: "access.jwt".to_string(),
            refresh_token: "refresh.jwt".to_string(),
            access_expires_in: 900,
            refresh_expires_in: 604_800,
        }
    }

    fn settings() -> CookieSettings {
        CookieSettings { secure: true }
    }

    #[test]
    fn token_cookies_are_locked_down() {
        let cookies = auth_cookies(&test_pair(), &settings());
        assert_eq!(cookies.len(), 3);

        for cookie in &cookies {
            assert_eq!(cookie.path(), Some("/"));
            assert_eq!(cookie.secure(), Some(true));
            assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        }

        let access = cookies
            .iter()
            .find(|c| c.name() == ACCESS_TOKEN_COOKIE)
            .unwrap();
        assert_eq!(access.value(), "access.jwt");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(
            access.max_age(),
            Some(CookieDuration::seconds(900))
        );

        let refresh = cookies
            .iter()
            .find(|c| c.name() == REFRESH_TOKEN_COOKIE)
            .unwrap();
        assert_eq!(refresh.http_only(), Some(true));
        assert_eq!(
            refresh.max_age(),
            Some(CookieDuration::seconds(604_800))
        );
    }

    #[test]
    fn logged_in_flag_is_readable_by_scripts() {
        let cookies = auth_cookies(&test_pair(), &settings());
        let flag = cookies
            .iter()
            .find(|c| c.name() == LOGGED_IN_COOKIE)
            .unwrap();
        assert_eq!(flag.value(), "true");
        assert_eq!(flag.http_only(), Some(false));
    }

    #[test]
    fn clearing_covers_the_legacy_flag() {
        let cookies = expired_auth_cookies(&settings());
        assert_eq!(cookies.len(), 4);
        assert!(cookies
            .iter()
            .any(|c| c.name() == LEGACY_LOGGED_IN_COOKIE));

        for cookie in &cookies {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        }
    }

    #[test]
    fn secure_flag_follows_settings() {
        let cookies = auth_cookies(&test_pair(), &CookieSettings { secure: false });
        for cookie in &cookies {
            assert_eq!(cookie.secure(), Some(false));
        }
    }
}
