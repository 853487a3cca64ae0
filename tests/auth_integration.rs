//! End-to-end tests running the full HTTP stack: real server on a random
//! port, real cookies, real middleware in front of the protected routes.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use taskforge::auth::hash_password;
use taskforge::configuration::{
    ApplicationSettings, AuthSettings, CookieSettings, CsrfSettings, PasswordSettings,
    PolicySettings, RateLimitSettings, Settings,
};
use taskforge::startup::run;
use taskforge::users::{InMemoryUserStore, NewUser, TracingAuditSink, UserStore};

struct TestApp {
    address: String,
    users: Arc<InMemoryUserStore>,
}

impl TestApp {
    /// Put a user into the store directly, bypassing the registration route.
    fn seed_user(&self, email: &str, password: &str, role: &str) {
        self.users
            .insert(NewUser {
                email: email.to_string(),
                name: "Seeded User".to_string(),
                password_hash: hash_password(password, 4).unwrap(),
                role: role.to_string(),
            })
            .unwrap();
    }
}

fn test_settings() -> Settings {
    Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth: AuthSettings {
            access_secret: "test-access-secret-with-enough-length".to_string(),
            refresh_secret: "test-refresh-secret-with-enough-length".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            issuer: "taskforge".to_string(),
            audience: "taskforge-api".to_string(),
        },
        csrf: CsrfSettings {
            secret: "test-csrf-secret".to_string(),
            max_age_ms: 3_600_000,
        },
        // Tests run over plain HTTP.
        cookies: CookieSettings { secure: false },
        rate_limits: RateLimitSettings {
            login: PolicySettings {
                points: 5,
                window_seconds: 60,
                block_seconds: Some(300),
            },
            api: PolicySettings {
                points: 1000,
                window_seconds: 60,
                block_seconds: None,
            },
            password_reset: PolicySettings {
                points: 3,
                window_seconds: 3600,
                block_seconds: None,
            },
        },
        password: PasswordSettings {
            min_length: 8,
            hash_cost: 4,
        },
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(test_settings()).await
}

async fn spawn_app_with(settings: Settings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let users = Arc::new(InMemoryUserStore::new());

    let server = run(
        listener,
        settings,
        users.clone(),
        Arc::new(TracingAuditSink),
    )
    .expect("Failed to start server");
    tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        users,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

fn set_cookie_values(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

async fn login(client: &reqwest::Client, app: &TestApp, email: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/auth/login", app.address))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute login request")
}

async fn fetch_csrf_token(client: &reqwest::Client, app: &TestApp) -> String {
    let body: serde_json::Value = client
        .get(format!("{}/auth/csrf", app.address))
        .send()
        .await
        .expect("Failed to fetch CSRF token")
        .json()
        .await
        .unwrap();
    body["csrf_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = client()
        .get(format!("{}/health_check", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let app = spawn_app().await;

    let response = client()
        .post(format!("{}/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "not-an-email",
            "password": "Str0ngPass!word",
            "name": "New User"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn register_reports_every_password_problem_at_once() {
    let app = spawn_app().await;

    // Too short, no uppercase, no digit, no symbol.
    let response = client()
        .post(format!("{}/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "user@example.com",
            "password": "weak",
            "name": "New User"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PASSWORD_POLICY");
    let details = body["details"].as_array().unwrap();
    assert!(details.len() >= 4, "expected all violations listed: {:?}", details);
}

#[tokio::test]
async fn register_sets_session_cookies() {
    let app = spawn_app().await;

    let response = client()
        .post(format!("{}/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "fresh@example.com",
            "password": "Str0ngPass!word",
            "name": "Fresh User"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let cookies = set_cookie_values(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("logged_in=true")));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["email"], "fresh@example.com");
    assert_eq!(body["role"], "Team Member");
    assert!(body["permissions"].as_array().unwrap().len() > 0);
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let app = spawn_app().await;
    app.seed_user("taken@example.com", "Str0ngPass!word", "Team Member");

    let response = client()
        .post(format!("{}/auth/register", app.address))
        .json(&serde_json::json!({
            "email": "TAKEN@example.com",
            "password": "Str0ngPass!word",
            "name": "Copy Cat"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn login_succeeds_and_session_reaches_protected_route() {
    let app = spawn_app().await;
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    let response = login(&client, &app, "member@example.com", "Str0ngPass!word").await;
    assert_eq!(response.status(), 200);
    let cookies = set_cookie_values(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));

    let me = client
        .get(format!("{}/api/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 200);
    let body: serde_json::Value = me.json().await.unwrap();
    assert_eq!(body["email"], "member@example.com");
    assert_eq!(body["role"], "Team Member");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_identical() {
    let app = spawn_app().await;
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    let wrong_password = login(&client, &app, "member@example.com", "WrongPass!1").await;
    let unknown_email = login(&client, &app, "ghost@example.com", "WrongPass!1").await;

    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown_email.status(), 401);

    let a: serde_json::Value = wrong_password.json().await.unwrap();
    let b: serde_json::Value = unknown_email.json().await.unwrap();
    assert_eq!(a["code"], "INVALID_CREDENTIALS");
    assert_eq!(a["code"], b["code"]);
    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let app = spawn_app().await;

    let response = client()
        .get(format!("{}/api/me", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_AUTHENTICATED");
}

#[tokio::test]
async fn expired_access_token_is_rotated_silently() {
    let mut settings = test_settings();
    settings.auth.access_token_expiry = 1;
    let app = spawn_app_with(settings).await;
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    let response = login(&client, &app, "member@example.com", "Str0ngPass!word").await;
    assert_eq!(response.status(), 200);

    // Let the access token expire while the refresh token stays valid.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let me = client
        .get(format!("{}/api/me", app.address))
        .send()
        .await
        .unwrap();

    // The request succeeds and the response carries a freshly minted pair.
    assert_eq!(me.status(), 200);
    let cookies = set_cookie_values(&me);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));

    let body: serde_json::Value = me.json().await.unwrap();
    assert_eq!(body["email"], "member@example.com");

    // The rotated cookies work on their own for the next request.
    let again = client
        .get(format!("{}/api/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 200);
}

#[tokio::test]
async fn repeated_failed_logins_are_rate_limited() {
    let app = spawn_app().await;
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    for _ in 0..5 {
        let response = login(&client, &app, "member@example.com", "WrongPass!1").await;
        assert_eq!(response.status(), 401);
    }

    let sixth = login(&client, &app, "member@example.com", "WrongPass!1").await;
    assert_eq!(sixth.status(), 429);

    let retry_after: u64 = sixth
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .expect("429 must carry Retry-After")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    let body: serde_json::Value = sixth.json().await.unwrap();
    assert_eq!(body["code"], "RATE_LIMITED");

    // Even the right password is refused while the client is blocked.
    let blocked = login(&client, &app, "member@example.com", "Str0ngPass!word").await;
    assert_eq!(blocked.status(), 429);
}

#[tokio::test]
async fn mutating_request_without_csrf_token_is_rejected() {
    let app = spawn_app().await;
    app.seed_user("pm@example.com", "Str0ngPass!word", "Project Manager");
    let client = client();

    login(&client, &app, "pm@example.com", "Str0ngPass!word").await;

    let response = client
        .post(format!("{}/api/projects", app.address))
        .json(&serde_json::json!({ "name": "Apollo" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CSRF_REJECTED");
}

#[tokio::test]
async fn mutating_request_with_valid_csrf_token_succeeds() {
    let app = spawn_app().await;
    app.seed_user("pm@example.com", "Str0ngPass!word", "Project Manager");
    let client = client();

    login(&client, &app, "pm@example.com", "Str0ngPass!word").await;
    let csrf = fetch_csrf_token(&client, &app).await;

    let response = client
        .post(format!("{}/api/projects", app.address))
        .header("x-csrf-token", csrf)
        .json(&serde_json::json!({ "name": "Apollo" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Apollo");
}

#[tokio::test]
async fn tampered_csrf_token_is_rejected() {
    let app = spawn_app().await;
    app.seed_user("pm@example.com", "Str0ngPass!word", "Project Manager");
    let client = client();

    login(&client, &app, "pm@example.com", "Str0ngPass!word").await;

    let response = client
        .post(format!("{}/api/projects", app.address))
        .header("x-csrf-token", "bm90LWEtcmVhbC10b2tlbg")
        .json(&serde_json::json!({ "name": "Apollo" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CSRF_REJECTED");
}

#[tokio::test]
async fn missing_permission_is_denied_not_unauthenticated() {
    let app = spawn_app().await;
    // Team Member can view projects but not create them.
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    login(&client, &app, "member@example.com", "Str0ngPass!word").await;

    let list = client
        .get(format!("{}/api/projects", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(list.status(), 200);

    let csrf = fetch_csrf_token(&client, &app).await;
    let create = client
        .post(format!("{}/api/projects", app.address))
        .header("x-csrf-token", csrf)
        .json(&serde_json::json!({ "name": "Apollo" }))
        .send()
        .await
        .unwrap();

    assert_eq!(create.status(), 403);
    let body: serde_json::Value = create.json().await.unwrap();
    assert_eq!(body["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn logout_clears_every_auth_cookie() {
    let app = spawn_app().await;
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    login(&client, &app, "member@example.com", "Str0ngPass!word").await;

    let response = client
        .post(format!("{}/auth/logout", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let cleared = set_cookie_values(&response);
    for name in ["access_token", "refresh_token", "logged_in", "authenticated"] {
        let cookie = cleared
            .iter()
            .find(|c| c.starts_with(&format!("{}=", name)))
            .unwrap_or_else(|| panic!("missing clearing cookie for {}", name));
        assert!(cookie.contains("Max-Age=0"), "not expired: {}", cookie);
    }

    // The browser-side session is gone; protected routes refuse the request.
    let me = client
        .get(format!("{}/api/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 401);
}

#[tokio::test]
async fn password_reset_does_not_reveal_account_existence() {
    let app = spawn_app().await;
    app.seed_user("member@example.com", "Str0ngPass!word", "Team Member");
    let client = client();

    let known = client
        .post(format!("{}/auth/password-reset", app.address))
        .json(&serde_json::json!({ "email": "member@example.com" }))
        .send()
        .await
        .unwrap();
    let unknown = client
        .post(format!("{}/auth/password-reset", app.address))
        .json(&serde_json::json!({ "email": "ghost@example.com" }))
        .send()
        .await
        .unwrap();

    assert_eq!(known.status(), 202);
    assert_eq!(unknown.status(), 202);

    // The third request exhausts the budget; the fourth is refused.
    client
        .post(format!("{}/auth/password-reset", app.address))
        .json(&serde_json::json!({ "email": "member@example.com" }))
        .send()
        .await
        .unwrap();
    let fourth = client
        .post(format!("{}/auth/password-reset", app.address))
        .json(&serde_json::json!({ "email": "member@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(fourth.status(), 429);
}
