// Integration test for the full login -> callback -> profile -> logout flow over HTTP
use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use sealgate::handlers::configure_services;
use sealgate::session::NONCE_COOKIE;
use sealgate::testing::mock::{MockClientFactory, MockIdpClient};
use sealgate::testing::TestFixtures;
use sealgate::Handshake;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

fn cookie_from<B>(resp: &actix_web::dev::ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .filter(|c| c.name() == name)
        .last()
        .map(Cookie::into_owned)
}

fn query_param(location: &str, name: &str) -> Option<String> {
    Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[actix_web::test]
async fn test_full_login_flow() {
    let (handshake, factory) = TestFixtures::handshake_with(|settings| {
        settings.scope = "openid profile".to_string();
        settings.audience = Some("https://api.example.com".to_string());
    });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(handshake))
            .configure(configure_services),
    )
    .await;

    // Login: redirect to the provider with a nonce matching the cookie
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/login").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("login should redirect")
        .to_string();
    assert!(location.contains("scope=openid%20profile"));
    assert!(location.contains("audience=https%3A%2F%2Fapi.example.com"));

    let nonce_cookie = cookie_from(&resp, NONCE_COOKIE).expect("nonce cookie should be set");
    assert_eq!(
        query_param(&location, "nonce").as_deref(),
        Some(nonce_cookie.value())
    );

    // Callback: nonce consumed, session cookie written
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/callback?code=auth-code&state=opaque")
            .cookie(nonce_cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "https://app.example.com/"
    );
    assert_eq!(
        factory.client().last_nonce().as_deref(),
        Some(nonce_cookie.value())
    );

    let cleared_nonce = cookie_from(&resp, NONCE_COOKIE).expect("nonce cookie should be cleared");
    assert!(cleared_nonce.max_age().unwrap().is_negative());
    let session_cookie = cookie_from(&resp, "a0:session").expect("session cookie should be set");
    assert_eq!(session_cookie.http_only(), Some(true));

    // Profile: user claims without reserved claims
    let user: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/me")
            .cookie(session_cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(user["sub"], "auth0|123");
    assert_eq!(user["email"], "test@example.com");
    assert!(user.get("nonce").is_none());
    assert!(user.get("iss").is_none());

    let status: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/status")
            .cookie(session_cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(status["authenticated"], true);

    // Replaying the callback with the consumed (cleared) nonce fails
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/callback?code=auth-code")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(factory.client().exchange_count(), 1);

    // Logout: both cookies cleared, provider logout URL returned
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/logout")
            .cookie(session_cookie)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("https://tenant.example.com/v2/logout?"));
    assert!(location.contains("returnTo=https%3A%2F%2Fapp.example.com%2Fgoodbye"));
    for name in ["a0:state", "a0:session"] {
        let cookie = cookie_from(&resp, name).expect("cookie should be cleared");
        assert!(cookie.max_age().unwrap().is_negative(), "{name} not cleared");
    }

    assert_eq!(factory.creations(), 1, "client should be created once");
}

#[actix_web::test]
async fn test_failed_exchange_still_clears_nonce() {
    let factory = Arc::new(MockClientFactory::with_client(MockIdpClient::failing()));
    let handshake = Handshake::with_client_factory(TestFixtures::settings(), factory.clone())
        .expect("valid settings");
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(handshake))
            .configure(configure_services),
    )
    .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/callback?code=abc")
            .cookie(Cookie::new(NONCE_COOKIE, "n1"))
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let nonce = cookie_from(&resp, NONCE_COOKIE).expect("nonce cookie should be cleared");
    assert!(nonce.max_age().unwrap().is_negative());
    assert!(cookie_from(&resp, "a0:session").is_none());
}

#[actix_web::test]
async fn test_production_cookies_are_secure() {
    let (handshake, _) = TestFixtures::handshake_with(|settings| {
        settings.environment = sealgate::settings::Environment::Production;
    });
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(handshake))
            .configure(configure_services),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/login").to_request()).await;
    let nonce = cookie_from(&resp, NONCE_COOKIE).expect("nonce cookie should be set");
    assert_eq!(nonce.secure(), Some(true));
    assert_eq!(nonce.http_only(), Some(true));
}
