// HTTP handlers mapping routes onto the handshake
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::handshake::{Handshake, HandshakeError, LoginOptions, LogoutOptions, ServerOption};
use crate::session::{use_session, ResponseCookies, SessionHookOptions};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// 302 to `location` carrying the collected cookies
fn redirect(location: &str, cookies: ResponseCookies) -> HttpResponse {
    let mut builder = HttpResponse::Found();
    builder.insert_header((header::LOCATION, location));
    cookies.apply(&mut builder);
    builder.finish()
}

/// Attach collected cookies to an already built response
fn with_cookies(mut response: HttpResponse, cookies: ResponseCookies) -> HttpResponse {
    for cookie in cookies.into_cookies() {
        if let Err(e) = response.add_cookie(&cookie) {
            warn!("Failed to add cookie '{}' to response: {e}", cookie.name());
        }
    }
    response
}

fn query_map(req: &HttpRequest) -> BTreeMap<String, String> {
    web::Query::<BTreeMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default()
}

/// `GET /api/login` - query parameters become login overrides
///
/// # Errors
///
/// Returns a [`HandshakeError`] if the provider client is unavailable
pub async fn login(
    req: HttpRequest,
    handshake: web::Data<Handshake>,
) -> Result<HttpResponse, HandshakeError> {
    let options = LoginOptions::from_params(query_map(&req));
    let mut cookies = handshake.response_cookies();
    let outcome = handshake
        .login(ServerOption::response_only(&mut cookies), options)
        .await?;

    Ok(redirect(&outcome.url, cookies))
}

/// `GET /api/callback` - the nonce cookie is cleared on failure too
///
/// # Errors
///
/// Never; handshake failures are rendered as error responses carrying the nonce deletion
pub async fn callback(
    req: HttpRequest,
    handshake: web::Data<Handshake>,
) -> Result<HttpResponse, HandshakeError> {
    let mut cookies = handshake.response_cookies();
    let result = handshake
        .callback(ServerOption::new(&req, &mut cookies))
        .await;

    match result {
        Ok(outcome) => Ok(redirect(&outcome.redirect_to, cookies)),
        Err(e) => {
            warn!("Callback failed: {e}");
            Ok(with_cookies(e.error_response(), cookies))
        }
    }
}

/// `GET /api/logout[?returnTo=...]`
///
/// # Errors
///
/// Returns a [`HandshakeError`] if the logout URL cannot be built
pub async fn logout(
    req: HttpRequest,
    handshake: web::Data<Handshake>,
) -> Result<HttpResponse, HandshakeError> {
    let options = web::Query::<LogoutOptions>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();
    let mut cookies = handshake.response_cookies();
    let outcome = handshake.logout(ServerOption::response_only(&mut cookies), options)?;

    Ok(redirect(&outcome.url, cookies))
}

/// `GET /api/me` - the user's claims, 401 when not logged in
///
/// # Errors
///
/// Returns [`HandshakeError::Authentication`] without a valid session
pub async fn me(
    req: HttpRequest,
    handshake: web::Data<Handshake>,
) -> Result<HttpResponse, HandshakeError> {
    let user = handshake.profile(ServerOption::request_only(&req))?;
    Ok(HttpResponse::Ok().json(user))
}

/// `GET /api/session` - the session or `null`
///
/// # Errors
///
/// Never in practice; the request part is always supplied
pub async fn current_session(
    req: HttpRequest,
    handshake: web::Data<Handshake>,
) -> Result<HttpResponse, HandshakeError> {
    let session = handshake.session(ServerOption::request_only(&req))?;
    Ok(HttpResponse::Ok().json(session))
}

/// `GET /api/status` - `{authenticated, session}` via the authenticated-read hook
///
/// # Errors
///
/// Returns [`HandshakeError::Configuration`] if the cookie settings are unusable
pub async fn status(
    req: HttpRequest,
    handshake: web::Data<Handshake>,
) -> Result<HttpResponse, HandshakeError> {
    let cookie = &handshake.settings().cookie;
    let options = SessionHookOptions::new(cookie.secret.clone()).with_cookie_name(cookie.name.clone());

    let status = use_session(&req, &options)?;
    Ok(HttpResponse::Ok().json(status))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        message: format!("sealgate {} is running", crate::VERSION),
    })
}

pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::get().to(login))
        .route("/api/callback", web::get().to(callback))
        .route("/api/logout", web::get().to(logout))
        .route("/api/me", web::get().to(me))
        .route("/api/session", web::get().to(current_session))
        .route("/api/status", web::get().to(status))
        .route("/ping", web::get().to(health));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NONCE_COOKIE;
    use crate::testing::TestFixtures;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    macro_rules! app {
        ($handshake:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($handshake))
                    .configure(configure_services),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_login_redirects_with_nonce_cookie() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let req = test::TestRequest::get()
            .uri("/api/login?prompt=login")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://tenant.example.com/authorize?"));
        assert!(location.contains("prompt=login"));
        assert!(resp
            .response()
            .cookies()
            .any(|c| c.name() == NONCE_COOKIE && !c.value().is_empty()));
    }

    #[actix_web::test]
    async fn test_login_query_cannot_replace_handshake_parameters() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let req = test::TestRequest::get()
            .uri("/api/login?redirect_uri=https%3A%2F%2Fevil.example.com%2F&response_type=token&client_id=other&connection=github")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        let url = url::Url::parse(location).unwrap();
        let params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["redirect_uri"], "https://app.example.com/");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "test-client-id");
        assert_eq!(params["connection"], "github");
    }

    #[actix_web::test]
    async fn test_callback_without_nonce_is_unauthorized() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let req = test::TestRequest::get()
            .uri("/api/callback?code=abc")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "authentication_failed");
    }

    #[actix_web::test]
    async fn test_logout_redirects_and_clears_cookies() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let req = test::TestRequest::get().uri("/api/logout").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        let cleared: Vec<String> = resp
            .response()
            .cookies()
            .filter(|c| c.max_age().is_some_and(|age| age.is_negative()))
            .map(|c| c.name().to_string())
            .collect();
        assert!(cleared.contains(&"a0:state".to_string()));
        assert!(cleared.contains(&"a0:session".to_string()));
    }

    #[actix_web::test]
    async fn test_me_without_session_is_unauthorized() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/me").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_session_and_status_without_cookie() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/session").to_request(),
        )
        .await;
        assert_eq!(body, Value::Null);

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/status").to_request(),
        )
        .await;
        assert_eq!(body, json!({"authenticated": false, "session": null}));
    }

    #[actix_web::test]
    async fn test_health() {
        let (handshake, _) = TestFixtures::handshake();
        let app = app!(handshake);

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/ping").to_request())
                .await;
        assert_eq!(body["status"], "ok");
    }
}
