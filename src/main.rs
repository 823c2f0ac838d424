#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{anyhow, Context};
use sealgate::{handlers::configure_services, AuthSettings, Handshake};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = AuthSettings::load().map_err(|e| anyhow!("Failed to load settings: {e}"))?;

    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let handshake = web::Data::new(
        Handshake::new(settings).context("Invalid authentication configuration")?,
    );

    HttpServer::new(move || {
        App::new()
            .app_data(handshake.clone())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await?;

    Ok(())
}

fn print_startup_info(bind_address: &str, settings: &AuthSettings) {
    println!("Starting sealgate {} on http://{bind_address}", sealgate::VERSION);
    println!("Identity provider: {}", settings.domain);
    println!("Environment: {:?}", settings.environment);
    println!();
    println!("Handshake endpoints:");
    println!("  GET  /api/login    - Start login, redirect to the identity provider");
    println!("  GET  /api/callback - Complete login and set the session cookie");
    println!("  GET  /api/logout   - Clear session and redirect to provider logout");
    println!();
    println!("Session endpoints:");
    println!("  GET  /api/me       - Current user claims (401 when logged out)");
    println!("  GET  /api/session  - Current session or null");
    println!("  GET  /api/status   - {{authenticated, session}}");
    println!();
    println!("Redirect URI registered at the provider: {}", settings.redirect_uri());
    println!("System endpoints:");
    println!("  GET  /ping         - Health check");
}
