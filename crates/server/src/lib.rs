//! Server wiring for skirmish.
//!
//! Binds the HTTP surface (health, session lifecycle, save slots) and
//! the WebSocket entry point onto one actix-web server. All runtime
//! configuration is injected through the environment:
//!
//! - `BIND_ADDR` — listen address (e.g. `0.0.0.0:8888`)
//! - `JWT_SECRET` — shared secret for session-token verification
//! - `SAVE_DIR` — directory backing the save store (default `saves/`)

pub mod handlers;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;
use skr_auth::Crypto;
use skr_hosting::Garrison;
use skr_store::JsonFileStore;
use std::sync::Arc;

async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[rustfmt::skip]
pub async fn run() -> Result<(), std::io::Error> {
    let verifier = Arc::new(Crypto::from_env());
    let save_dir = std::env::var("SAVE_DIR").unwrap_or_else(|_| "saves".to_string());
    let store = Arc::new(JsonFileStore::new(save_dir));
    let garrison = web::Data::new(Garrison::new(verifier, store));
    log::info!("starting skirmish server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(garrison.clone())
            .route("/health", web::get().to(health))
            .service(
                web::scope("/session")
                    .route("/start", web::post().to(handlers::start))
                    .route("/enter/{session_id}", web::get().to(handlers::enter))
                    .route("/leave/{session_id}", web::post().to(handlers::leave)),
            )
            .service(
                web::scope("/saves")
                    .route("", web::get().to(handlers::list_saves))
                    .route("/{slot}", web::post().to(handlers::save))
                    .route("/{slot}/load", web::post().to(handlers::load)),
            )
    })
    .workers(6)
    .bind(std::env::var("BIND_ADDR").expect("BIND_ADDR must be set"))?
    .run()
    .await
}
