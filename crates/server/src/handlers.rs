use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::web;
use serde::Deserialize;
use skr_core::ID;
use skr_hosting::Garrison;
use skr_rules::Session;
use skr_rules::SessionConfig;
use std::sync::Arc;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    pub config: SessionConfig,
    /// Pin the simulation seed; omitted means process entropy.
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub session_id: uuid::Uuid,
    pub name: String,
}

/// Open a new session from lobby configuration.
pub async fn start(
    garrison: web::Data<Arc<Garrison>>,
    body: Option<web::Json<StartRequest>>,
) -> impl Responder {
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    let id = garrison.open_session(request.config, request.seed).await;
    HttpResponse::Ok().json(serde_json::json!({ "sessionId": id.to_string() }))
}

/// WebSocket entry: upgrade and hand the socket to the bridge. The
/// authentication handshake happens in-band within 5 seconds.
pub async fn enter(
    garrison: web::Data<Arc<Garrison>>,
    path: web::Path<uuid::Uuid>,
    body: web::Payload,
    req: HttpRequest,
) -> impl Responder {
    let id: ID<Session> = ID::from(path.into_inner());
    if garrison.session(id).await.is_none() {
        return HttpResponse::NotFound()
            .body("session not found")
            .map_into_right_body();
    }
    match actix_ws::handle(&req, body) {
        Ok((response, session, stream)) => {
            match skr_hosting::bridge(garrison.into_inner().as_ref().clone(), session, stream).await
            {
                Ok(()) => response.map_into_left_body(),
                Err(e) => HttpResponse::InternalServerError()
                    .body(e.to_string())
                    .map_into_right_body(),
            }
        }
        Err(e) => HttpResponse::InternalServerError()
            .body(e.to_string())
            .map_into_right_body(),
    }
}

/// Tear a session down.
pub async fn leave(
    garrison: web::Data<Arc<Garrison>>,
    path: web::Path<uuid::Uuid>,
) -> impl Responder {
    match garrison.close_session(ID::from(path.into_inner())).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "status": "closed" })),
        Err(e) => HttpResponse::NotFound().body(e.to_string()),
    }
}

/// Snapshot a running session into a save slot.
pub async fn save(
    garrison: web::Data<Arc<Garrison>>,
    path: web::Path<String>,
    body: web::Json<SaveRequest>,
) -> impl Responder {
    let slot = path.into_inner();
    let sid: ID<Session> = ID::from(body.session_id);
    let snapshot = match garrison.snapshot(sid).await {
        Some(snapshot) => snapshot,
        None => return HttpResponse::NotFound().body("session not found"),
    };
    match garrison.store().save(&slot, &body.name, &snapshot) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "slot": slot })),
        Err(e) => {
            log::error!("save to {} failed: {}", slot, e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

/// List occupied save slots.
pub async fn list_saves(garrison: web::Data<Arc<Garrison>>) -> impl Responder {
    match garrison.store().list() {
        Ok(listing) => HttpResponse::Ok().json(listing),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

/// Resurrect a saved session under a fresh worker.
pub async fn load(garrison: web::Data<Arc<Garrison>>, path: web::Path<String>) -> impl Responder {
    let slot = path.into_inner();
    match garrison.store().load(&slot) {
        Ok(Some(session)) => {
            let id = garrison.adopt(session).await;
            HttpResponse::Ok().json(serde_json::json!({ "sessionId": id.to_string() }))
        }
        Ok(None) => HttpResponse::NotFound().body("empty slot"),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}
