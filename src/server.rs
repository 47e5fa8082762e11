//! HTTP transport listener.
//!
//! Routes parse the raw body themselves so unparsable envelopes can degrade
//! to the plain-text `ERROR` page (best-effort protocol, no structured
//! reply), while everything parsed produces exactly one JSON response.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Json, Response as HttpResponse};
use axum::routing::{get, put};
use log::{debug, warn};
use serde::Deserialize;

use crate::apps::AppRegistry;
use crate::discovery::Discovery;
use crate::handler::Handler;
use crate::packet::{Request, RequestId, Response};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct ServerState {
    pub handler: Arc<Handler>,
    pub apps: Arc<AppRegistry>,
    pub discovery: Arc<Discovery>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/diyledinfo", put(info))
        .route("/diyleddiscover", put(discover))
        .route("/diyledapp", put(app_handshake))
        .route("/diyled", put(control_put).get(control_get))
        .route("/diyledstatus", get(status))
        .fallback(error_page)
        .with_state(state)
}

/// Body of the `/diyledapp` and `/diyleddiscover` handshakes.
#[derive(Deserialize)]
struct Handshake {
    id: RequestId,
}

async fn info(State(state): State<ServerState>, body: String) -> HttpResponse {
    let request = match parse(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    Json(state.handler.handle(request).await).into_response()
}

/// `PUT /diyled`: handle the envelope, then tell every other app to pull a
/// refresh. Apps re-fetch full state rather than receiving deltas.
async fn control_put(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: String,
) -> HttpResponse {
    let request = match parse(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let mutating = request.is_mutating();
    let response = state.handler.handle(request).await;
    if mutating {
        state
            .apps
            .broadcast_except(Some(addr.ip()), &Response::GetSetup)
            .await;
    }
    Json(response).into_response()
}

/// `GET /diyled`: same envelope set, no refresh broadcast.
async fn control_get(State(state): State<ServerState>, body: String) -> HttpResponse {
    let request = match parse(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    Json(state.handler.handle(request).await).into_response()
}

async fn discover(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: String,
) -> HttpResponse {
    let handshake = match serde_json::from_str::<Handshake>(&body) {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!("HTTP: malformed discover request from {addr}: {e}");
            return error_page().await.into_response();
        }
    };
    debug!("HTTP: discovery requested by {addr}");
    state.discovery.clone().start_session(addr.ip());
    Json(Response::success("Search started.", handshake.id)).into_response()
}

async fn app_handshake(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: String,
) -> HttpResponse {
    let handshake = match serde_json::from_str::<Handshake>(&body) {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!("HTTP: malformed app handshake from {addr}: {e}");
            return error_page().await.into_response();
        }
    };
    state.apps.register(addr.ip());
    Json(state.handler.setup_packets(&handshake.id)).into_response()
}

/// Plain-text human-readable status dump.
async fn status(State(state): State<ServerState>) -> String {
    let store = state.handler.store().read().unwrap();
    let mut out = format!(
        "DiyLed - Status:\r\n\r\nRunning...\r\n\
         {} Lights registered!\r\n\
         {} Rooms registered!\r\n\
         {} Scenes registered!\r\n\
         AppInstances: {}\r\n\r\nStates:\r\n",
        store.lights().count(),
        store.rooms().count(),
        store.scenes().count(),
        state.apps.count(),
    );
    for light in store.lights() {
        let color = light.color();
        out.push_str(&format!(
            "{} - Power: {} | Brightness: {} | Mode: {} | Color: {}, {}, {}\r\n",
            light.name(),
            light.power(),
            light.brightness(),
            light.mode(),
            color.red(),
            color.green(),
            color.blue(),
        ));
    }
    out.push_str(&format!("\r\n\r\ndiyled-hub v{}", env!("CARGO_PKG_VERSION")));
    out
}

/// Any other path (and any unparsable body) gets this, with HTTP 200.
async fn error_page() -> &'static str {
    "ERROR"
}

fn parse(body: &str) -> Result<Request, HttpResponse> {
    serde_json::from_str(body).map_err(|e| {
        warn!("HTTP: malformed request body: {e}");
        "ERROR".into_response()
    })
}
