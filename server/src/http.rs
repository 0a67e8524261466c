//! HTTP-Schnittstelle: Signaling, Status, Web-Oberflaeche
//!
//! Endpunkte:
//! - `GET  /status`   – Kanal-Status `{isLive, channelName, listenerCount}`
//! - `POST /offer`    – Handshake `{sdpOffer, sdpType, role}` -> `{sdpAnswer, sdpType}`
//! - `GET  /`         – Index der Web-Oberflaeche
//! - `GET  /static/*` – Statische Dateien
//! - `GET  /metrics`, `GET /health` – falls Observability aktiviert
//!
//! Fehler werden als `{"error": "<grund>"}` mit passendem Statuscode
//! beantwortet.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use onair_observability::{
    health_router, http_metriken_middleware, metrics_router, request_timing_layer, HealthState,
    KanalKennzahlen, KennzahlenAbfrage, OnAirMetrics,
};
use onair_signaling::{HandshakeAnfrage, SignalingCoordinator, SignalingError};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::ServerConfig;

/// Geteilter Zustand der HTTP-Handler
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SignalingCoordinator,
    pub metriken: OnAirMetrics,
}

/// Kennzahlen-Abfrage fuer Health und Metriken
pub fn kennzahlen_abfrage(coordinator: &SignalingCoordinator) -> KennzahlenAbfrage {
    let coordinator = coordinator.clone();
    Arc::new(move || {
        let status = coordinator.status();
        KanalKennzahlen {
            live: status.is_live,
            listener: status.listener_count,
            sitzungen: coordinator.sitzungen_anzahl(),
        }
    })
}

/// Baut den vollstaendigen Router
pub fn router(state: AppState, config: &ServerConfig, health: HealthState) -> Router {
    let metriken = state.metriken.clone();
    let abfrage = kennzahlen_abfrage(&state.coordinator);

    let mut app = Router::new()
        .route("/status", get(get_status))
        .route("/offer", post(post_offer))
        .with_state(state);

    if config.observability.aktiviert {
        app = app
            .merge(metrics_router(metriken.clone(), abfrage))
            .merge(health_router(health));
    }

    if config.static_files.aktiviert {
        let verzeichnis = &config.static_files.verzeichnis;
        app = app
            .route_service("/", ServeFile::new(verzeichnis.join(&config.static_files.index)))
            .nest_service("/static", ServeDir::new(verzeichnis));
    }

    app.layer(middleware::from_fn_with_state(metriken, http_metriken_middleware))
        .layer(request_timing_layer())
        .layer(cors_layer(&config.network.cors_origins))
}

/// CORS: entweder spezifische Origins oder alle
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// `GET /status` – reine Leseoperation
pub async fn get_status(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.coordinator.status())).into_response()
}

/// `POST /offer` – Handshake eines Broadcasters oder Listeners
pub async fn post_offer(
    State(state): State<AppState>,
    payload: Result<Json<HandshakeAnfrage>, JsonRejection>,
) -> Response {
    let anfrage = match payload {
        Ok(Json(anfrage)) => anfrage,
        Err(rejection) => {
            tracing::debug!(fehler = %rejection, "Handshake-Payload nicht lesbar");
            let fehler = SignalingError::fehlerhaft(rejection.body_text());
            state.metriken.zulassung_zaehlen("unknown", fehler.metrik_label());
            return fehler_antwort(&fehler);
        }
    };

    let rolle = anfrage.rollen_label();
    match state.coordinator.handshake(anfrage).await {
        Ok(antwort) => {
            state.metriken.zulassung_zaehlen(rolle, "admitted");
            (StatusCode::OK, Json(antwort)).into_response()
        }
        Err(e) => {
            if e.http_status() >= 500 {
                tracing::warn!(rolle, fehler = %e, "Handshake fehlgeschlagen");
            } else {
                tracing::info!(rolle, fehler = %e, "Handshake abgelehnt");
            }
            state.metriken.zulassung_zaehlen(rolle, e.metrik_label());
            fehler_antwort(&e)
        }
    }
}

fn fehler_antwort(e: &SignalingError) -> Response {
    (
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "error": e.grund() })),
    )
        .into_response()
}
