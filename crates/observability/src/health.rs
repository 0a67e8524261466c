//! Health-Check-Endpunkt fuer OnAir
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, Live-Status und Sitzungen.
//! Waehrend des Herunterfahrens antwortet der Endpunkt mit 503.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Momentaufnahme der Kanal-Kennzahlen fuer Health und Metriken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KanalKennzahlen {
    pub live: bool,
    /// Verbundene Listener
    pub listener: usize,
    /// Registrierte Verbindungen aller Rollen
    pub sitzungen: usize,
}

/// Liefert die aktuellen Kennzahlen (vom Server verdrahtet)
pub type KennzahlenAbfrage = Arc<dyn Fn() -> KanalKennzahlen + Send + Sync>;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub live: bool,
    pub sessions: usize,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    herunterfahren: Arc<AtomicBool>,
    abfrage: KennzahlenAbfrage,
}

impl HealthState {
    pub fn neu(abfrage: KennzahlenAbfrage) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            herunterfahren: Arc::new(AtomicBool::new(false)),
            abfrage,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Markiert den Server als herunterfahrend
    pub fn herunterfahren_melden(&self) {
        self.herunterfahren.store(true, Ordering::Relaxed);
    }

    pub fn faehrt_herunter(&self) -> bool {
        self.herunterfahren.load(Ordering::Relaxed)
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let (status, http_status) = if state.faehrt_herunter() {
        (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE)
    } else {
        (HealthStatus::Healthy, StatusCode::OK)
    };
    let kennzahlen = (state.abfrage)();

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        live: kennzahlen.live,
        sessions: kennzahlen.sitzungen,
    };

    (http_status, Json(response))
}
