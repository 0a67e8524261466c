//! Prometheus-kompatible Metriken fuer OnAir
//!
//! Registrierte Metriken:
//! - `onair_channel_live` – Gauge: 1 wenn ein Broadcaster live ist
//! - `onair_listeners_connected` – Gauge: Verbundene Listener
//! - `onair_sessions_registered` – Gauge: Registrierte Verbindungen (alle Rollen)
//! - `onair_admissions_total` – Counter: Handshakes (role, result)
//! - `onair_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `onair_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//!
//! Die Gauges werden beim Scrape aus dem Kanal-Status aktualisiert.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::health::{KanalKennzahlen, KennzahlenAbfrage};

/// Alle OnAir-Prometheus-Metriken
#[derive(Clone)]
pub struct OnAirMetrics {
    pub registry: Arc<Registry>,

    // Kanal-Metriken
    pub channel_live: IntGauge,
    pub listeners_connected: IntGauge,
    pub sessions_registered: IntGauge,
    pub admissions_total: IntCounterVec,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl OnAirMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Kanal-Metriken ---
        let channel_live = IntGauge::with_opts(Opts::new(
            "onair_channel_live",
            "1 wenn ein Broadcaster live ist, sonst 0",
        ))?;
        registry.register(Box::new(channel_live.clone()))?;

        let listeners_connected = IntGauge::with_opts(Opts::new(
            "onair_listeners_connected",
            "Anzahl verbundener Listener",
        ))?;
        registry.register(Box::new(listeners_connected.clone()))?;

        let sessions_registered = IntGauge::with_opts(Opts::new(
            "onair_sessions_registered",
            "Anzahl registrierter Verbindungen",
        ))?;
        registry.register(Box::new(sessions_registered.clone()))?;

        let admissions_total = IntCounterVec::new(
            Opts::new("onair_admissions_total", "Handshakes nach Rolle und Ergebnis"),
            &["role", "result"],
        )?;
        registry.register(Box::new(admissions_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("onair_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "onair_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            channel_live,
            listeners_connected,
            sessions_registered,
            admissions_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt einen Handshake (`result` = "admitted" oder Fehler-Label)
    pub fn zulassung_zaehlen(&self, rolle: &str, ergebnis: &str) {
        self.admissions_total
            .with_label_values(&[rolle, ergebnis])
            .inc();
    }

    /// Uebernimmt den aktuellen Kanal-Status in die Gauges
    pub fn kennzahlen_setzen(&self, kennzahlen: KanalKennzahlen) {
        self.channel_live.set(i64::from(kennzahlen.live));
        self.listeners_connected.set(kennzahlen.listener as i64);
        self.sessions_registered.set(kennzahlen.sitzungen as i64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[derive(Clone)]
struct MetrikenState {
    metriken: OnAirMetrics,
    abfrage: KennzahlenAbfrage,
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: OnAirMetrics, abfrage: KennzahlenAbfrage) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetrikenState { metriken, abfrage })
}

async fn metrics_handler(State(state): State<MetrikenState>) -> impl IntoResponse {
    state.metriken.kennzahlen_setzen((state.abfrage)());

    match state.metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = OnAirMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn kennzahlen_setzen_aktualisiert_gauges() {
        let metriken = OnAirMetrics::neu().unwrap();
        metriken.kennzahlen_setzen(KanalKennzahlen {
            live: true,
            listener: 7,
            sitzungen: 8,
        });
        assert_eq!(metriken.channel_live.get(), 1);
        assert_eq!(metriken.listeners_connected.get(), 7);
        assert_eq!(metriken.sessions_registered.get(), 8);
    }

    #[test]
    fn zulassungen_mit_labels() {
        let metriken = OnAirMetrics::neu().unwrap();
        metriken.zulassung_zaehlen("listener", "offline");
        metriken.zulassung_zaehlen("listener", "offline");
        let wert = metriken
            .admissions_total
            .with_label_values(&["listener", "offline"])
            .get();
        assert_eq!(wert, 2);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = OnAirMetrics::neu().unwrap();
        metriken.channel_live.set(1);

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("onair_channel_live 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[tokio::test]
    async fn scrape_fragt_aktuellen_status_ab() {
        let metriken = OnAirMetrics::neu().unwrap();
        let abfrage: KennzahlenAbfrage = Arc::new(|| KanalKennzahlen {
            live: false,
            listener: 0,
            sitzungen: 3,
        });
        let app = metrics_router(metriken.clone(), abfrage);

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("onair_sessions_registered 3"));
    }
}
