//! onair-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod http;

use std::sync::Arc;

use anyhow::Result;
use config::ServerConfig;
use onair_observability::{HealthState, OnAirMetrics};
use onair_rtc::WebRtcTransport;
use onair_signaling::SignalingCoordinator;

use crate::http::{kennzahlen_abfrage, AppState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. WebRTC-Transport aufbauen (Codecs, ICE, Portbereich)
    /// 2. Signaling-Koordinator mit leerem Kanal erstellen
    /// 3. HTTP-Server starten
    /// 4. Auf Ctrl-C / SIGTERM warten, laufende Anfragen abschliessen
    /// 5. Alle Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        let transport = WebRtcTransport::neu(&self.config.rtc_konfig()?)?;
        let coordinator =
            SignalingCoordinator::neu(Arc::new(transport), self.config.signaling_config());

        let metriken = OnAirMetrics::neu()?;
        let health = HealthState::neu(kennzahlen_abfrage(&coordinator));

        let app = http::router(
            AppState {
                coordinator: coordinator.clone(),
                metriken,
            },
            &self.config,
            health.clone(),
        );

        let adresse = self.config.http_bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse).await?;
        tracing::info!(
            adresse = %adresse,
            kanal = %self.config.server.kanal_name,
            static_dir = %self.config.static_files.verzeichnis.display(),
            "HTTP-Server gestartet"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(health))
            .await?;

        let geschlossen = coordinator.alle_schliessen().await;
        tracing::info!(verbindungen = geschlossen, "Server beendet");
        Ok(())
    }
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn shutdown_signal(health: HealthState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler konnte nicht installiert werden");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    health.herunterfahren_melden();
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
