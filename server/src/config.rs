//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use onair_core::OnAirError;
use onair_observability::{log_format_gueltig, log_level_gueltig};
use onair_rtc::RtcKonfig;
use onair_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen (HTTP)
    pub network: NetzwerkEinstellungen,
    /// WebRTC-Einstellungen (ICE, Portbereich)
    pub rtc: RtcEinstellungen,
    /// Zulassung und Lebenszyklus
    pub signaling: SignalingEinstellungen,
    /// Auslieferung der Web-Oberflaeche
    pub static_files: StaticEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Name des Kanals im Status
    pub kanal_name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            kanal_name: onair_signaling::config::STANDARD_KANAL_NAME.into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP
    pub bind_adresse: String,
    /// Port fuer HTTP (Signaling, Status, Web-Oberflaeche)
    pub http_port: u16,
    /// Erlaubte CORS-Origins. Leer = alle Origins erlaubt.
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8080,
            cors_origins: vec![],
        }
    }
}

/// WebRTC-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcEinstellungen {
    /// STUN/TURN-URLs
    pub ice_server: Vec<String>,
    /// Untere Grenze des UDP-Portbereichs (beide leer = beliebige Ports)
    pub port_min: Option<u16>,
    /// Obere Grenze des UDP-Portbereichs
    pub port_max: Option<u16>,
}

impl Default for RtcEinstellungen {
    fn default() -> Self {
        let standard = RtcKonfig::default();
        Self {
            ice_server: standard.ice_server,
            port_min: standard.port_bereich.map(|(min, _)| min),
            port_max: standard.port_bereich.map(|(_, max)| max),
        }
    }
}

/// Zulassung und Lebenszyklus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Sekunden bis eine Verbindung `connected` erreichen muss (0 = aus)
    pub verbindungsaufbau_timeout_sek: u64,
    /// Sekunden pro Verbindung beim Schliessen im Shutdown
    pub schliessen_timeout_sek: u64,
    /// Puffergroesse pro Listener in Paketen
    pub relay_kapazitaet: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        Self {
            verbindungsaufbau_timeout_sek: 30,
            schliessen_timeout_sek: 5,
            relay_kapazitaet: SignalingConfig::default().relay_kapazitaet,
        }
    }
}

/// Auslieferung der Web-Oberflaeche
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticEinstellungen {
    pub aktiviert: bool,
    /// Verzeichnis, das unter `/static` ausgeliefert wird
    pub verzeichnis: PathBuf,
    /// Datei fuer `GET /` (relativ zum Verzeichnis)
    pub index: String,
}

impl Default for StaticEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            verzeichnis: PathBuf::from("static"),
            index: "index.html".into(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert `/metrics` und `/health`
    pub aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { aktiviert: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config: Self = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Prueft Werte, die serde nicht abfangen kann
    pub fn validieren(&self) -> onair_core::Result<()> {
        if self.network.http_port == 0 {
            return Err(OnAirError::konfiguration("network.http_port darf nicht 0 sein"));
        }
        if self.signaling.relay_kapazitaet == 0 {
            return Err(OnAirError::konfiguration(
                "signaling.relay_kapazitaet muss groesser als 0 sein",
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(OnAirError::konfiguration(format!(
                "logging.level '{}' ist ungueltig",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(OnAirError::konfiguration(format!(
                "logging.format '{}' ist ungueltig (text oder json)",
                self.logging.format
            )));
        }
        self.port_bereich()?;
        Ok(())
    }

    fn port_bereich(&self) -> onair_core::Result<Option<(u16, u16)>> {
        match (self.rtc.port_min, self.rtc.port_max) {
            (None, None) => Ok(None),
            (Some(min), Some(max)) if min > 0 && min <= max => Ok(Some((min, max))),
            (Some(min), Some(max)) => Err(OnAirError::konfiguration(format!(
                "rtc.port_min ({min}) muss zwischen 1 und rtc.port_max ({max}) liegen"
            ))),
            _ => Err(OnAirError::konfiguration(
                "rtc.port_min und rtc.port_max nur gemeinsam angeben",
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer HTTP zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.network.bind_adresse, self.network.http_port)
    }

    /// Konfiguration fuer den WebRTC-Transport
    pub fn rtc_konfig(&self) -> onair_core::Result<RtcKonfig> {
        Ok(RtcKonfig {
            ice_server: self.rtc.ice_server.clone(),
            port_bereich: self.port_bereich()?,
        })
    }

    /// Konfiguration fuer den Signaling-Koordinator
    pub fn signaling_config(&self) -> SignalingConfig {
        let timeout = self.signaling.verbindungsaufbau_timeout_sek;
        SignalingConfig {
            kanal_name: self.server.kanal_name.clone(),
            verbindungsaufbau_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            schliessen_timeout: Duration::from_secs(self.signaling.schliessen_timeout_sek),
            relay_kapazitaet: self.signaling.relay_kapazitaet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.network.http_port, 8080);
        assert_eq!(cfg.rtc.port_min, Some(10000));
        assert_eq!(cfg.rtc.port_max, Some(10005));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:8080");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            kanal_name = "Radio Eins"

            [network]
            http_port = 9000

            [rtc]
            ice_server = []
            port_min = 20000
            port_max = 20100
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.kanal_name, "Radio Eins");
        assert_eq!(cfg.network.http_port, 9000);
        assert_eq!(cfg.rtc_konfig().unwrap().port_bereich, Some((20000, 20100)));
        assert!(cfg.rtc.ice_server.is_empty());
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.network.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.signaling.schliessen_timeout_sek, 5);
    }

    #[test]
    fn halber_portbereich_ist_ungueltig() {
        let mut cfg = ServerConfig::default();
        cfg.rtc.port_max = None;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn umgekehrter_portbereich_ist_ungueltig() {
        let mut cfg = ServerConfig::default();
        cfg.rtc.port_min = Some(10010);
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn ohne_portbereich_beliebige_ports() {
        let mut cfg = ServerConfig::default();
        cfg.rtc.port_min = None;
        cfg.rtc.port_max = None;
        assert_eq!(cfg.rtc_konfig().unwrap().port_bereich, None);
    }

    #[test]
    fn timeout_null_deaktiviert_watchdog() {
        let mut cfg = ServerConfig::default();
        cfg.signaling.verbindungsaufbau_timeout_sek = 0;
        assert_eq!(cfg.signaling_config().verbindungsaufbau_timeout, None);
        assert_eq!(
            cfg.signaling_config().kanal_name,
            onair_signaling::config::STANDARD_KANAL_NAME
        );
    }

    #[test]
    fn unbekanntes_log_format_ist_ungueltig() {
        let toml = r#"
            [logging]
            format = "xml"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        let fehler = cfg.validieren().unwrap_err();
        assert!(fehler.to_string().contains("logging.format"));
    }

    #[test]
    fn log_level_wird_geprueft() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(cfg.validieren().is_err());

        cfg.logging.level = "info,onair_signaling=debug".into();
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/gibt/es/nicht/config.toml").unwrap();
        assert_eq!(cfg.network.http_port, 8080);
    }
}
