//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `ONAIR_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard: info
//! - `ONAIR_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Umgebungsvariablen haben Vorrang vor der Konfigurationsdatei.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// Liest `ONAIR_LOG_LEVEL` und `ONAIR_LOG_FORMAT` aus der Umgebung.
/// Faellt auf die uebergebenen Werte und zuletzt auf `info` / `text` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("ONAIR_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var("ONAIR_LOG_FORMAT").unwrap_or_else(|_| format.to_string());

    match format_env.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

const LOG_STUFEN: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Prueft `logging.level`: eine Stufe oder Direktiven wie
/// `info,onair_signaling=debug`. Jede Direktive muss auf eine Stufe enden.
pub fn log_level_gueltig(level: &str) -> bool {
    !level.is_empty()
        && level.split(',').all(|direktive| {
            let stufe = direktive
                .rsplit_once('=')
                .map_or(direktive, |(_, stufe)| stufe);
            LOG_STUFEN.contains(&stufe.trim())
        })
}

/// Prueft `logging.format` (`text` oder `json`)
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level), "{level} muss gueltig sein");
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
        assert!(!log_level_gueltig("info,onair_signaling=laut"));
    }

    #[test]
    fn log_level_direktiven() {
        assert!(log_level_gueltig("info,onair_signaling=debug"));
        assert!(log_level_gueltig("warn,onair_rtc=trace,webrtc=off"));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }
}
