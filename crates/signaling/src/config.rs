//! Laufzeit-Parameter des Signaling-Kerns

use std::time::Duration;

use onair_voice::STANDARD_KAPAZITAET;

/// Standard-Kanalname
pub const STANDARD_KANAL_NAME: &str = "Live Broadcast";

/// Konfiguration des Signaling-Koordinators
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Name des Kanals, wie ihn der Status meldet
    pub kanal_name: String,
    /// Maximale Zeit bis eine zugelassene Verbindung `connected` erreicht
    ///
    /// `None` deaktiviert den Watchdog.
    pub verbindungsaufbau_timeout: Option<Duration>,
    /// Maximale Zeit pro Verbindung beim Schliessen im Shutdown
    pub schliessen_timeout: Duration,
    /// Puffergroesse pro Listener-Tap (Pakete)
    pub relay_kapazitaet: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            kanal_name: STANDARD_KANAL_NAME.to_string(),
            verbindungsaufbau_timeout: Some(Duration::from_secs(30)),
            schliessen_timeout: Duration::from_secs(5),
            relay_kapazitaet: STANDARD_KAPAZITAET,
        }
    }
}
