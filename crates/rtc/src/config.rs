//! Konfiguration des WebRTC-Transports

use crate::error::{RtcError, RtcResult};

/// Standard-STUN-Server
pub const STANDARD_STUN: &str = "stun:stun.l.google.com:19302";

/// Einstellungen fuer Peer-Verbindungen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcKonfig {
    /// ICE-Server-URLs (STUN/TURN)
    pub ice_server: Vec<String>,
    /// Erlaubter UDP-Portbereich fuer ICE-Kandidaten (inklusive)
    ///
    /// `None` ueberlaesst die Portwahl dem Betriebssystem.
    pub port_bereich: Option<(u16, u16)>,
}

impl Default for RtcKonfig {
    fn default() -> Self {
        Self {
            ice_server: vec![STANDARD_STUN.to_string()],
            port_bereich: Some((10000, 10005)),
        }
    }
}

impl RtcKonfig {
    /// Prueft die Konfiguration auf offensichtliche Fehler
    pub fn validieren(&self) -> RtcResult<()> {
        if let Some((min, max)) = self.port_bereich {
            if min == 0 || min > max {
                return Err(RtcError::Konfiguration(format!(
                    "Ungueltiger Portbereich {min}-{max}"
                )));
            }
        }
        if let Some(leer) = self.ice_server.iter().find(|url| url.trim().is_empty()) {
            return Err(RtcError::Konfiguration(format!(
                "Leere ICE-Server-URL: '{leer}'"
            )));
        }
        Ok(())
    }
}
