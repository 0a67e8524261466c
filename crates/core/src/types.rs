//! Gemeinsame Identifikations- und Zustandstypen fuer OnAir
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zur Compilezeit
//! auszuschliessen.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::OnAirError;

/// Eindeutige ID einer Peer-Verbindung (ein Handshake = eine ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Rolle
// ---------------------------------------------------------------------------

/// Rolle einer Verbindung im Broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    /// Sendet den einen Live-Audiostream
    Broadcaster,
    /// Empfaengt eine Kopie des Live-Streams
    Listener,
}

impl Rolle {
    /// Wire-Name der Rolle
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Broadcaster => "broadcaster",
            Self::Listener => "listener",
        }
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl FromStr for Rolle {
    type Err = OnAirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadcaster" => Ok(Self::Broadcaster),
            "listener" => Ok(Self::Listener),
            andere => Err(OnAirError::UngueltigeRolle(andere.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TransportZustand
// ---------------------------------------------------------------------------

/// Verbindungszustand einer Peer-Verbindung, wie ihn der Transport meldet
///
/// Zustaende laufen nur vorwaerts:
/// ```text
/// Neu -> Verbindend -> Verbunden -> Geschlossen
///   \________\___________\-------> Fehlgeschlagen
/// ```
/// `Fehlgeschlagen` und `Geschlossen` sind terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportZustand {
    #[serde(rename = "new")]
    Neu,
    #[serde(rename = "connecting")]
    Verbindend,
    #[serde(rename = "connected")]
    Verbunden,
    #[serde(rename = "failed")]
    Fehlgeschlagen,
    #[serde(rename = "closed")]
    Geschlossen,
}

impl TransportZustand {
    /// Terminale Zustaende beenden den Lebenszyklus einer Verbindung
    pub fn ist_terminal(&self) -> bool {
        matches!(self, Self::Fehlgeschlagen | Self::Geschlossen)
    }

    /// Fortschritts-Rang fuer die Vorwaerts-Pruefung
    fn rang(&self) -> u8 {
        match self {
            Self::Neu => 0,
            Self::Verbindend => 1,
            Self::Verbunden => 2,
            Self::Fehlgeschlagen | Self::Geschlossen => 3,
        }
    }

    /// Prueft ob der Uebergang `self -> naechster` erlaubt ist
    ///
    /// Aus einem terminalen Zustand fuehrt kein Uebergang heraus.
    pub fn darf_wechseln_zu(&self, naechster: TransportZustand) -> bool {
        !self.ist_terminal() && naechster.rang() > self.rang()
    }
}

impl std::fmt::Display for TransportZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Neu => "new",
            Self::Verbindend => "connecting",
            Self::Verbunden => "connected",
            Self::Fehlgeschlagen => "failed",
            Self::Geschlossen => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn rolle_parsen() {
        assert_eq!("broadcaster".parse::<Rolle>().unwrap(), Rolle::Broadcaster);
        assert_eq!("listener".parse::<Rolle>().unwrap(), Rolle::Listener);
        assert!("Listener".parse::<Rolle>().is_err());
        assert!("".parse::<Rolle>().is_err());
    }

    #[test]
    fn rolle_serde_kleingeschrieben() {
        let json = serde_json::to_string(&Rolle::Broadcaster).unwrap();
        assert_eq!(json, "\"broadcaster\"");
    }

    #[test]
    fn zustand_nur_vorwaerts() {
        use TransportZustand::*;
        assert!(Neu.darf_wechseln_zu(Verbindend));
        assert!(Neu.darf_wechseln_zu(Fehlgeschlagen));
        assert!(Verbindend.darf_wechseln_zu(Verbunden));
        assert!(Verbunden.darf_wechseln_zu(Geschlossen));
        assert!(!Verbunden.darf_wechseln_zu(Verbindend));
        assert!(!Verbunden.darf_wechseln_zu(Verbunden));
    }

    #[test]
    fn terminal_ist_endgueltig() {
        use TransportZustand::*;
        assert!(!Fehlgeschlagen.darf_wechseln_zu(Geschlossen));
        assert!(!Geschlossen.darf_wechseln_zu(Fehlgeschlagen));
        assert!(!Geschlossen.darf_wechseln_zu(Verbunden));
    }

    #[test]
    fn zustand_serde_namen() {
        let json = serde_json::to_string(&TransportZustand::Verbunden).unwrap();
        assert_eq!(json, "\"connected\"");
        assert_eq!(TransportZustand::Fehlgeschlagen.to_string(), "failed");
    }
}
