//! Fehlertypen fuer den Signaling-Service
//!
//! Alle Fehler vor der Zulassung werden dem Anfragenden synchron als Teil
//! der Handshake-Antwort gemeldet. Fehler nach der Zulassung werden intern
//! behandelt und sind nur indirekt ueber den Status sichtbar.

use onair_core::ConnectionId;
use thiserror::Error;

use crate::transport::TransportFehler;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Handshake-Payload fehlt oder ist ungueltig
    #[error("Fehlerhafter Handshake: {0}")]
    FehlerhafterHandshake(String),

    /// Es ist bereits ein Broadcaster live
    #[error("Kanal ist bereits live")]
    KanalBelegt,

    /// Listener will beitreten, aber kein Broadcaster ist live
    #[error("Kanal ist nicht live")]
    KanalOffline,

    /// Transport konnte die Verbindung nicht aufbauen oder aushandeln
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Verbindungs-ID ist bereits registriert
    #[error("Verbindung bereits registriert: {0}")]
    DoppelteId(ConnectionId),
}

impl SignalingError {
    /// Erstellt einen Fehler fuer ein ungueltiges Handshake-Payload
    pub fn fehlerhaft(msg: impl Into<String>) -> Self {
        Self::FehlerhafterHandshake(msg.into())
    }

    /// HTTP-Statuscode fuer die Handshake-Antwort
    pub fn http_status(&self) -> u16 {
        match self {
            Self::FehlerhafterHandshake(_) => 400,
            Self::KanalBelegt | Self::KanalOffline => 409,
            Self::Transport(_) => 502,
            Self::DoppelteId(_) => 500,
        }
    }

    /// Oeffentlicher, menschenlesbarer Grund fuer die Wire-Antwort
    ///
    /// Interne Details (Display) bleiben im Log.
    pub fn grund(&self) -> &'static str {
        match self {
            Self::FehlerhafterHandshake(_) => "malformed offer",
            Self::KanalBelegt => "channel already live",
            Self::KanalOffline => "channel not live",
            Self::Transport(_) => "transport failure",
            Self::DoppelteId(_) => "internal error",
        }
    }

    /// Kurzname fuer Metrik-Labels
    pub fn metrik_label(&self) -> &'static str {
        match self {
            Self::FehlerhafterHandshake(_) => "malformed",
            Self::KanalBelegt => "busy",
            Self::KanalOffline => "offline",
            Self::Transport(_) => "transport_failure",
            Self::DoppelteId(_) => "internal",
        }
    }
}

impl From<TransportFehler> for SignalingError {
    fn from(fehler: TransportFehler) -> Self {
        match fehler {
            TransportFehler::UngueltigesAngebot(msg) => Self::FehlerhafterHandshake(msg),
            andere => Self::Transport(andere.to_string()),
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
