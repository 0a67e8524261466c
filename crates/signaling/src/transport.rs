//! Transport-Vertrag – was der Signaling-Kern vom Medien-Transport braucht
//!
//! Der Kern kennt nur opake Verbindungen: Zustand lesen, Zustand abonnieren,
//! Angebot aushandeln, schliessen. Codec-Wahl, ICE, DTLS/SRTP und
//! Congestion Control bleiben vollstaendig im Transport (z.B. `onair-rtc`).
//!
//! ## Medien-Richtung
//! - Broadcaster: `MedienRichtung::Empfangen(relay)` – der Transport speist
//!   eingehende Audio-Pakete in das Relay ein.
//! - Listener: `MedienRichtung::Senden(tap)` – der Transport leitet die
//!   Pakete des Taps an den Peer weiter.

use async_trait::async_trait;
use onair_core::{ConnectionId, TransportZustand};
use onair_voice::{Tap, TrackRelay};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler, die ein Transport melden kann
#[derive(Debug, Error)]
pub enum TransportFehler {
    /// Das Angebot ist nicht parsebar oder kein Offer
    #[error("Ungueltiges Angebot: {0}")]
    UngueltigesAngebot(String),

    /// Aushandlung fehlgeschlagen (Answer, ICE-Gathering, ...)
    #[error("Aushandlung fehlgeschlagen: {0}")]
    Aushandlung(String),

    /// Verbindung wurde bereits geschlossen
    #[error("Verbindung geschlossen")]
    Geschlossen,

    /// Interner Transportfehler
    #[error("Interner Transportfehler: {0}")]
    Intern(String),
}

// ---------------------------------------------------------------------------
// Aushandlungs-Payloads
// ---------------------------------------------------------------------------

/// SDP-Angebot eines Clients (bereits als Offer validiert)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpAngebot {
    pub sdp: String,
}

/// SDP-Antwort des Servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpAntwort {
    pub sdp: String,
    /// SDP-Typ, ueblicherweise "answer"
    pub sdp_typ: String,
}

/// Medien, die eine neue Verbindung transportiert
#[derive(Debug)]
pub enum MedienRichtung {
    /// Broadcaster: eingehendes Audio in das Relay einspeisen
    Empfangen(TrackRelay),
    /// Listener: Pakete des Taps an den Peer senden
    Senden(Tap),
}

impl MedienRichtung {
    /// Kurzname fuer Logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empfangen(_) => "empfangen",
            Self::Senden(_) => "senden",
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Fabrik fuer Transport-Verbindungen
#[async_trait]
pub trait MedienTransport: Send + Sync + 'static {
    /// Erstellt die Transport-Seite einer neuen Verbindung
    ///
    /// Die Verbindung startet im Zustand `Neu`. Die Aushandlung erfolgt
    /// separat ueber [`TransportVerbindung::aushandeln`].
    async fn verbindung_erstellen(
        &self,
        id: ConnectionId,
        medien: MedienRichtung,
    ) -> Result<Arc<dyn TransportVerbindung>, TransportFehler>;
}

/// Transport-Seite einer einzelnen Peer-Verbindung
#[async_trait]
pub trait TransportVerbindung: Send + Sync + 'static {
    /// Aktueller Verbindungszustand
    fn zustand(&self) -> TransportZustand;

    /// Abonniert Zustandsaenderungen
    ///
    /// Der Receiver liefert nur Vorwaerts-Uebergaenge. Wird der Sender
    /// verworfen, gilt die Verbindung als beendet.
    fn zustand_abonnieren(&self) -> watch::Receiver<TransportZustand>;

    /// Handelt das Angebot aus und liefert die lokale Antwort
    async fn aushandeln(&self, angebot: SdpAngebot) -> Result<SdpAntwort, TransportFehler>;

    /// Schliesst die Verbindung (idempotent)
    async fn schliessen(&self);
}

// ---------------------------------------------------------------------------
// ZustandsMelder
// ---------------------------------------------------------------------------

/// Hilfstyp fuer Transports zum Melden von Zustaenden
///
/// Erzwingt Vorwaerts-Uebergaenge: ein terminaler Zustand ist endgueltig,
/// Rueckschritte und Wiederholungen werden ignoriert.
#[derive(Debug)]
pub struct ZustandsMelder {
    tx: watch::Sender<TransportZustand>,
}

impl ZustandsMelder {
    /// Erstellt einen neuen Melder im Zustand `Neu`
    pub fn neu() -> Self {
        let (tx, _) = watch::channel(TransportZustand::Neu);
        Self { tx }
    }

    /// Meldet einen neuen Zustand
    ///
    /// Gibt `true` zurueck wenn der Uebergang uebernommen wurde.
    pub fn melden(&self, naechster: TransportZustand) -> bool {
        let uebernommen = self.tx.send_if_modified(|aktuell| {
            if aktuell.darf_wechseln_zu(naechster) {
                *aktuell = naechster;
                true
            } else {
                false
            }
        });
        if !uebernommen {
            tracing::trace!(zustand = %naechster, "Zustandsmeldung ignoriert (nicht vorwaerts)");
        }
        uebernommen
    }

    /// Aktueller Zustand
    pub fn aktuell(&self) -> TransportZustand {
        *self.tx.borrow()
    }

    /// Neuer Receiver fuer Zustandsaenderungen
    pub fn abonnieren(&self) -> watch::Receiver<TransportZustand> {
        self.tx.subscribe()
    }
}

impl Default for ZustandsMelder {
    fn default() -> Self {
        Self::neu()
    }
}
