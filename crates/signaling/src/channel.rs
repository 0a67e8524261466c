//! Broadcast-Kanal – der eine gemeinsame Live-Slot
//!
//! Der Kanal ist entweder leer oder live mit genau einem Relay und dessen
//! Besitzer. Beide Uebergaenge laufen unter demselben Mutex, damit zwei
//! gleichzeitige Broadcaster-Zulassungen nie beide gewinnen.

use onair_core::ConnectionId;
use onair_voice::{Tap, TrackRelay};
use parking_lot::Mutex;
use std::time::Instant;

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// KanalZustand
// ---------------------------------------------------------------------------

enum KanalZustand {
    Leer,
    Live {
        relay: TrackRelay,
        besitzer: ConnectionId,
        seit: Instant,
    },
}

// ---------------------------------------------------------------------------
// BroadcastChannel
// ---------------------------------------------------------------------------

/// Zustand des einzigen Broadcast-Kanals
pub struct BroadcastChannel {
    name: String,
    zustand: Mutex<KanalZustand>,
}

impl BroadcastChannel {
    /// Erstellt einen leeren Kanal
    pub fn neu(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zustand: Mutex::new(KanalZustand::Leer),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schaltet den Kanal live, wenn er leer ist
    ///
    /// Der erste Broadcaster gewinnt. Ist der Kanal bereits live, bleibt der
    /// bisherige Besitzer unveraendert und es wird `KanalBelegt` gemeldet.
    pub fn live_schalten(&self, relay: TrackRelay, besitzer: ConnectionId) -> SignalingResult<()> {
        let mut zustand = self.zustand.lock();
        if let KanalZustand::Live { besitzer: aktuell, .. } = &*zustand {
            tracing::debug!(
                angefragt = %besitzer,
                besitzer = %aktuell,
                "Kanal bereits live – Broadcaster abgelehnt"
            );
            return Err(SignalingError::KanalBelegt);
        }
        *zustand = KanalZustand::Live {
            relay,
            besitzer,
            seit: Instant::now(),
        };
        tracing::info!(kanal = %self.name, besitzer = %besitzer, "Kanal ist live");
        Ok(())
    }

    /// Setzt den Kanal zurueck, aber nur fuer den aktuellen Besitzer
    ///
    /// Stoppt dabei das Relay. Gibt `true` zurueck wenn der Kanal geleert
    /// wurde; veraltete oder doppelte Aufrufe sind ein No-op.
    pub fn freigeben_falls_besitzer(&self, besitzer: &ConnectionId) -> bool {
        let mut zustand = self.zustand.lock();
        match &*zustand {
            KanalZustand::Live {
                besitzer: aktuell, ..
            } if aktuell == besitzer => {}
            _ => return false,
        }

        if let KanalZustand::Live { relay, seit, .. } =
            std::mem::replace(&mut *zustand, KanalZustand::Leer)
        {
            relay.stoppen();
            tracing::info!(
                kanal = %self.name,
                besitzer = %besitzer,
                dauer_sek = seit.elapsed().as_secs(),
                "Kanal ist offline"
            );
        }
        true
    }

    /// Neuer Tap auf den Live-Stream, `None` wenn der Kanal leer ist
    pub fn aktueller_tap(&self) -> Option<Tap> {
        match &*self.zustand.lock() {
            KanalZustand::Live { relay, .. } => relay.tap(),
            KanalZustand::Leer => None,
        }
    }

    pub fn ist_live(&self) -> bool {
        matches!(&*self.zustand.lock(), KanalZustand::Live { .. })
    }

    /// Aktueller Besitzer des Kanals
    pub fn besitzer(&self) -> Option<ConnectionId> {
        match &*self.zustand.lock() {
            KanalZustand::Live { besitzer, .. } => Some(*besitzer),
            KanalZustand::Leer => None,
        }
    }
}

impl std::fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("name", &self.name)
            .field("besitzer", &self.besitzer())
            .finish()
    }
}
