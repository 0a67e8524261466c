//! Track-Relay – Fan-out des Broadcaster-Streams an beliebig viele Taps
//!
//! Das `TrackRelay` haelt genau eine Einspeisung (den Broadcaster) und
//! verteilt jedes Paket an alle Taps. Die Einspeisung kostet O(1), egal wie
//! viele Listener zuhoeren: ein Paket wird einmal in den Broadcast-Kanal
//! gelegt, jeder Tap liest seine eigene Kopie (nur `Bytes`-Refcount, kein
//! Memcpy).
//!
//! ## Lebensdauer
//! - Ein Tap haelt nur Empfangsseiten und keine Referenz auf seinen Listener.
//! - `stoppen()` beendet das Relay: jeder Tap meldet Stream-Ende, neue Taps
//!   werden nicht mehr ausgegeben.
//! - Ein langsamer Tap verliert die aeltesten Pakete (gezaehlt), blockiert
//!   aber weder die Einspeisung noch andere Taps.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standard-Puffergroesse pro Tap (Pakete, ca. 5 s Opus bei 20 ms)
pub const STANDARD_KAPAZITAET: usize = 256;

// ---------------------------------------------------------------------------
// TrackRelay
// ---------------------------------------------------------------------------

/// Fan-out des Broadcaster-Audiostreams
///
/// Thread-safe und `Clone`-faehig (innerer Arc). Alle Clones teilen dasselbe
/// Relay.
#[derive(Clone)]
pub struct TrackRelay {
    inner: Arc<TrackRelayInner>,
}

struct TrackRelayInner {
    /// Broadcast-Sender, jeder Tap haelt einen Receiver
    tx: broadcast::Sender<Bytes>,
    /// Stopp-Signal fuer alle Taps
    stopp_tx: watch::Sender<bool>,
    /// Anzahl eingespeister Pakete
    pakete_gesamt: AtomicU64,
}

impl TrackRelay {
    /// Erstellt ein neues Relay mit Standard-Kapazitaet
    pub fn neu() -> Self {
        Self::mit_kapazitaet(STANDARD_KAPAZITAET)
    }

    /// Erstellt ein neues Relay mit der angegebenen Puffergroesse pro Tap
    pub fn mit_kapazitaet(kapazitaet: usize) -> Self {
        let (tx, _) = broadcast::channel(kapazitaet.max(1));
        let (stopp_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackRelayInner {
                tx,
                stopp_tx,
                pakete_gesamt: AtomicU64::new(0),
            }),
        }
    }

    /// Speist ein Paket ein
    ///
    /// Gibt `false` zurueck wenn das Relay gestoppt ist; die Einspeisung soll
    /// dann beendet werden. Ohne Taps wird das Paket verworfen.
    pub fn einspeisen(&self, paket: Bytes) -> bool {
        if self.ist_gestoppt() {
            return false;
        }
        self.inner.pakete_gesamt.fetch_add(1, Ordering::Relaxed);
        // Err bedeutet nur "kein Tap vorhanden"
        let _ = self.inner.tx.send(paket);
        true
    }

    /// Erstellt einen neuen unabhaengigen Tap
    ///
    /// Gibt `None` zurueck wenn das Relay bereits gestoppt ist.
    pub fn tap(&self) -> Option<Tap> {
        if self.ist_gestoppt() {
            return None;
        }
        let tap = Tap {
            rx: self.inner.tx.subscribe(),
            stopp_rx: self.inner.stopp_tx.subscribe(),
            verworfen: 0,
        };
        tracing::debug!(taps = self.tap_anzahl(), "Tap erstellt");
        Some(tap)
    }

    /// Stoppt das Relay; alle Taps melden danach Stream-Ende
    ///
    /// Idempotent.
    pub fn stoppen(&self) {
        let war_gestoppt = self.inner.stopp_tx.send_replace(true);
        if !war_gestoppt {
            tracing::info!(
                taps = self.tap_anzahl(),
                pakete = self.pakete_gesamt(),
                "Track-Relay gestoppt"
            );
        }
    }

    /// Prueft ob das Relay gestoppt ist
    pub fn ist_gestoppt(&self) -> bool {
        *self.inner.stopp_tx.borrow()
    }

    /// Anzahl der aktuell existierenden Taps
    pub fn tap_anzahl(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Anzahl der bisher eingespeisten Pakete
    pub fn pakete_gesamt(&self) -> u64 {
        self.inner.pakete_gesamt.load(Ordering::Relaxed)
    }
}

impl Default for TrackRelay {
    fn default() -> Self {
        Self::neu()
    }
}

impl std::fmt::Debug for TrackRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRelay")
            .field("taps", &self.tap_anzahl())
            .field("gestoppt", &self.ist_gestoppt())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tap
// ---------------------------------------------------------------------------

/// Unabhaengige Ausgabe des Relays fuer genau einen Listener
///
/// Wird beim Drop automatisch freigegeben.
pub struct Tap {
    rx: broadcast::Receiver<Bytes>,
    stopp_rx: watch::Receiver<bool>,
    verworfen: u64,
}

impl Tap {
    /// Wartet auf das naechste Paket
    ///
    /// Gibt `None` zurueck sobald das Relay gestoppt oder verworfen wurde.
    pub async fn empfangen(&mut self) -> Option<Bytes> {
        loop {
            if *self.stopp_rx.borrow_and_update() {
                return None;
            }

            tokio::select! {
                biased;

                geaendert = self.stopp_rx.changed() => {
                    // Err: Relay existiert nicht mehr
                    if geaendert.is_err() || *self.stopp_rx.borrow() {
                        return None;
                    }
                }

                ergebnis = self.rx.recv() => match ergebnis {
                    Ok(paket) => return Some(paket),
                    Err(broadcast::error::RecvError::Lagged(anzahl)) => {
                        self.verworfen += anzahl;
                        tracing::warn!(verworfen = anzahl, "Tap zu langsam – Pakete verworfen");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Anzahl der Pakete, die dieser Tap wegen Rueckstau verloren hat
    pub fn verworfene_pakete(&self) -> u64 {
        self.verworfen
    }
}

impl std::fmt::Debug for Tap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tap")
            .field("verworfen", &self.verworfen)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
