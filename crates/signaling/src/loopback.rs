//! In-Memory-Transport fuer Tests
//!
//! Verhaelt sich wie ein Medien-Transport ohne Netzwerk: Angebote mit
//! `v=`-Praefix werden beantwortet, Zustaende lassen sich von aussen
//! setzen. Damit lassen sich Zulassung, Ausfall und Shutdown
//! deterministisch durchspielen.

use async_trait::async_trait;
use onair_core::{ConnectionId, TransportZustand};
use onair_voice::{Tap, TrackRelay};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::transport::{
    MedienRichtung, MedienTransport, SdpAngebot, SdpAntwort, TransportFehler,
    TransportVerbindung, ZustandsMelder,
};

/// Verhalten neuer Loopback-Verbindungen bei der Aushandlung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackModus {
    /// Antwortet und meldet sofort `connected`
    Verbinden,
    /// Antwortet, bleibt aber in `connecting`
    Antworten,
    /// Meldet `failed` und liefert einen Aushandlungsfehler
    Fehlschlagen,
    /// Blockiert bis die Verbindung geschlossen wird
    Haengen,
    /// Meldet `failed` waehrend der Aushandlung, antwortet aber trotzdem
    TerminalBeimAntworten,
    /// Lehnt jedes Angebot als nicht parsebar ab
    AngebotAblehnen,
}

/// Loopback-Transport, teilt seinen Zustand ueber `Clone`
#[derive(Clone)]
pub struct LoopbackTransport {
    inner: Arc<LoopbackInner>,
}

struct LoopbackInner {
    modus: Mutex<LoopbackModus>,
    schliessen_verzoegerung: Mutex<Option<Duration>>,
    aushandeln_verzoegerung: Mutex<Option<Duration>>,
    verbindungen: Mutex<HashMap<ConnectionId, Arc<LoopbackVerbindung>>>,
    erstellt: AtomicUsize,
}

impl LoopbackTransport {
    pub fn neu() -> Self {
        Self::mit_modus(LoopbackModus::Verbinden)
    }

    pub fn mit_modus(modus: LoopbackModus) -> Self {
        Self {
            inner: Arc::new(LoopbackInner {
                modus: Mutex::new(modus),
                schliessen_verzoegerung: Mutex::new(None),
                aushandeln_verzoegerung: Mutex::new(None),
                verbindungen: Mutex::new(HashMap::new()),
                erstellt: AtomicUsize::new(0),
            }),
        }
    }

    /// Aendert den Modus fuer kuenftige Verbindungen
    pub fn modus_setzen(&self, modus: LoopbackModus) {
        *self.inner.modus.lock() = modus;
    }

    /// Laesst jedes `schliessen()` so lange warten
    pub fn schliessen_verzoegern(&self, dauer: Duration) {
        *self.inner.schliessen_verzoegerung.lock() = Some(dauer);
    }

    /// Laesst jedes `aushandeln()` so lange dauern, bevor es antwortet
    pub fn aushandeln_verzoegern(&self, dauer: Duration) {
        *self.inner.aushandeln_verzoegerung.lock() = Some(dauer);
    }

    pub fn verbindung(&self, id: &ConnectionId) -> Option<Arc<LoopbackVerbindung>> {
        self.inner.verbindungen.lock().get(id).cloned()
    }

    /// Alle jemals erstellten Verbindungen
    pub fn verbindungen(&self) -> Vec<Arc<LoopbackVerbindung>> {
        self.inner.verbindungen.lock().values().cloned().collect()
    }

    pub fn anzahl_erstellt(&self) -> usize {
        self.inner.erstellt.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::neu()
    }
}

#[async_trait]
impl MedienTransport for LoopbackTransport {
    async fn verbindung_erstellen(
        &self,
        id: ConnectionId,
        medien: MedienRichtung,
    ) -> Result<Arc<dyn TransportVerbindung>, TransportFehler> {
        let verbindung = Arc::new(LoopbackVerbindung {
            id,
            modus: *self.inner.modus.lock(),
            schliessen_verzoegerung: *self.inner.schliessen_verzoegerung.lock(),
            aushandeln_verzoegerung: *self.inner.aushandeln_verzoegerung.lock(),
            melder: ZustandsMelder::neu(),
            medien: Mutex::new(Some(medien)),
            schliessen_aufrufe: AtomicUsize::new(0),
        });
        self.inner
            .verbindungen
            .lock()
            .insert(id, Arc::clone(&verbindung));
        self.inner.erstellt.fetch_add(1, Ordering::SeqCst);
        Ok(verbindung)
    }
}

// ---------------------------------------------------------------------------
// LoopbackVerbindung
// ---------------------------------------------------------------------------

/// Eine Loopback-Verbindung
pub struct LoopbackVerbindung {
    id: ConnectionId,
    modus: LoopbackModus,
    schliessen_verzoegerung: Option<Duration>,
    aushandeln_verzoegerung: Option<Duration>,
    melder: ZustandsMelder,
    medien: Mutex<Option<MedienRichtung>>,
    schliessen_aufrufe: AtomicUsize,
}

impl LoopbackVerbindung {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Simuliert einen vom Transport gemeldeten Zustand
    pub fn zustand_setzen(&self, zustand: TransportZustand) -> bool {
        self.melder.melden(zustand)
    }

    /// Relay eines Broadcasters (zum Einspeisen in Tests)
    pub fn relay(&self) -> Option<TrackRelay> {
        match &*self.medien.lock() {
            Some(MedienRichtung::Empfangen(relay)) => Some(relay.clone()),
            _ => None,
        }
    }

    /// Entnimmt den Tap eines Listeners
    pub fn tap_nehmen(&self) -> Option<Tap> {
        let mut medien = self.medien.lock();
        match medien.take() {
            Some(MedienRichtung::Senden(tap)) => Some(tap),
            andere => {
                *medien = andere;
                None
            }
        }
    }

    pub fn schliessen_aufrufe(&self) -> usize {
        self.schliessen_aufrufe.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportVerbindung for LoopbackVerbindung {
    fn zustand(&self) -> TransportZustand {
        self.melder.aktuell()
    }

    fn zustand_abonnieren(&self) -> watch::Receiver<TransportZustand> {
        self.melder.abonnieren()
    }

    async fn aushandeln(&self, angebot: SdpAngebot) -> Result<SdpAntwort, TransportFehler> {
        if !angebot.sdp.starts_with("v=") {
            return Err(TransportFehler::UngueltigesAngebot(
                "SDP muss mit v= beginnen".into(),
            ));
        }
        if self.modus == LoopbackModus::AngebotAblehnen {
            return Err(TransportFehler::UngueltigesAngebot(
                "Loopback: Angebot nicht parsebar".into(),
            ));
        }
        if self.melder.aktuell().ist_terminal() {
            return Err(TransportFehler::Geschlossen);
        }
        self.melder.melden(TransportZustand::Verbindend);

        if let Some(dauer) = self.aushandeln_verzoegerung {
            tokio::time::sleep(dauer).await;
        }

        match self.modus {
            LoopbackModus::Verbinden => {
                self.melder.melden(TransportZustand::Verbunden);
            }
            LoopbackModus::Antworten | LoopbackModus::AngebotAblehnen => {}
            LoopbackModus::TerminalBeimAntworten => {
                self.melder.melden(TransportZustand::Fehlgeschlagen);
            }
            LoopbackModus::Fehlschlagen => {
                self.melder.melden(TransportZustand::Fehlgeschlagen);
                return Err(TransportFehler::Aushandlung("Loopback: simulierter Fehler".into()));
            }
            LoopbackModus::Haengen => {
                let mut rx = self.melder.abonnieren();
                while !rx.borrow_and_update().ist_terminal() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
                return Err(TransportFehler::Geschlossen);
            }
        }

        Ok(SdpAntwort {
            sdp: format!("v=0\r\no=- {} 0 IN IP4 127.0.0.1\r\ns=loopback\r\n", self.id.inner().as_u128() as u64),
            sdp_typ: "answer".into(),
        })
    }

    async fn schliessen(&self) {
        self.schliessen_aufrufe.fetch_add(1, Ordering::SeqCst);
        if let Some(dauer) = self.schliessen_verzoegerung {
            tokio::time::sleep(dauer).await;
        }
        self.melder.melden(TransportZustand::Geschlossen);
        // Tap/Relay-Referenz freigeben
        self.medien.lock().take();
    }
}
