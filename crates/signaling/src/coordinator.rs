//! Signaling-Koordinator – Zulassungsprotokoll und Lebenszyklus
//!
//! ## Zulassung pro Handshake
//! ```text
//! Empfangen -> Rolle geprueft -> (Broadcaster zugelassen | Listener zugelassen | Abgelehnt)
//!           -> Handshake abgeschlossen
//! ```
//! - Broadcaster: Kanal live schalten (erster gewinnt), sonst `KanalBelegt`
//! - Listener: Tap vom Live-Stream holen, sonst `KanalOffline`
//! - Abgelehnte Anfragen erzeugen keine Verbindung und aendern keinen Zustand
//!
//! ## Lebenszyklus
//! Nach der Zulassung beobachtet ein Task den Transport-Zustand. Bei
//! `failed`/`closed`, beim Ablauf des Verbindungsaufbau-Timeouts oder wenn
//! der Transport verschwindet, wird die Verbindung abgemeldet und (als
//! Broadcaster) der Kanal freigegeben. Das Abmelden ist idempotent.
//!
//! Wird ein Handshake waehrend der Aushandlung abgebrochen (Client trennt,
//! Future wird verworfen), raeumt ein Drop-Waechter sofort auf.

use futures_util::future::join_all;
use onair_core::{ConnectionId, Rolle, TransportZustand};
use onair_voice::TrackRelay;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::channel::BroadcastChannel;
use crate::config::SignalingConfig;
use crate::connection::Verbindung;
use crate::error::{SignalingError, SignalingResult};
use crate::registry::SessionRegistry;
use crate::status::KanalStatus;
use crate::transport::{MedienRichtung, MedienTransport, SdpAngebot, TransportVerbindung};

// ---------------------------------------------------------------------------
// Handshake-Payloads
// ---------------------------------------------------------------------------

/// Eingehender Handshake (`POST /offer`)
///
/// Alle Felder sind optional, damit fehlende Felder als fehlerhafter
/// Handshake gemeldet werden und nicht als Deserialisierungsfehler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeAnfrage {
    #[serde(default, alias = "sdp")]
    pub sdp_offer: Option<String>,
    #[serde(default, alias = "type")]
    pub sdp_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl HandshakeAnfrage {
    pub fn neu(rolle: Rolle, sdp: impl Into<String>) -> Self {
        Self {
            sdp_offer: Some(sdp.into()),
            sdp_type: Some("offer".into()),
            role: Some(rolle.als_str().into()),
        }
    }

    /// Prueft die Pflichtfelder, ohne Zustand zu veraendern
    pub fn validieren(&self) -> SignalingResult<(Rolle, SdpAngebot)> {
        let rolle = self
            .role
            .as_deref()
            .ok_or_else(|| SignalingError::fehlerhaft("role fehlt"))?
            .parse::<Rolle>()
            .map_err(|e| SignalingError::fehlerhaft(e.to_string()))?;

        match self.sdp_type.as_deref() {
            Some("offer") => {}
            Some(andere) => {
                return Err(SignalingError::fehlerhaft(format!(
                    "sdpType muss 'offer' sein, ist '{andere}'"
                )))
            }
            None => return Err(SignalingError::fehlerhaft("sdpType fehlt")),
        }

        let sdp = self
            .sdp_offer
            .as_deref()
            .map(str::trim_start)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SignalingError::fehlerhaft("sdpOffer fehlt"))?;
        if !sdp.starts_with("v=") {
            return Err(SignalingError::fehlerhaft("sdpOffer ist kein SDP"));
        }

        Ok((rolle, SdpAngebot { sdp: sdp.to_string() }))
    }

    /// Rollen-Label fuer Metriken, auch fuer ungueltige Anfragen
    pub fn rollen_label(&self) -> &'static str {
        match self.role.as_deref().map(str::parse::<Rolle>) {
            Some(Ok(rolle)) => rolle.als_str(),
            _ => "unknown",
        }
    }
}

/// Erfolgreiche Handshake-Antwort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeAntwort {
    pub sdp_answer: String,
    pub sdp_type: String,
}

// ---------------------------------------------------------------------------
// SignalingCoordinator
// ---------------------------------------------------------------------------

/// Orchestriert Zulassung, Lebenszyklus und Shutdown aller Verbindungen
///
/// `Clone` teilt Registry, Kanal und Transport.
#[derive(Clone)]
pub struct SignalingCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    registry: SessionRegistry,
    kanal: BroadcastChannel,
    transport: Arc<dyn MedienTransport>,
    config: SignalingConfig,
}

impl SignalingCoordinator {
    /// Erstellt einen Koordinator mit leerem Kanal und leerer Registry
    pub fn neu(transport: Arc<dyn MedienTransport>, config: SignalingConfig) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                registry: SessionRegistry::neu(),
                kanal: BroadcastChannel::neu(config.kanal_name.clone()),
                transport,
                config,
            }),
        }
    }

    /// Verarbeitet einen Handshake vollstaendig
    ///
    /// Fehler vor der Zulassung hinterlassen keinen Zustand. Scheitert die
    /// Aushandlung nach der Zulassung, wird die Verbindung sofort wieder
    /// abgemeldet.
    pub async fn handshake(&self, anfrage: HandshakeAnfrage) -> SignalingResult<HandshakeAntwort> {
        let (rolle, angebot) = anfrage.validieren()?;
        let id = ConnectionId::new();

        let medien = match rolle {
            Rolle::Broadcaster => {
                let relay = TrackRelay::mit_kapazitaet(self.inner.config.relay_kapazitaet);
                self.inner.kanal.live_schalten(relay.clone(), id)?;
                MedienRichtung::Empfangen(relay)
            }
            Rolle::Listener => {
                let tap = self
                    .inner
                    .kanal
                    .aktueller_tap()
                    .ok_or(SignalingError::KanalOffline)?;
                MedienRichtung::Senden(tap)
            }
        };

        // Ab hier raeumt der Waechter bei Fehler oder Abbruch auf
        let mut waechter = AufraeumWaechter {
            inner: Arc::clone(&self.inner),
            id,
            transport: None,
            registriert: false,
            aktiv: true,
        };

        tracing::debug!(connection_id = %id, rolle = %rolle, medien = medien.name(), "Handshake zugelassen");

        let transport = self.inner.transport.verbindung_erstellen(id, medien).await?;
        waechter.transport = Some(Arc::clone(&transport));

        let verbindung = Arc::new(Verbindung::neu(id, rolle, transport));
        self.inner.registry.registrieren(Arc::clone(&verbindung))?;
        waechter.registriert = true;
        let ausgehandelt = lebenszyklus_ueberwachen(Arc::clone(&self.inner), &verbindung);

        let antwort = verbindung.transport().aushandeln(angebot).await?;

        if !self.inner.registry.enthaelt(&id) || verbindung.zustand().ist_terminal() {
            return Err(SignalingError::Transport(
                "Verbindung waehrend der Aushandlung beendet".into(),
            ));
        }

        // Das Aufbau-Timeout zaehlt erst ab hier
        let _ = ausgehandelt.send(());
        waechter.aktiv = false;
        tracing::info!(connection_id = %id, rolle = %rolle, "Handshake abgeschlossen");

        Ok(HandshakeAntwort {
            sdp_answer: antwort.sdp,
            sdp_type: antwort.sdp_typ,
        })
    }

    /// Lebenszyklus-Callback: Verbindung hat einen terminalen Zustand erreicht
    ///
    /// Meldet ab, gibt den Kanal frei (Broadcaster) und schliesst den
    /// Transport. Mehrfache Aufrufe sind ein No-op; gibt `true` nur beim
    /// ersten Aufruf zurueck.
    pub async fn verbindung_beendet(&self, id: &ConnectionId) -> bool {
        self.inner.verbindung_beendet(id, "extern gemeldet").await
    }

    /// Schliesst und meldet alle registrierten Verbindungen ab
    ///
    /// Alle Schliessvorgaenge laufen gleichzeitig, jeder mit eigenem Timeout.
    /// Kehrt zurueck sobald alle beendet oder abgelaufen sind.
    pub async fn alle_schliessen(&self) -> usize {
        let verbindungen = self.inner.registry.snapshot();
        let anzahl = verbindungen.len();
        let timeout = self.inner.config.schliessen_timeout;

        tracing::info!(verbindungen = anzahl, "Schliesse alle Verbindungen");

        join_all(verbindungen.into_iter().map(|verbindung| {
            let inner = Arc::clone(&self.inner);
            async move {
                let id = verbindung.id();
                inner.abmelden(&id);
                if tokio::time::timeout(timeout, verbindung.schliessen())
                    .await
                    .is_err()
                {
                    tracing::warn!(connection_id = %id, "Schliessen hat das Timeout ueberschritten");
                }
            }
        }))
        .await;

        anzahl
    }

    /// Aktueller Kanal-Status (reine Leseoperation)
    pub fn status(&self) -> KanalStatus {
        let listener_count = self
            .inner
            .registry
            .snapshot()
            .iter()
            .filter(|v| v.ist_aktiver_listener())
            .count();

        if self.inner.kanal.ist_live() {
            KanalStatus {
                is_live: true,
                channel_name: Some(self.inner.kanal.name().to_string()),
                listener_count,
            }
        } else {
            KanalStatus::offline(listener_count)
        }
    }

    pub fn ist_live(&self) -> bool {
        self.inner.kanal.ist_live()
    }

    /// Anzahl registrierter Verbindungen (alle Rollen und Zustaende)
    pub fn sitzungen_anzahl(&self) -> usize {
        self.inner.registry.anzahl()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn kanal(&self) -> &BroadcastChannel {
        &self.inner.kanal
    }
}

impl CoordinatorInner {
    /// Synchroner Teil des Abmeldens: Registry und Kanal
    fn abmelden(&self, id: &ConnectionId) -> Option<Arc<Verbindung>> {
        let verbindung = self.registry.entfernen(id)?;
        if verbindung.rolle() == Rolle::Broadcaster {
            self.kanal.freigeben_falls_besitzer(id);
        }
        Some(verbindung)
    }

    async fn verbindung_beendet(&self, id: &ConnectionId, grund: &str) -> bool {
        match self.abmelden(id) {
            Some(verbindung) => {
                tracing::info!(
                    connection_id = %id,
                    rolle = %verbindung.rolle(),
                    zustand = %verbindung.zustand(),
                    grund,
                    "Verbindung beendet"
                );
                verbindung.schliessen().await;
                true
            }
            None => {
                tracing::trace!(connection_id = %id, "Verbindung bereits abgemeldet");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lebenszyklus-Ueberwachung
// ---------------------------------------------------------------------------

/// Startet den Lebenszyklus-Task einer Verbindung
///
/// Das Aufbau-Timeout beginnt erst, wenn ueber den zurueckgegebenen Sender
/// das Ende der Aushandlung gemeldet wird. Wird der Sender ohne Meldung
/// verworfen, bleibt die Verbindung ohne Frist (der Handshake raeumt dann
/// selbst auf).
fn lebenszyklus_ueberwachen(
    inner: Arc<CoordinatorInner>,
    verbindung: &Arc<Verbindung>,
) -> oneshot::Sender<()> {
    let id = verbindung.id();
    let mut rx = verbindung.transport().zustand_abonnieren();
    let (ausgehandelt_tx, ausgehandelt_rx) = oneshot::channel();
    let aufbau_timeout = inner.config.verbindungsaufbau_timeout;

    tokio::spawn(async move {
        let mut ausgehandelt = Some(ausgehandelt_rx);
        let mut frist: Option<Instant> = None;

        let grund = loop {
            let zustand = *rx.borrow_and_update();
            if zustand.ist_terminal() {
                break if zustand == TransportZustand::Fehlgeschlagen {
                    "Transport fehlgeschlagen"
                } else {
                    "Transport geschlossen"
                };
            }

            // Nach `connected` gilt kein Aufbau-Timeout mehr
            let verbunden = zustand == TransportZustand::Verbunden;
            let ereignis = tokio::select! {
                geaendert = rx.changed() => Ereignis::Zustand(geaendert.is_ok()),
                signal = aushandlung_abwarten(&mut ausgehandelt) => Ereignis::Ausgehandelt(signal.is_ok()),
                _ = frist_abwarten(frist), if !verbunden => Ereignis::FristAbgelaufen,
            };

            match ereignis {
                Ereignis::Zustand(true) => {}
                Ereignis::Zustand(false) => break "Transport verworfen",
                Ereignis::Ausgehandelt(gemeldet) => {
                    ausgehandelt = None;
                    if gemeldet {
                        frist = aufbau_timeout.map(|dauer| Instant::now() + dauer);
                    }
                }
                Ereignis::FristAbgelaufen => break "Verbindungsaufbau-Timeout",
            }
        };

        inner.verbindung_beendet(&id, grund).await;
    });

    ausgehandelt_tx
}

enum Ereignis {
    Zustand(bool),
    Ausgehandelt(bool),
    FristAbgelaufen,
}

async fn aushandlung_abwarten(
    rx: &mut Option<oneshot::Receiver<()>>,
) -> Result<(), oneshot::error::RecvError> {
    match rx {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

async fn frist_abwarten(frist: Option<Instant>) {
    match frist {
        Some(frist) => tokio::time::sleep_until(frist).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// AufraeumWaechter
// ---------------------------------------------------------------------------

/// Raeumt eine zugelassene, aber nicht abgeschlossene Verbindung auf
///
/// Greift bei jedem Fehler nach der Zulassung und beim Verwerfen des
/// Handshake-Futures. Der Abbruch zaehlt als sofortiger `failed`-Uebergang.
struct AufraeumWaechter {
    inner: Arc<CoordinatorInner>,
    id: ConnectionId,
    transport: Option<Arc<dyn TransportVerbindung>>,
    /// Nur eine selbst registrierte Verbindung darf abgemeldet werden
    registriert: bool,
    aktiv: bool,
}

impl Drop for AufraeumWaechter {
    fn drop(&mut self) {
        if !self.aktiv {
            return;
        }

        if self.registriert {
            self.inner.abmelden(&self.id);
        }
        // Auch ohne Registry-Eintrag kann der Kanal bereits live sein
        self.inner.kanal.freigeben_falls_besitzer(&self.id);

        tracing::debug!(connection_id = %self.id, "Handshake abgebrochen – Verbindung aufgeraeumt");

        if let Some(transport) = self.transport.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { transport.schliessen().await });
                }
                Err(_) => {
                    tracing::warn!(connection_id = %self.id, "Keine Runtime – Transport wird nicht geschlossen");
                }
            }
        }
    }
}
