//! WebRTC-Transport – Peer-Verbindungen mit webrtc-rs
//!
//! Jede Verbindung ist eine eigene `RTCPeerConnection`. Der Zustand wird
//! ueber `on_peer_connection_state_change` in einen [`ZustandsMelder`]
//! gespiegelt; `disconnected` gilt als voruebergehend und wird nicht
//! gemeldet.
//!
//! ## Audio-Pfad
//! ```text
//! Broadcaster --RTP--> on_track --read_rtp--> TrackRelay::einspeisen
//!                                                  |
//!                                   Tap::empfangen (pro Listener)
//!                                                  |
//! Listener   <--RTP-- TrackLocalStaticRTP::write <-+
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use onair_core::{ConnectionId, TransportZustand};
use onair_signaling::{
    MedienRichtung, MedienTransport, SdpAngebot, SdpAntwort, TransportFehler,
    TransportVerbindung, ZustandsMelder,
};
use onair_voice::{Tap, TrackRelay};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice::udp_network::{EphemeralUDP, UDPNetwork};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;
use webrtc::util::Marshal;

use crate::config::RtcKonfig;
use crate::error::{RtcError, RtcResult};

/// Stream-ID der ausgehenden Listener-Tracks
const STREAM_ID: &str = "onair";

// ---------------------------------------------------------------------------
// Zustands-Abbildung
// ---------------------------------------------------------------------------

/// Bildet den webrtc-Zustand auf den Transport-Zustand ab
///
/// `Disconnected` kann sich erholen und wird daher nicht weitergegeben.
pub fn zustand_abbilden(zustand: RTCPeerConnectionState) -> Option<TransportZustand> {
    match zustand {
        RTCPeerConnectionState::New => Some(TransportZustand::Neu),
        RTCPeerConnectionState::Connecting => Some(TransportZustand::Verbindend),
        RTCPeerConnectionState::Connected => Some(TransportZustand::Verbunden),
        RTCPeerConnectionState::Failed => Some(TransportZustand::Fehlgeschlagen),
        RTCPeerConnectionState::Closed => Some(TransportZustand::Geschlossen),
        RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Unspecified => None,
    }
}

// ---------------------------------------------------------------------------
// WebRtcTransport
// ---------------------------------------------------------------------------

/// Fabrik fuer WebRTC-Peer-Verbindungen
pub struct WebRtcTransport {
    api: API,
    rtc_konfig: RTCConfiguration,
}

impl WebRtcTransport {
    /// Baut die WebRTC-API (Codecs, Interceptors, Portbereich)
    pub fn neu(konfig: &RtcKonfig) -> RtcResult<Self> {
        konfig.validieren()?;

        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let mut setting_engine = SettingEngine::default();
        if let Some((min, max)) = konfig.port_bereich {
            let udp = EphemeralUDP::new(min, max)
                .map_err(|e| RtcError::Konfiguration(format!("Portbereich {min}-{max}: {e}")))?;
            setting_engine.set_udp_network(UDPNetwork::Ephemeral(udp));
        }

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let ice_servers = if konfig.ice_server.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: konfig.ice_server.clone(),
                ..Default::default()
            }]
        };

        tracing::info!(
            ice_server = ?konfig.ice_server,
            port_bereich = ?konfig.port_bereich,
            "WebRTC-Transport initialisiert"
        );

        Ok(Self {
            api,
            rtc_konfig: RTCConfiguration {
                ice_servers,
                ..Default::default()
            },
        })
    }

    async fn peer_connection_erstellen(&self) -> RtcResult<Arc<RTCPeerConnection>> {
        let pc = self
            .api
            .new_peer_connection(self.rtc_konfig.clone())
            .await?;
        Ok(Arc::new(pc))
    }
}

#[async_trait]
impl MedienTransport for WebRtcTransport {
    async fn verbindung_erstellen(
        &self,
        id: ConnectionId,
        medien: MedienRichtung,
    ) -> Result<Arc<dyn TransportVerbindung>, TransportFehler> {
        let pc = self.peer_connection_erstellen().await?;
        let melder = Arc::new(ZustandsMelder::neu());

        let melder_cb = Arc::clone(&melder);
        pc.on_peer_connection_state_change(Box::new(move |zustand: RTCPeerConnectionState| {
            tracing::debug!(connection_id = %id, zustand = %zustand, "Peer-Zustand geaendert");
            if let Some(abgebildet) = zustand_abbilden(zustand) {
                melder_cb.melden(abgebildet);
            }
            Box::pin(async {})
        }));

        let verbindung = Arc::new(WebRtcVerbindung {
            id,
            pc,
            melder,
            geschlossen: AtomicBool::new(false),
        });

        // Wird der Aufruf hier verworfen, schliesst der Waechter die Peer-Verbindung
        let mut waechter = EinrichtungsWaechter(Some(Arc::clone(&verbindung)));
        let ergebnis = match medien {
            MedienRichtung::Empfangen(relay) => verbindung.empfang_einrichten(relay).await,
            MedienRichtung::Senden(tap) => verbindung.versand_einrichten(tap).await,
        };
        waechter.0 = None;

        if let Err(e) = ergebnis {
            verbindung.schliessen().await;
            return Err(e.into());
        }

        Ok(verbindung)
    }
}

/// Schliesst eine halb eingerichtete Verbindung, wenn
/// `verbindung_erstellen` vor der Rueckgabe verworfen wird
struct EinrichtungsWaechter(Option<Arc<WebRtcVerbindung>>);

impl Drop for EinrichtungsWaechter {
    fn drop(&mut self) {
        let Some(verbindung) = self.0.take() else {
            return;
        };
        tracing::debug!(connection_id = %verbindung.id, "Einrichtung abgebrochen – schliesse Peer-Verbindung");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { verbindung.schliessen().await });
            }
            Err(_) => {
                tracing::warn!(connection_id = %verbindung.id, "Keine Runtime – Peer-Verbindung bleibt offen");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WebRtcVerbindung
// ---------------------------------------------------------------------------

/// Eine WebRTC-Peer-Verbindung
pub struct WebRtcVerbindung {
    id: ConnectionId,
    pc: Arc<RTCPeerConnection>,
    melder: Arc<ZustandsMelder>,
    geschlossen: AtomicBool,
}

impl WebRtcVerbindung {
    /// Broadcaster: Audio empfangen und in das Relay einspeisen
    async fn empfang_einrichten(&self, relay: TrackRelay) -> RtcResult<()> {
        self.pc
            .add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await?;

        let id = self.id;
        self.pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _: Arc<RTCRtpReceiver>, _: Arc<RTCRtpTransceiver>| {
                if track.kind() == RTPCodecType::Audio {
                    tracing::info!(connection_id = %id, ssrc = track.ssrc(), "Broadcaster-Audio empfangen");
                    tokio::spawn(audio_einspeisen(id, track, relay.clone()));
                }
                Box::pin(async {})
            },
        ));
        Ok(())
    }

    /// Listener: Pakete des Taps ueber einen lokalen Track senden
    async fn versand_einrichten(&self, tap: Tap) -> RtcResult<()> {
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            STREAM_ID.to_owned(),
        ));

        let sender = self
            .pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // RTCP muss gelesen werden, damit die Interceptors arbeiten
        tokio::spawn(async move {
            let mut puffer = vec![0u8; 1500];
            while sender.read(&mut puffer).await.is_ok() {}
        });

        tokio::spawn(audio_weiterleiten(
            self.id,
            tap,
            track,
            self.melder.abonnieren(),
        ));
        Ok(())
    }
}

/// Liest RTP vom Broadcaster bis der Track endet oder das Relay stoppt
async fn audio_einspeisen(id: ConnectionId, track: Arc<TrackRemote>, relay: TrackRelay) {
    loop {
        let paket = match track.read_rtp().await {
            Ok((paket, _)) => paket,
            Err(e) => {
                tracing::debug!(connection_id = %id, fehler = %e, "Broadcaster-Track beendet");
                break;
            }
        };
        let daten: Bytes = match paket.marshal() {
            Ok(daten) => daten,
            Err(e) => {
                tracing::warn!(connection_id = %id, fehler = %e, "RTP-Paket nicht serialisierbar");
                continue;
            }
        };
        if !relay.einspeisen(daten) {
            break;
        }
    }
}

/// Leitet Pakete des Taps weiter bis Relay oder Verbindung enden
async fn audio_weiterleiten(
    id: ConnectionId,
    mut tap: Tap,
    track: Arc<TrackLocalStaticRTP>,
    mut zustand_rx: watch::Receiver<TransportZustand>,
) {
    loop {
        tokio::select! {
            paket = tap.empfangen() => match paket {
                Some(daten) => {
                    if let Err(e) = track.write(&daten).await {
                        tracing::trace!(connection_id = %id, fehler = %e, "RTP-Weiterleitung fehlgeschlagen");
                    }
                }
                None => {
                    tracing::debug!(connection_id = %id, "Live-Stream beendet");
                    break;
                }
            },
            geaendert = zustand_rx.changed() => {
                if geaendert.is_err() || zustand_rx.borrow().ist_terminal() {
                    break;
                }
            }
        }
    }
    tracing::debug!(
        connection_id = %id,
        verworfen = tap.verworfene_pakete(),
        "Weiterleitung beendet"
    );
}

#[async_trait]
impl TransportVerbindung for WebRtcVerbindung {
    fn zustand(&self) -> TransportZustand {
        self.melder.aktuell()
    }

    fn zustand_abonnieren(&self) -> watch::Receiver<TransportZustand> {
        self.melder.abonnieren()
    }

    async fn aushandeln(&self, angebot: SdpAngebot) -> Result<SdpAntwort, TransportFehler> {
        let offer = RTCSessionDescription::offer(angebot.sdp)
            .map_err(|e| TransportFehler::UngueltigesAngebot(e.to_string()))?;

        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| TransportFehler::UngueltigesAngebot(e.to_string()))?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| TransportFehler::Aushandlung(e.to_string()))?;

        let mut gathering = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| TransportFehler::Aushandlung(e.to_string()))?;
        // Alle Kandidaten in der Antwort (kein Trickle-ICE)
        let _ = gathering.recv().await;

        let lokal = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| TransportFehler::Aushandlung("Keine lokale Beschreibung".into()))?;

        Ok(SdpAntwort {
            sdp: lokal.sdp,
            sdp_typ: lokal.sdp_type.to_string(),
        })
    }

    async fn schliessen(&self) {
        if self.geschlossen.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.pc.close().await {
            tracing::warn!(connection_id = %self.id, fehler = %e, "Peer-Verbindung nicht sauber geschlossen");
        }
        self.melder.melden(TransportZustand::Geschlossen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zustaende_abbilden() {
        assert_eq!(
            zustand_abbilden(RTCPeerConnectionState::Connected),
            Some(TransportZustand::Verbunden)
        );
        assert_eq!(
            zustand_abbilden(RTCPeerConnectionState::Failed),
            Some(TransportZustand::Fehlgeschlagen)
        );
        assert_eq!(
            zustand_abbilden(RTCPeerConnectionState::Closed),
            Some(TransportZustand::Geschlossen)
        );
        assert_eq!(zustand_abbilden(RTCPeerConnectionState::Disconnected), None);
    }

    fn lokale_konfig() -> RtcKonfig {
        RtcKonfig {
            ice_server: Vec::new(),
            port_bereich: None,
        }
    }

    #[test]
    fn ungueltige_konfig_wird_abgelehnt() {
        let konfig = RtcKonfig {
            port_bereich: Some((20, 10)),
            ..lokale_konfig()
        };
        assert!(WebRtcTransport::neu(&konfig).is_err());
    }

    #[tokio::test]
    async fn kaputtes_sdp_ist_ungueltiges_angebot() {
        let transport = WebRtcTransport::neu(&lokale_konfig()).unwrap();
        let verbindung = transport
            .verbindung_erstellen(ConnectionId::new(), MedienRichtung::Empfangen(TrackRelay::neu()))
            .await
            .unwrap();

        let fehler = verbindung
            .aushandeln(SdpAngebot { sdp: "v=0\r\n".into() })
            .await
            .unwrap_err();
        assert!(matches!(fehler, TransportFehler::UngueltigesAngebot(_)));

        verbindung.schliessen().await;
        assert_eq!(verbindung.zustand(), TransportZustand::Geschlossen);
    }

    #[tokio::test]
    async fn abgebrochene_einrichtung_schliesst_peer_verbindung() {
        let transport = WebRtcTransport::neu(&lokale_konfig()).unwrap();
        let verbindung = Arc::new(WebRtcVerbindung {
            id: ConnectionId::new(),
            pc: transport.peer_connection_erstellen().await.unwrap(),
            melder: Arc::new(ZustandsMelder::neu()),
            geschlossen: AtomicBool::new(false),
        });

        drop(EinrichtungsWaechter(Some(Arc::clone(&verbindung))));

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while verbindung.zustand() != TransportZustand::Geschlossen {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Peer-Verbindung muss geschlossen werden");
        assert!(verbindung.geschlossen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn schliessen_ist_idempotent() {
        let transport = WebRtcTransport::neu(&lokale_konfig()).unwrap();
        let relay = TrackRelay::neu();
        let tap = relay.tap().unwrap();
        let verbindung = transport
            .verbindung_erstellen(ConnectionId::new(), MedienRichtung::Senden(tap))
            .await
            .unwrap();

        verbindung.schliessen().await;
        verbindung.schliessen().await;
        assert_eq!(verbindung.zustand(), TransportZustand::Geschlossen);
    }

    #[tokio::test]
    async fn angebot_eines_browsers_wird_beantwortet() {
        let transport = WebRtcTransport::neu(&lokale_konfig()).unwrap();

        // Client-Seite: sendet Audio an den Server
        let client_api = APIBuilder::new()
            .with_media_engine({
                let mut m = MediaEngine::default();
                m.register_default_codecs().unwrap();
                m
            })
            .build();
        let client = client_api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap();
        client
            .add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Sendonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .unwrap();
        let offer = client.create_offer(None).await.unwrap();
        client.set_local_description(offer.clone()).await.unwrap();

        let verbindung = transport
            .verbindung_erstellen(ConnectionId::new(), MedienRichtung::Empfangen(TrackRelay::neu()))
            .await
            .unwrap();
        let antwort = verbindung
            .aushandeln(SdpAngebot { sdp: offer.sdp })
            .await
            .expect("Angebot muss beantwortet werden");

        assert_eq!(antwort.sdp_typ, "answer");
        assert!(antwort.sdp.contains("m=audio"));

        verbindung.schliessen().await;
        client.close().await.unwrap();
    }
}
