//! onair-signaling – Zulassung und Session-Lebenszyklus
//!
//! Dieser Crate ist der Kern des Broadcast-Relays: ein Broadcaster sendet,
//! beliebig viele Listener hoeren zu. Er entscheidet ueber die Zulassung,
//! haelt den einzigen Live-Slot und raeumt bei Ausfaellen auf. Medien-
//! transport, HTTP und Prozessstart liegen ausserhalb.
//!
//! ## Architektur
//!
//! ```text
//! HTTP (POST /offer, GET /status)
//!     |
//!     v
//! SignalingCoordinator
//!     |  Zulassung: Broadcaster -> live_schalten | Listener -> aktueller_tap
//!     |
//!     +-- BroadcastChannel  (Leer | Live(relay, besitzer))
//!     +-- SessionRegistry   (ConnectionId -> Verbindung)
//!     +-- MedienTransport   (extern, z.B. WebRTC)
//!             |
//!             v
//!         Lebenszyklus-Task pro Verbindung (failed/closed -> abmelden)
//! ```

pub mod channel;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod loopback;
pub mod registry;
pub mod status;
pub mod transport;


// Bequeme Re-Exporte
pub use channel::BroadcastChannel;
pub use config::SignalingConfig;
pub use connection::Verbindung;
pub use coordinator::{HandshakeAnfrage, HandshakeAntwort, SignalingCoordinator};
pub use error::{SignalingError, SignalingResult};
pub use registry::SessionRegistry;
pub use status::KanalStatus;
pub use transport::{
    MedienRichtung, MedienTransport, SdpAngebot, SdpAntwort, TransportFehler,
    TransportVerbindung, ZustandsMelder,
};
