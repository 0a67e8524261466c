//! onair-rtc – WebRTC-Transport fuer den Signaling-Kern
//!
//! Implementiert [`onair_signaling::MedienTransport`] mit webrtc-rs:
//! - Broadcaster: empfaengt Opus-RTP und speist es in das Track-Relay ein
//! - Listener: sendet die Pakete seines Taps ueber einen lokalen Track
//!
//! ICE-Server und UDP-Portbereich kommen aus [`RtcKonfig`].

pub mod config;
pub mod error;
pub mod transport;

pub use config::RtcKonfig;
pub use error::{RtcError, RtcResult};
pub use transport::WebRtcTransport;
