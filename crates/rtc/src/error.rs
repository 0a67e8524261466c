//! Fehlertypen fuer den WebRTC-Transport

use onair_signaling::TransportFehler;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtcError {
    #[error("RTC-Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("WebRTC-Fehler: {0}")]
    WebRtc(#[from] webrtc::Error),
}

pub type RtcResult<T> = Result<T, RtcError>;

impl From<RtcError> for TransportFehler {
    fn from(fehler: RtcError) -> Self {
        TransportFehler::Intern(fehler.to_string())
    }
}
