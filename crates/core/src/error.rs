//! Fehlertypen fuer OnAir
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehler. Die Crates
//! definieren darueber hinaus eigene Fehler.

use thiserror::Error;

/// Globaler Result-Alias fuer OnAir
pub type Result<T> = std::result::Result<T, OnAirError>;

/// Crate-uebergreifende Fehler im OnAir-System
#[derive(Debug, Error)]
pub enum OnAirError {
    #[error("Ungueltige Rolle: '{0}'")]
    UngueltigeRolle(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl OnAirError {
    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
