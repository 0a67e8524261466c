//! onair-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen OnAir-Crates gemeinsam genutzt werden: Verbindungs-IDs, Rollen
//! und den Transport-Zustand einer Verbindung.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{OnAirError, Result};
pub use types::{ConnectionId, Rolle, TransportZustand};
