//! Verbindungs-Handle – eine zugelassene Peer-Session
//!
//! Der Kern haelt nur opake Handles: ID, Rolle und die Transport-Seite.
//! Transport-Interna bleiben hinter [`TransportVerbindung`] verborgen.

use onair_core::{ConnectionId, Rolle, TransportZustand};
use std::sync::Arc;

use crate::transport::TransportVerbindung;

/// Eine zugelassene Peer-Verbindung
pub struct Verbindung {
    id: ConnectionId,
    rolle: Rolle,
    transport: Arc<dyn TransportVerbindung>,
}

impl Verbindung {
    pub fn neu(id: ConnectionId, rolle: Rolle, transport: Arc<dyn TransportVerbindung>) -> Self {
        Self {
            id,
            rolle,
            transport,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn rolle(&self) -> Rolle {
        self.rolle
    }

    /// Aktueller Transport-Zustand
    pub fn zustand(&self) -> TransportZustand {
        self.transport.zustand()
    }

    /// Prueft ob die Verbindung ein verbundener Listener ist
    pub fn ist_aktiver_listener(&self) -> bool {
        self.rolle == Rolle::Listener && self.zustand() == TransportZustand::Verbunden
    }

    /// Zugriff auf die Transport-Seite
    pub fn transport(&self) -> &Arc<dyn TransportVerbindung> {
        &self.transport
    }

    /// Schliesst die Transport-Seite (idempotent)
    pub async fn schliessen(&self) {
        self.transport.schliessen().await;
    }
}

impl std::fmt::Debug for Verbindung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verbindung")
            .field("id", &self.id)
            .field("rolle", &self.rolle)
            .field("zustand", &self.zustand())
            .finish()
    }
}
