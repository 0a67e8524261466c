//! Session-Registry – Menge aller zugelassenen Verbindungen
//!
//! Eine Verbindung steht ab der Zulassung bis zum Abschluss ihres
//! terminalen Uebergangs in der Registry, nie zweimal. `snapshot()` liefert
//! eine konsistente Momentaufnahme, damit der Status nie ueber eine sich
//! aendernde Menge iteriert.

use onair_core::ConnectionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::Verbindung;
use crate::error::{SignalingError, SignalingResult};

/// Thread-safe Registry aller Verbindungen
///
/// `Clone` teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, Arc<Verbindung>>>>,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung
    ///
    /// Schlaegt mit `DoppelteId` fehl wenn die ID bereits vorhanden ist.
    pub fn registrieren(&self, verbindung: Arc<Verbindung>) -> SignalingResult<()> {
        let id = verbindung.id();
        let mut eintraege = self.inner.write();
        if eintraege.contains_key(&id) {
            return Err(SignalingError::DoppelteId(id));
        }
        eintraege.insert(id, verbindung);
        tracing::debug!(connection_id = %id, gesamt = eintraege.len(), "Verbindung registriert");
        Ok(())
    }

    /// Entfernt eine Verbindung; kein Fehler wenn sie fehlt
    pub fn entfernen(&self, id: &ConnectionId) -> Option<Arc<Verbindung>> {
        let entfernt = self.inner.write().remove(id);
        if entfernt.is_some() {
            tracing::debug!(connection_id = %id, "Verbindung aus Registry entfernt");
        }
        entfernt
    }

    /// Momentaufnahme aller Verbindungen (ohne Reihenfolge)
    pub fn snapshot(&self) -> Vec<Arc<Verbindung>> {
        self.inner.read().values().cloned().collect()
    }

    pub fn enthaelt(&self, id: &ConnectionId) -> bool {
        self.inner.read().contains_key(id)
    }

    pub fn anzahl(&self) -> usize {
        self.inner.read().len()
    }

    pub fn ist_leer(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SdpAngebot, SdpAntwort, TransportFehler, TransportVerbindung, ZustandsMelder};
    use async_trait::async_trait;
    use onair_core::{Rolle, TransportZustand};
    use tokio::sync::watch;

    struct Attrappe(ZustandsMelder);

    #[async_trait]
    impl TransportVerbindung for Attrappe {
        fn zustand(&self) -> TransportZustand {
            self.0.aktuell()
        }
        fn zustand_abonnieren(&self) -> watch::Receiver<TransportZustand> {
            self.0.abonnieren()
        }
        async fn aushandeln(&self, _: SdpAngebot) -> Result<SdpAntwort, TransportFehler> {
            Err(TransportFehler::Geschlossen)
        }
        async fn schliessen(&self) {
            self.0.melden(TransportZustand::Geschlossen);
        }
    }

    fn verbindung(rolle: Rolle) -> Arc<Verbindung> {
        Arc::new(Verbindung::neu(
            ConnectionId::new(),
            rolle,
            Arc::new(Attrappe(ZustandsMelder::neu())),
        ))
    }

    #[test]
    fn registrieren_und_entfernen() {
        let registry = SessionRegistry::neu();
        let v = verbindung(Rolle::Listener);
        let id = v.id();

        registry.registrieren(v).unwrap();
        assert!(registry.enthaelt(&id));
        assert_eq!(registry.anzahl(), 1);

        assert!(registry.entfernen(&id).is_some());
        assert!(registry.ist_leer());
    }

    #[test]
    fn doppelte_id_wird_abgelehnt() {
        let registry = SessionRegistry::neu();
        let v = verbindung(Rolle::Broadcaster);

        registry.registrieren(Arc::clone(&v)).unwrap();
        let fehler = registry.registrieren(v).unwrap_err();
        assert!(matches!(fehler, SignalingError::DoppelteId(_)));
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn entfernen_unbekannter_id_ist_noop() {
        let registry = SessionRegistry::neu();
        registry.registrieren(verbindung(Rolle::Listener)).unwrap();
        assert!(registry.entfernen(&ConnectionId::new()).is_none());
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn snapshot_ist_unabhaengig_von_spaeteren_aenderungen() {
        let registry = SessionRegistry::neu();
        let v = verbindung(Rolle::Listener);
        let id = v.id();
        registry.registrieren(v).unwrap();

        let snapshot = registry.snapshot();
        registry.entfernen(&id);

        assert_eq!(snapshot.len(), 1);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn gleichzeitiges_registrieren_verliert_nichts() {
        let registry = SessionRegistry::neu();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry.registrieren(verbindung(Rolle::Listener)).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.anzahl(), 400);
    }
}
