//! Kanal-Status – reine Leseoperation fuer `GET /status`

use serde::{Deserialize, Serialize};

/// Momentaufnahme des Broadcast-Zustands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanalStatus {
    pub is_live: bool,
    /// Kanalname, nur gesetzt wenn live
    pub channel_name: Option<String>,
    /// Verbundene Listener (Rolle Listener, Zustand `connected`)
    pub listener_count: usize,
}

impl KanalStatus {
    /// Status eines leeren Kanals
    pub fn offline(listener_count: usize) -> Self {
        Self {
            is_live: false,
            channel_name: None,
            listener_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialisiert_camel_case() {
        let status = KanalStatus {
            is_live: true,
            channel_name: Some("Live Broadcast".into()),
            listener_count: 3,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isLive"], true);
        assert_eq!(json["channelName"], "Live Broadcast");
        assert_eq!(json["listenerCount"], 3);
    }

    #[test]
    fn offline_hat_null_kanalname() {
        let json = serde_json::to_value(KanalStatus::offline(0)).unwrap();
        assert!(json["channelName"].is_null());
        assert_eq!(json["isLive"], false);
    }
}
