//! Integrationstests fuer die HTTP-Schnittstelle (Loopback-Transport)

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use onair_observability::{HealthState, OnAirMetrics};
use onair_server::config::ServerConfig;
use onair_server::http::{kennzahlen_abfrage, router, AppState};
use onair_signaling::loopback::{LoopbackModus, LoopbackTransport};
use onair_signaling::SignalingCoordinator;
use serde_json::{json, Value};
use tower::ServiceExt;

const ANGEBOT: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\n";

struct TestServer {
    app: Router,
    coordinator: SignalingCoordinator,
    metriken: OnAirMetrics,
    transport: LoopbackTransport,
}

fn test_server() -> TestServer {
    let config = ServerConfig::default();
    let transport = LoopbackTransport::mit_modus(LoopbackModus::Verbinden);
    let coordinator =
        SignalingCoordinator::neu(Arc::new(transport.clone()), config.signaling_config());
    let metriken = OnAirMetrics::neu().unwrap();
    let health = HealthState::neu(kennzahlen_abfrage(&coordinator));
    let app = router(
        AppState {
            coordinator: coordinator.clone(),
            metriken: metriken.clone(),
        },
        &config,
        health,
    );
    TestServer {
        app,
        coordinator,
        metriken,
        transport,
    }
}

async fn senden(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn status(app: &Router) -> Value {
    let (code, json) = senden(app, Request::get("/status").body(Body::empty()).unwrap()).await;
    assert_eq!(code, StatusCode::OK);
    json
}

async fn offer(app: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::post("/offer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    senden(app, request).await
}

fn angebot(rolle: &str) -> Value {
    json!({ "sdpOffer": ANGEBOT, "sdpType": "offer", "role": rolle })
}

#[tokio::test]
async fn status_ohne_broadcaster() {
    let server = test_server();
    let json = status(&server.app).await;
    assert_eq!(json, json!({ "isLive": false, "channelName": null, "listenerCount": 0 }));
}

#[tokio::test]
async fn broadcaster_und_listener_ueber_http() {
    let server = test_server();

    let (code, json) = offer(&server.app, angebot("broadcaster")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["sdpType"], "answer");
    assert!(json["sdpAnswer"].as_str().unwrap().starts_with("v=0"));

    let (code, _) = offer(&server.app, angebot("listener")).await;
    assert_eq!(code, StatusCode::OK);

    let json = status(&server.app).await;
    assert_eq!(json["isLive"], true);
    assert_eq!(json["channelName"], "Live Broadcast");
    assert_eq!(json["listenerCount"], 1);
}

#[tokio::test]
async fn kurze_feldnamen_werden_akzeptiert() {
    let server = test_server();
    let (code, _) = offer(
        &server.app,
        json!({ "sdp": ANGEBOT, "type": "offer", "role": "broadcaster" }),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn listener_ohne_broadcaster_409() {
    let server = test_server();
    let (code, json) = offer(&server.app, angebot("listener")).await;
    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(json, json!({ "error": "channel not live" }));
    assert_eq!(server.coordinator.sitzungen_anzahl(), 0);
}

#[tokio::test]
async fn zweiter_broadcaster_409() {
    let server = test_server();
    offer(&server.app, angebot("broadcaster")).await;

    let (code, json) = offer(&server.app, angebot("broadcaster")).await;
    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(json["error"], "channel already live");
    assert_eq!(server.coordinator.sitzungen_anzahl(), 1);
}

#[tokio::test]
async fn fehlerhafte_anfragen_400() {
    let server = test_server();

    let faelle = [
        json!({}),
        json!({ "sdpOffer": ANGEBOT, "sdpType": "offer" }),
        json!({ "sdpOffer": ANGEBOT, "sdpType": "offer", "role": "moderator" }),
        json!({ "sdpOffer": "hallo", "sdpType": "offer", "role": "broadcaster" }),
        json!({ "sdpOffer": 42, "sdpType": "offer", "role": "broadcaster" }),
    ];
    for fall in faelle {
        let (code, json) = offer(&server.app, fall.clone()).await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "Fall {fall}");
        assert_eq!(json["error"], "malformed offer");
    }

    // Kein JSON
    let request = Request::post("/offer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{kaputt"))
        .unwrap();
    let (code, json) = senden(&server.app, request).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "malformed offer");

    assert!(!server.coordinator.ist_live());
    assert_eq!(server.transport.anzahl_erstellt(), 0);
}

#[tokio::test]
async fn transportfehler_502() {
    let server = test_server();
    server.transport.modus_setzen(LoopbackModus::Fehlschlagen);

    let (code, json) = offer(&server.app, angebot("broadcaster")).await;
    assert_eq!(code, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "transport failure");
    assert_eq!(status(&server.app).await["isLive"], false);
}

#[tokio::test]
async fn zulassungen_werden_gezaehlt() {
    let server = test_server();
    offer(&server.app, angebot("broadcaster")).await;
    offer(&server.app, angebot("broadcaster")).await;

    let zugelassen = server
        .metriken
        .admissions_total
        .with_label_values(&["broadcaster", "admitted"])
        .get();
    let belegt = server
        .metriken
        .admissions_total
        .with_label_values(&["broadcaster", "busy"])
        .get();
    assert_eq!(zugelassen, 1);
    assert_eq!(belegt, 1);
}

#[tokio::test]
async fn health_und_metriken() {
    let server = test_server();
    offer(&server.app, angebot("broadcaster")).await;

    let (code, json) = senden(&server.app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["live"], true);
    assert_eq!(json["sessions"], 1);

    let response = server
        .app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("onair_channel_live 1"));
    assert!(text.contains("onair_http_requests_total"));
}

#[tokio::test]
async fn shutdown_schliesst_alle_verbindungen() {
    let server = test_server();
    offer(&server.app, angebot("broadcaster")).await;
    offer(&server.app, angebot("listener")).await;

    assert_eq!(server.coordinator.alle_schliessen().await, 2);

    let json = status(&server.app).await;
    assert_eq!(json["isLive"], false);
    assert_eq!(json["listenerCount"], 0);
}
